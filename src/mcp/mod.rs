//! Stateful SSH sessions exposed as MCP tools.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: Serializable response types for MCP tools
//! - `config`: Parameter / environment / default resolution
//! - `error`: Error taxonomy shared by every operation
//! - `transport`: Connector, connection and channel seam, russh implementation
//! - `session`: The session entity, its guard and lifecycle state
//! - `registry`: Process-wide session registry
//! - `executor`: Plain command execution over a session
//! - `sudo`: Privileged command execution with secret injection and redaction
//! - `commands`: MCP tool implementations

pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub(crate) mod message;
pub mod registry;
pub(crate) mod schema;
pub mod session;
pub mod sudo;
pub mod transport;
pub mod types;

pub use commands::SshSessionTools;
pub use error::SshError;
pub use registry::{SESSION_REGISTRY, SessionRegistry};
