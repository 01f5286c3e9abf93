//! Transport connector: authenticated connections and command channels.
//!
//! - `traits`: the [`Connector`] / [`Connection`] / [`CommandChannel`] seam
//! - `ssh`: the russh implementation used in production
//! - `handler`: russh client callbacks
//! - `auth`: session-secret authentication on a russh handle

mod auth;
#[cfg(test)]
pub(crate) mod fake;
mod handler;
mod ssh;
mod traits;

pub use handler::SshClientHandler;
pub use ssh::{RusshConnection, RusshConnector};
pub use traits::{ChannelEvent, CommandChannel, Connection, Connector};
