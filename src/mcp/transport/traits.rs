//! Transport trait definitions.
//!
//! The registry and the executors only talk to these traits, which keeps the
//! session logic independent of the SSH library and lets tests drive it with
//! a scripted in-memory transport.

use std::time::Duration;

use async_trait::async_trait;

use crate::mcp::error::SshError;
use crate::mcp::session::Credentials;

/// One event read from a command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Bytes on the command's standard output
    Stdout(Vec<u8>),
    /// Bytes on the command's standard error
    Stderr(Vec<u8>),
    /// The command's exit status
    ExitStatus(u32),
    /// The remote side will send no more data
    Eof,
    /// The remote side closed the channel
    Closed,
}

/// Establishes authenticated connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform one connect-and-authenticate handshake. Never retries.
    ///
    /// # Returns
    ///
    /// * `Ok(connection)` - Authenticated connection
    /// * `Err(SshError::Auth)` - Credentials rejected
    /// * `Err(SshError::Network)` - Host unreachable, handshake failure or timeout
    async fn connect(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, SshError>;
}

/// An authenticated connection able to open independent command channels.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Open a fresh channel for one command.
    async fn open_channel(&self) -> Result<Box<dyn CommandChannel>, SshError>;

    /// Close the underlying socket. Idempotent.
    async fn close(&self);

    /// Whether the connection is known to be gone.
    fn is_closed(&self) -> bool;
}

/// A single command channel.
#[async_trait]
pub trait CommandChannel: Send {
    /// Start `command` on the channel.
    async fn exec(&mut self, command: &str) -> Result<(), SshError>;

    /// Write bytes to the command's standard input.
    async fn write(&mut self, data: &[u8]) -> Result<(), SshError>;

    /// Signal end of standard input.
    async fn eof(&mut self) -> Result<(), SshError>;

    /// Next stdout/stderr/status event, or `None` once the channel is gone.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Close the channel. Errors are ignored.
    async fn close(&mut self);
}
