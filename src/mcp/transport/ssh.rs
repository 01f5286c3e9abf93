//! russh-backed transport.
//!
//! ## Connection Lifecycle
//!
//! 1. **Address Parsing**: `host`, `host:port` or IPv6 forms (default port 22).
//! 2. **Client Configuration**: inactivity timeout, keepalive and compression.
//! 3. **Connection Establishment**: TCP + SSH handshake bounded by the connect timeout.
//! 4. **Authentication**: the session secret, as password or keyboard-interactive
//!    answers (see `auth`).
//!
//! There is no retry. A failed handshake is reported once, classified as
//! `Auth` or `Network`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{ChannelMsg, Disconnect, client};
use tracing::{debug, info, warn};

use crate::mcp::error::{SshError, classify_connect_error};
use crate::mcp::session::Credentials;

use super::auth::authenticate;
use super::handler::SshClientHandler;
use super::traits::{ChannelEvent, CommandChannel, Connection, Connector};

/// SSH extended data type code for stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Keepalive interval for established connections.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Build russh client configuration.
///
/// Sessions live until explicitly closed, so there is no inactivity timeout;
/// dead peers are detected by keepalives (30 s interval, 3 misses).
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Parse address string into host and port components.
///
/// Accepts `host`, `host:port`, `[v6]`, `[v6]:port` and a bare IPv6 literal
/// (more than one `:`, always port 22). Brackets are stripped so the host
/// can be handed to the resolver as is.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), SshError> {
    let invalid_port = |e: std::num::ParseIntError| {
        SshError::Network(format!("Invalid port number in '{}': {}", address, e))
    };

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            SshError::Network(format!("Unterminated IPv6 address in '{}'", address))
        })?;
        let port = match tail {
            "" => 22,
            _ => tail
                .strip_prefix(':')
                .ok_or_else(|| SshError::Network(format!("Malformed address '{}'", address)))?
                .parse::<u16>()
                .map_err(invalid_port)?,
        };
        return Ok((host.to_string(), port));
    }

    match address.split_once(':') {
        Some((host, port_str)) if !port_str.contains(':') => {
            Ok((host.to_string(), port_str.parse::<u16>().map_err(invalid_port)?))
        }
        // No port, or a bare IPv6 literal
        _ => Ok((address.to_string(), 22)),
    }
}

/// Connector that opens real SSH connections.
pub struct RusshConnector {
    compress: bool,
}

impl RusshConnector {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, SshError> {
        let (host, port) = parse_address(&credentials.host)?;
        let config = build_client_config(self.compress);

        debug!(
            "Opening SSH connection to {}@{}:{} (timeout {:?}, compress={})",
            credentials.username, host, port, timeout, self.compress
        );

        let connect_future = client::connect(config, (host.as_str(), port), SshClientHandler);
        let mut handle = tokio::time::timeout(timeout, connect_future)
            .await
            .map_err(|_| SshError::Network(format!("Connection timed out after {:?}", timeout)))?
            .map_err(|e| classify_connect_error(format!("Failed to connect: {}", e)))?;

        tokio::time::timeout(
            timeout,
            authenticate(&mut handle, &credentials.username, &credentials.secret),
        )
        .await
        .map_err(|_| SshError::Network(format!("Authentication timed out after {:?}", timeout)))??;

        info!(
            "SSH connection to {}@{}:{} authenticated",
            credentials.username, host, port
        );

        Ok(Box::new(RusshConnection { handle }))
    }
}

/// Authenticated russh client handle.
pub struct RusshConnection {
    handle: client::Handle<SshClientHandler>,
}

#[async_trait]
impl Connection for RusshConnection {
    async fn open_channel(&self) -> Result<Box<dyn CommandChannel>, SshError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::Channel(format!("Failed to open channel: {}", e)))?;
        Ok(Box::new(RusshChannel { channel }))
    }

    async fn close(&self) {
        if self.handle.is_closed() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "Session closed by user", "en")
            .await
        {
            warn!("Error during disconnect: {}", e);
        }
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

/// One russh session channel.
pub struct RusshChannel {
    channel: russh::Channel<client::Msg>,
}

#[async_trait]
impl CommandChannel for RusshChannel {
    async fn exec(&mut self, command: &str) -> Result<(), SshError> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| SshError::Channel(format!("Failed to execute command: {}", e)))
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SshError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SshError::Channel(format!("Failed to write to channel: {}", e)))
    }

    async fn eof(&mut self) -> Result<(), SshError> {
        self.channel
            .eof()
            .await
            .map_err(|e| SshError::Channel(format!("Failed to send EOF: {}", e)))
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { data } => return Some(ChannelEvent::Stdout(data.to_vec())),
                ChannelMsg::ExtendedData { data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    return Some(ChannelEvent::Stderr(data.to_vec()));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(ChannelEvent::ExitStatus(exit_status));
                }
                ChannelMsg::Eof => return Some(ChannelEvent::Eof),
                ChannelMsg::Close => return Some(ChannelEvent::Closed),
                // Window adjustments, success replies, other extended data
                _ => continue,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.channel.close().await;
    }
}
