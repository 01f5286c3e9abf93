//! Error taxonomy for session and command operations.
//!
//! Every failure that crosses the tool boundary is an [`SshError`]. The
//! variants map one-to-one onto the failure kinds callers can react to:
//!
//! | Variant | Raised by | Session afterwards |
//! |---------|-----------|--------------------|
//! | `Network` | connect | never created |
//! | `Auth` | connect | never created |
//! | `NotFound` | any lookup | unknown or already closed |
//! | `Timeout` | exec / exec sudo | still usable, partial output attached |
//! | `Channel` | exec / exec sudo | moved to `Error`, should be closed |
//! | `AuthFailed` | exec sudo | still usable for plain commands |
//!
//! No variant ever carries the session secret. Messages that may echo remote
//! output are redacted before they are wrapped (see `sudo::redact`).
//!
//! # Connect failure classification
//!
//! The transport reports handshake problems as free-form messages. They are
//! classified by [`classify_connect_error`]: authentication patterns take
//! precedence, everything else is a network problem.
//!
//! ```rust,ignore
//! assert!(matches!(classify_connect_error("Permission denied"), SshError::Auth(_)));
//! assert!(matches!(classify_connect_error("Connection refused"), SshError::Network(_)));
//! ```

use std::time::Duration;

use crate::mcp::types::CommandResult;

/// Authentication error patterns that indicate rejected credentials.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
    "keyboard-interactive",
];

/// Kind reported for commands cut short by their timeout.
pub const TIMEOUT_ERROR_KIND: &str = "TimeoutError";

/// Errors surfaced by the session registry and the command executors.
#[derive(Debug, thiserror::Error)]
pub enum SshError {
    /// Host unreachable, handshake failure or malformed address.
    #[error("{0}")]
    Network(String),

    /// Credentials rejected during the initial handshake.
    #[error("{0}")]
    Auth(String),

    /// Unknown or already closed session id.
    #[error("No active SSH session with ID: {0}")]
    NotFound(String),

    /// The command exceeded its deadline; `partial` holds what was captured.
    #[error("Command timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        timeout: Duration,
        partial: Box<CommandResult>,
    },

    /// Transport failure while a command was running.
    #[error("{0}")]
    Channel(String),

    /// The remote host refused privilege escalation.
    #[error("{0}")]
    AuthFailed(String),
}

impl SshError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SshError::Network(_) => "NetworkError",
            SshError::Auth(_) => "AuthError",
            SshError::NotFound(_) => "NotFoundError",
            SshError::Timeout { .. } => TIMEOUT_ERROR_KIND,
            SshError::Channel(_) => "ChannelError",
            SshError::AuthFailed(_) => "AuthFailedError",
        }
    }

    /// Render as `"<kind>: <message>"` for the tool boundary.
    pub fn render(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

/// Classify a connect-time failure message as `Auth` or `Network`.
///
/// Authentication patterns are checked first, so a message such as
/// "connection closed: authentication failed" is an `Auth` error.
pub(crate) fn classify_connect_error(message: impl Into<String>) -> SshError {
    let message = message.into();
    let lower = message.to_lowercase();

    if AUTH_ERRORS.iter().any(|pattern| lower.contains(pattern)) {
        SshError::Auth(message)
    } else {
        SshError::Network(message)
    }
}
