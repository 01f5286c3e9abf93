//! Serializable response types for the SSH session tools.
//!
//! All types implement `Serialize`, `Deserialize`, and `JsonSchema` for
//! MCP protocol compatibility. None of them carries the session secret.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a session.
///
/// `Connecting -> Active -> Closing -> Closed`, with `Error` reachable from
/// `Connecting` or `Active` on unrecoverable transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
    Error,
}

impl SessionState {
    /// Whether the session has left the usable part of its lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Closing | SessionState::Closed | SessionState::Error
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::Error => write!(f, "error"),
        }
    }
}

/// Session metadata snapshot
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionInfo {
    pub session_id: String,
    pub host: String,
    pub username: String,
    pub state: SessionState,
    /// When the connection was established (RFC3339 format)
    pub connected_at: String,
    /// When the last command completed successfully (RFC3339 format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
    /// Number of commands that completed on this session
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub commands_executed: u64,
}

/// Captured outcome of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandResult {
    /// Remote exit status, or -1 when none was reported
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
    /// Whether the command was cut short by its timeout
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub host: String,
    pub username: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CommandResponse {
    pub session_id: String,
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
    /// Whether output was cut short by the timeout or the output limit
    #[serde(default)]
    pub truncated: bool,
    /// Error kind when the command did not complete normally ("TimeoutError")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn new(session_id: impl Into<String>, result: CommandResult) -> Self {
        Self {
            session_id: session_id.into(),
            exit_status: result.exit_status,
            stdout: result.stdout,
            stderr: result.stderr,
            truncated: result.truncated,
            error_kind: None,
            message: None,
        }
    }

    pub fn with_error_kind(mut self, kind: impl Into<String>) -> Self {
        self.error_kind = Some(kind.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CloseSessionResponse {
    pub session_id: String,
    pub closed: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionListResponse {
    /// Sessions currently registered
    pub sessions: Vec<SessionInfo>,
    /// Number of sessions returned
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
    /// Sessions in the error state that were closed while listing
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub reaped: usize,
}
