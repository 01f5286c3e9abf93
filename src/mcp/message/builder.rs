//! Builder patterns for constructing tool response messages.
//!
//! These builders produce human-readable messages that remind the caller of
//! the identifiers it needs for follow-up calls.

use std::time::Duration;

/// Builder for session start messages.
///
/// # Example
///
/// ```ignore
/// let message = StartMessageBuilder::new("session-123", "alex", "localhost").build();
/// ```
pub struct StartMessageBuilder {
    session_id: String,
    username: String,
    host: String,
}

impl StartMessageBuilder {
    pub fn new(
        session_id: impl Into<String>,
        username: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            username: username.into(),
            host: host.into(),
        }
    }

    pub fn build(&self) -> String {
        [
            "SSH SESSION STARTED. REMEMBER THIS IDENTIFIER:".to_string(),
            format!("• session_id: '{}'", self.session_id),
            format!("• host: {}@{}", self.username, self.host),
            String::new(),
            format!(
                "Use ssh_exec_command or ssh_exec_sudo_command with session_id '{}' to run commands.",
                self.session_id
            ),
            format!(
                "Use ssh_close_session with session_id '{}' when done.",
                self.session_id
            ),
        ]
        .join("\n")
    }
}

/// Builder for the note attached to a timed-out command.
///
/// # Example
///
/// ```ignore
/// let message = TimeoutMessageBuilder::new("session-123", "make build", Duration::from_secs(180))
///     .build();
/// ```
pub struct TimeoutMessageBuilder {
    session_id: String,
    command: String,
    timeout: Duration,
}

impl TimeoutMessageBuilder {
    pub fn new(
        session_id: impl Into<String>,
        command: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            command: command.into(),
            timeout,
        }
    }

    pub fn build(&self) -> String {
        format!(
            "Command '{}' timed out after {}s; output is partial. Session '{}' is still usable. Retry with a larger timeout_secs if needed.",
            truncate_command(&self.command, 50),
            self.timeout.as_secs(),
            self.session_id
        )
    }
}

/// Truncate a command for display, respecting char boundaries.
fn truncate_command(command: &str, max_len: usize) -> String {
    if command.chars().count() > max_len {
        let kept: String = command.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        command.to_string()
    }
}
