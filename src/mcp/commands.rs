//! MCP tool facade for SSH sessions.
//!
//! - `ssh_start_session`: connect, authenticate and register a session
//! - `ssh_exec_command`: run a command on a session
//! - `ssh_exec_sudo_command`: run a command through sudo with the session secret
//! - `ssh_close_session`: close a session and release its connection
//! - `ssh_list_sessions`: list sessions, closing those in the error state
//!
//! Every tool resolves its optional parameters through `config` and maps
//! [`SshError`] onto the tool boundary: a timeout is a successful response
//! with `truncated = true` and `error_kind = "TimeoutError"`. Everything else
//! becomes a `"<kind>: <message>"` error string.

use std::sync::Arc;

use poem_mcpserver::{Tools, tool::StructuredContent};
use tracing::info;

use super::config::{
    resolve_command_timeout, resolve_connect_timeout, resolve_host, resolve_password,
    resolve_username,
};
use super::error::{SshError, TIMEOUT_ERROR_KIND};
use super::executor::{CommandRequest, execute};
use super::message::{StartMessageBuilder, TimeoutMessageBuilder};
use super::registry::{SESSION_REGISTRY, SessionRegistry};
use super::session::{Credentials, Secret};
use super::sudo::execute_sudo_with;
use super::types::{
    CloseSessionResponse, CommandResponse, CommandResult, SessionListResponse,
    StartSessionResponse,
};

/// SSH session tools backed by a [`SessionRegistry`].
pub struct SshSessionTools {
    registry: Arc<SessionRegistry>,
}

impl SshSessionTools {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn start_session(
        &self,
        host: Option<String>,
        username: Option<String>,
        password: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<StartSessionResponse, SshError> {
        let host = resolve_host(host);
        let username = resolve_username(username).ok_or_else(|| {
            SshError::Auth(
                "No username given and neither SSH_DEFAULT_USERNAME nor USER is set".to_string(),
            )
        })?;
        let password = resolve_password(password).ok_or_else(|| {
            SshError::Auth(
                "No password given and SSH_DEFAULT_PASSWORD is not set".to_string(),
            )
        })?;
        let timeout = resolve_connect_timeout(timeout_secs);

        let credentials = Credentials::new(host.clone(), username.clone(), password);
        let session_id = self.registry.create(credentials, timeout).await?;

        let message = StartMessageBuilder::new(&session_id, &username, &host).build();

        Ok(StartSessionResponse {
            session_id,
            host,
            username,
            message,
        })
    }

    pub async fn exec_command(
        &self,
        session_id: String,
        command: String,
        input_data: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<CommandResponse, SshError> {
        let session = self.registry.get(&session_id)?;
        let request = CommandRequest::new(command, resolve_command_timeout(timeout_secs))
            .with_input(input_data);

        let outcome = execute(&session, &request).await;
        respond(session_id, &request, outcome)
    }

    /// `password` answers sudo for this call only; the stored secret otherwise.
    pub async fn exec_sudo_command(
        &self,
        session_id: String,
        command: String,
        input_data: Option<String>,
        timeout_secs: Option<u64>,
        password: Option<String>,
    ) -> Result<CommandResponse, SshError> {
        let session = self.registry.get(&session_id)?;
        let request = CommandRequest::new(command, resolve_command_timeout(timeout_secs))
            .with_input(input_data);
        let password = password.map(Secret::new);

        let outcome = execute_sudo_with(&session, &request, password.as_ref()).await;
        respond(session_id, &request, outcome)
    }

    pub async fn close_session(&self, session_id: String) -> Result<CloseSessionResponse, SshError> {
        let info = self.registry.close(&session_id).await?;
        Ok(CloseSessionResponse {
            message: format!(
                "Session {} ({}@{}) closed after {} command(s)",
                session_id, info.username, info.host, info.commands_executed
            ),
            session_id,
            closed: true,
        })
    }

    pub async fn list_sessions(&self) -> SessionListResponse {
        let reaped = self.registry.reap_errored().await;
        let sessions = self.registry.list();
        SessionListResponse {
            count: sessions.len(),
            sessions,
            reaped,
        }
    }
}

impl Default for SshSessionTools {
    fn default() -> Self {
        Self::new(SESSION_REGISTRY.clone())
    }
}

/// Map an executor outcome onto the tool response. A timeout is not an
/// error here: the partial output is returned with its kind and a note.
fn respond(
    session_id: String,
    request: &CommandRequest,
    outcome: Result<CommandResult, SshError>,
) -> Result<CommandResponse, SshError> {
    match outcome {
        Ok(result) => {
            let response = CommandResponse::new(session_id, result);
            if response.truncated {
                let message = format!(
                    "Output exceeded {} bytes per stream and was truncated",
                    request.max_output
                );
                Ok(response.with_message(message))
            } else {
                Ok(response)
            }
        }
        Err(SshError::Timeout { timeout, partial }) => {
            let message = TimeoutMessageBuilder::new(&session_id, &request.command, timeout).build();
            Ok(CommandResponse::new(session_id, *partial)
                .with_error_kind(TIMEOUT_ERROR_KIND)
                .with_message(message))
        }
        Err(e) => Err(e),
    }
}

#[Tools]
impl SshSessionTools {
    /// Start a persistent SSH session and return its session_id.
    ///
    /// The session stays open until `ssh_close_session` is called. Omitted
    /// parameters fall back to SSH_DEFAULT_HOST, SSH_DEFAULT_USERNAME and
    /// SSH_DEFAULT_PASSWORD. The password is kept in memory for
    /// `ssh_exec_sudo_command` and never returned.
    async fn ssh_start_session(
        &self,
        /// SSH server as "host" or "host:port" (default: localhost, env: SSH_DEFAULT_HOST)
        host: Option<String>,
        /// SSH username (env: SSH_DEFAULT_USERNAME, falls back to USER)
        username: Option<String>,
        /// Password used to log in and to answer sudo prompts (env: SSH_DEFAULT_PASSWORD)
        password: Option<String>,
        /// Connection timeout in seconds (default: 30, env: SSH_CONNECT_TIMEOUT)
        timeout_secs: Option<u64>,
    ) -> Result<StructuredContent<StartSessionResponse>, String> {
        self.start_session(host, username, password, timeout_secs)
            .await
            .map(StructuredContent)
            .map_err(|e| e.render())
    }

    /// Execute a command on an SSH session.
    ///
    /// Commands on the same session run one at a time in arrival order.
    /// On timeout the partial output is returned with `truncated: true` and
    /// the session remains usable.
    async fn ssh_exec_command(
        &self,
        /// Session ID returned by ssh_start_session
        session_id: String,
        /// Command to execute
        command: String,
        /// Text written to the command's stdin (optional)
        input_data: Option<String>,
        /// Command timeout in seconds (default: 180, env: SSH_COMMAND_TIMEOUT)
        timeout_secs: Option<u64>,
    ) -> Result<StructuredContent<CommandResponse>, String> {
        self.exec_command(session_id, command, input_data, timeout_secs)
            .await
            .map(StructuredContent)
            .map_err(|e| e.render())
    }

    /// Execute a command with sudo on an SSH session.
    ///
    /// The password is fed to sudo on stdin and redacted from the output.
    /// Without a `password` the session password is used. A rejected password
    /// yields an AuthFailedError and leaves the session usable.
    async fn ssh_exec_sudo_command(
        &self,
        /// Session ID returned by ssh_start_session
        session_id: String,
        /// Command to execute as root
        command: String,
        /// Text written to the command's stdin after the password (optional)
        input_data: Option<String>,
        /// Command timeout in seconds (default: 180, env: SSH_COMMAND_TIMEOUT)
        timeout_secs: Option<u64>,
        /// sudo password for this call only (default: the session password)
        password: Option<String>,
    ) -> Result<StructuredContent<CommandResponse>, String> {
        self.exec_sudo_command(session_id, command, input_data, timeout_secs, password)
            .await
            .map(StructuredContent)
            .map_err(|e| e.render())
    }

    /// Close an SSH session and release its connection.
    ///
    /// A command still running on the session is aborted.
    async fn ssh_close_session(
        &self,
        /// Session ID to close
        session_id: String,
    ) -> Result<StructuredContent<CloseSessionResponse>, String> {
        info!("Closing SSH session: {}", session_id);
        self.close_session(session_id)
            .await
            .map(StructuredContent)
            .map_err(|e| e.render())
    }

    /// List open SSH sessions with their metadata.
    ///
    /// Sessions whose connection failed are closed and removed first.
    async fn ssh_list_sessions(&self) -> StructuredContent<SessionListResponse> {
        StructuredContent(self.list_sessions().await)
    }
}
