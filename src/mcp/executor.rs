//! Command executor.
//!
//! Runs one command on a live session:
//!
//! 1. Acquire the session guard (the only serialization point; commands on
//!    different sessions never wait on each other).
//! 2. Open a fresh channel, start the command, write the optional input and
//!    signal EOF so no command is left waiting on stdin.
//! 3. Drain stdout and stderr from the channel's event stream until the
//!    channel ends or the timeout elapses.
//! 4. Close the channel and release the guard, on every path.
//!
//! ## Timeout Behavior
//!
//! On timeout the channel is closed, the output collected so far is kept with
//! `truncated = true`, and [`SshError::Timeout`] carries that partial result.
//! The session stays `Active`.
//!
//! ## Output limit
//!
//! Each stream keeps at most [`CommandRequest::max_output`] bytes. Anything
//! past that is drained and dropped, and the result is marked `truncated`
//! without being an error.
//!
//! ## Transport failures
//!
//! A channel that cannot be opened or written, or a connection that dies
//! mid-command, moves the session to `Error` (unless it is being closed) and
//! yields [`SshError::Channel`].

use std::time::Duration;

use tracing::{error, info, warn};

use crate::mcp::error::SshError;
use crate::mcp::session::Session;
use crate::mcp::transport::ChannelEvent;
use crate::mcp::types::{CommandResult, SessionState};

/// Per-stream capture limit.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;

/// One command invocation.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub input: Option<String>,
    pub timeout: Duration,
    /// Bytes kept per stream, see the module docs
    pub max_output: usize,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            input: None,
            timeout,
            max_output: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_input(mut self, input: Option<String>) -> Self {
        self.input = input;
        self
    }

    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }
}

/// Bytes captured from one channel before any post-processing.
#[derive(Debug, Default)]
pub(crate) struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: Option<u32>,
    /// Output was dropped, by the timeout or the output limit
    pub truncated: bool,
    pub timed_out: bool,
}

/// Append up to `limit` total bytes; returns whether anything was dropped.
fn append_capped(buf: &mut Vec<u8>, data: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(buf.len());
    if data.len() <= room {
        buf.extend_from_slice(data);
        false
    } else {
        buf.extend_from_slice(&data[..room]);
        true
    }
}

impl RawOutput {
    pub(crate) fn into_result(self) -> CommandResult {
        CommandResult {
            exit_status: self.exit_status.map(|c| c as i32).unwrap_or(-1),
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            truncated: self.truncated,
        }
    }
}

/// Execute a command on `session`.
///
/// # Errors
///
/// * `NotFound` - the session was closed
/// * `Timeout` - deadline exceeded, partial output attached
/// * `Channel` - transport failure; the session is now in `Error`
pub async fn execute(session: &Session, request: &CommandRequest) -> Result<CommandResult, SshError> {
    info!(
        "Executing command on SSH session {} with timeout {}s: {}",
        session.id(),
        request.timeout.as_secs(),
        request.command
    );

    let raw = run_command(session, &request.command, None, request).await?;
    let timed_out = raw.timed_out;

    finish(raw.into_result(), timed_out, request.timeout)
}

/// Turn a captured result into the caller-facing outcome.
pub(crate) fn finish(
    result: CommandResult,
    timed_out: bool,
    timeout: Duration,
) -> Result<CommandResult, SshError> {
    if timed_out {
        Err(SshError::Timeout {
            timeout,
            partial: Box::new(result),
        })
    } else {
        Ok(result)
    }
}

fn ensure_usable(session: &Session) -> Result<(), SshError> {
    let state = session.state();
    if !state.is_terminal() {
        return Ok(());
    }
    if state == SessionState::Error {
        return Err(SshError::Channel(format!(
            "Session {} is in error state; close it and start a new session",
            session.id()
        )));
    }
    Err(SshError::NotFound(session.id().to_string()))
}

/// Map a transport failure, moving the session to `Error` unless it is closing.
fn channel_failure(session: &Session, err: SshError) -> SshError {
    if session.closed_token().is_cancelled() {
        return SshError::Channel(format!(
            "Session {} was closed while the command was running",
            session.id()
        ));
    }

    error!("Channel failure on SSH session {}: {}", session.id(), err);
    session.mark_error();
    match err {
        SshError::Channel(_) => err,
        other => SshError::Channel(other.to_string()),
    }
}

/// The shared acquire-guard / open-channel / drain protocol.
///
/// `command` is what runs remotely (it may differ from `request.command`).
/// `preamble` is written before the request input; both are followed by EOF.
/// A timeout is reported through `RawOutput::timed_out`, not as an error, so
/// callers can post-process partial output first.
pub(crate) async fn run_command(
    session: &Session,
    command: &str,
    preamble: Option<&[u8]>,
    request: &CommandRequest,
) -> Result<RawOutput, SshError> {
    let timeout = request.timeout;
    let limit = request.max_output;
    let input = request.input.as_deref().map(str::as_bytes);

    ensure_usable(session)?;
    let _guard = session.lock().await;
    // The session may have been closed while we were queued
    ensure_usable(session)?;

    let mut channel = match session.connection().open_channel().await {
        Ok(channel) => channel,
        Err(e) => return Err(channel_failure(session, e)),
    };

    let closed = session.closed_token().clone();
    let mut output = RawOutput {
        stdout: Vec::with_capacity(4096),
        stderr: Vec::with_capacity(1024),
        ..Default::default()
    };

    let drained = tokio::time::timeout(timeout, async {
        channel.exec(command).await?;
        if let Some(preamble) = preamble {
            channel.write(preamble).await?;
        }
        if let Some(input) = input {
            channel.write(input).await?;
        }
        channel.eof().await?;

        loop {
            let event = tokio::select! {
                biased;
                _ = closed.cancelled() => {
                    return Err(SshError::Channel("Session closed".to_string()));
                }
                event = channel.next_event() => event,
            };

            match event {
                Some(ChannelEvent::Stdout(data)) => {
                    output.truncated |= append_capped(&mut output.stdout, &data, limit);
                }
                Some(ChannelEvent::Stderr(data)) => {
                    output.truncated |= append_capped(&mut output.stderr, &data, limit);
                }
                Some(ChannelEvent::ExitStatus(status)) => output.exit_status = Some(status),
                Some(ChannelEvent::Eof) => {
                    // Continue to wait for exit status if not received yet
                    if output.exit_status.is_some() {
                        break;
                    }
                }
                Some(ChannelEvent::Closed) | None => break,
            }
        }
        Ok::<(), SshError>(())
    })
    .await;

    channel.close().await;

    match drained {
        Err(_) => {
            output.truncated = true;
            output.timed_out = true;
            warn!(
                "Command on SSH session {} timed out after {:?}, returning partial output ({} bytes stdout, {} bytes stderr)",
                session.id(),
                timeout,
                output.stdout.len(),
                output.stderr.len()
            );
        }
        Ok(Err(e)) => return Err(channel_failure(session, e)),
        Ok(Ok(())) => {
            if output.exit_status.is_none() && session.connection().is_closed() {
                return Err(channel_failure(
                    session,
                    SshError::Channel("Connection lost while the command was running".to_string()),
                ));
            }
            if output.truncated {
                warn!(
                    "Output of command on SSH session {} exceeded {} bytes per stream and was truncated",
                    session.id(),
                    limit
                );
            }
            session.touch();
        }
    }

    Ok(output)
}
