//! Privileged command execution.
//!
//! Commands run as `sudo -S -k -p <marker> -- sh -c <command>`:
//!
//! - `-S` reads the password from stdin, so the secret never shows up in a
//!   process listing or shell history.
//! - `-k` ignores cached credentials, so the injected password line is always
//!   consumed by sudo and never leaks into the command's stdin.
//! - `-p` replaces the localized prompt with [`SUDO_PROMPT`], which is stripped
//!   from the captured stderr.
//!
//! The secret (the session's, or one given for the call) and a newline are
//! written as soon as the channel is open,
//! followed by the caller's input and EOF. Everything returned to the caller
//! passes through [`redact`] first.
//!
//! ## Escalation failures
//!
//! sudo exits with status 1 and prints one of [`SUDO_FAILURE_MARKERS`] when it
//! rejects the password or the user. That is reported as
//! [`SshError::AuthFailed`]; the session itself stays usable.

use tracing::{info, warn};

use crate::mcp::error::SshError;
use crate::mcp::executor::{CommandRequest, finish, run_command};
use crate::mcp::session::{Secret, Session};
use crate::mcp::types::CommandResult;

/// Prompt installed with `sudo -p`.
pub const SUDO_PROMPT: &str = "[ssh-session-mcp] sudo password: ";

/// Replacement for any literal occurrence of the secret.
const REDACTED: &str = "***";

/// sudo's exit status for a refused escalation.
const SUDO_FAILURE_STATUS: i32 = 1;

/// stderr fragments sudo prints when escalation is refused.
pub const SUDO_FAILURE_MARKERS: &[&str] = &[
    "incorrect password attempt",
    "Sorry, try again",
    "is not in the sudoers file",
    "is not allowed to execute",
    "a password is required",
    "no password was provided",
    "Authentication failure",
];

/// Wrap `command` in an elevated, stdin-authenticated invocation.
pub fn build_sudo_command(command: &str) -> Result<String, SshError> {
    let quoted = shlex::try_quote(command).map_err(|e| {
        SshError::Channel(format!("Cannot run command under sudo: {}", e))
    })?;
    let prompt = shlex::try_quote(SUDO_PROMPT)
        .map_err(|e| SshError::Channel(format!("Invalid sudo prompt: {}", e)))?;

    Ok(format!("sudo -S -k -p {} -- sh -c {}", prompt, quoted))
}

/// Remove every trace of `secret` from `text`.
///
/// Lines consisting of the secret alone (an echoed password) are dropped,
/// any remaining occurrence is masked.
pub fn redact(text: &str, secret: &Secret) -> String {
    if secret.is_empty() || !text.contains(secret.expose()) {
        return text.to_string();
    }
    let secret = secret.expose();

    let kept: String = text
        .split_inclusive('\n')
        .filter(|line| line.trim_end_matches(['\r', '\n']) != secret)
        .collect();

    kept.replace(secret, REDACTED)
}

/// Drop the sudo prompt, and the newline sudo prints after reading the
/// password, from captured stderr.
fn strip_prompt(stderr: &str) -> String {
    let mut out = String::with_capacity(stderr.len());
    let mut rest = stderr;
    while let Some(pos) = rest.find(SUDO_PROMPT) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + SUDO_PROMPT.len()..];
        rest = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
    }
    out.push_str(rest);
    out
}

/// Whether a finished sudo invocation was refused by sudo itself.
pub fn is_escalation_failure(result: &CommandResult) -> bool {
    result.exit_status == SUDO_FAILURE_STATUS
        && SUDO_FAILURE_MARKERS
            .iter()
            .any(|marker| result.stderr.contains(marker))
}

fn sanitize(mut result: CommandResult, secrets: &[&Secret]) -> CommandResult {
    result.stderr = strip_prompt(&result.stderr);
    for secret in secrets {
        result.stdout = redact(&result.stdout, secret);
        result.stderr = redact(&result.stderr, secret);
    }
    result
}

/// Execute `request` with elevated privileges, answering sudo with the
/// session's stored secret.
///
/// # Errors
///
/// Same as [`crate::mcp::executor::execute`], plus `AuthFailed` when sudo
/// refuses the secret.
pub async fn execute_sudo(
    session: &Session,
    request: &CommandRequest,
) -> Result<CommandResult, SshError> {
    execute_sudo_with(session, request, None).await
}

/// Like [`execute_sudo`], but answers sudo with `password` when given.
///
/// An empty `password` counts as absent. Both the answered secret and the
/// stored one are redacted from the result.
pub async fn execute_sudo_with(
    session: &Session,
    request: &CommandRequest,
    password: Option<&Secret>,
) -> Result<CommandResult, SshError> {
    info!(
        "Executing sudo command on SSH session {} with timeout {}s: {}",
        session.id(),
        request.timeout.as_secs(),
        request.command
    );

    let elevated = build_sudo_command(&request.command)?;
    let stored = &session.credentials().secret;
    let secret = password.filter(|p| !p.is_empty()).unwrap_or(stored);
    let mut preamble = Vec::with_capacity(secret.expose().len() + 1);
    preamble.extend_from_slice(secret.expose().as_bytes());
    preamble.push(b'\n');

    let raw = run_command(session, &elevated, Some(&preamble), request).await?;
    let timed_out = raw.timed_out;
    let result = sanitize(raw.into_result(), &[secret, stored]);

    if !timed_out && is_escalation_failure(&result) {
        warn!(
            "Privilege escalation refused on SSH session {}",
            session.id()
        );
        return Err(SshError::AuthFailed(format!(
            "sudo authentication failed: {}",
            result.stderr.trim()
        )));
    }

    finish(result, timed_out, request.timeout)
}
