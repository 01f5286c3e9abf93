//! Session-secret authentication over an established russh handle.
//!
//! The secret is offered as a plain password first. Servers that only
//! enable `keyboard-interactive` (PAM setups) get the same secret as the
//! answer to every prompt, for a bounded number of rounds.

use russh::client::{self, KeyboardInteractiveAuthResponse};
use tracing::debug;

use crate::mcp::error::SshError;
use crate::mcp::session::Secret;

use super::handler::SshClientHandler;

/// Upper bound on keyboard-interactive info-request rounds.
const MAX_INTERACTIVE_ROUNDS: usize = 3;

/// Authenticate `username` with the session secret.
///
/// # Errors
///
/// `Auth` when both methods are rejected, `Network` when the transport fails
/// mid-exchange. Messages never contain the secret.
pub(crate) async fn authenticate(
    handle: &mut client::Handle<SshClientHandler>,
    username: &str,
    secret: &Secret,
) -> Result<(), SshError> {
    let password = handle
        .authenticate_password(username, secret.expose())
        .await
        .map_err(|e| SshError::Network(format!("Password authentication error: {}", e)))?;
    if password.success() {
        debug!("Password authentication accepted for {}", username);
        return Ok(());
    }

    debug!(
        "Password authentication rejected for {}, trying keyboard-interactive",
        username
    );
    if keyboard_interactive(handle, username, secret).await? {
        debug!("Keyboard-interactive authentication accepted for {}", username);
        return Ok(());
    }

    Err(SshError::Auth(format!(
        "Authentication failed: credentials rejected for user '{}'",
        username
    )))
}

async fn keyboard_interactive(
    handle: &mut client::Handle<SshClientHandler>,
    username: &str,
    secret: &Secret,
) -> Result<bool, SshError> {
    let transport_error =
        |e: russh::Error| SshError::Network(format!("Keyboard-interactive error: {}", e));

    let mut response = handle
        .authenticate_keyboard_interactive_start(username, None::<String>)
        .await
        .map_err(transport_error)?;

    for _ in 0..MAX_INTERACTIVE_ROUNDS {
        match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest { ref prompts, .. } => {
                let answers = interactive_answers(prompts.len(), secret);
                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await
                    .map_err(transport_error)?;
            }
        }
    }

    Ok(matches!(response, KeyboardInteractiveAuthResponse::Success))
}

/// One copy of the secret per prompt; an empty round gets no answers.
fn interactive_answers(prompt_count: usize, secret: &Secret) -> Vec<String> {
    vec![secret.expose().to_string(); prompt_count]
}
