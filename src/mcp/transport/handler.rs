//! russh client handler.
//!
//! # Security Note
//!
//! All server host keys are accepted, similar to `StrictHostKeyChecking=no`
//! in OpenSSH. Sessions are meant for hosts the operator already trusts
//! (the default target is `localhost`).

use russh::{client, keys};
use tracing::debug;

/// Client handler for russh that accepts all host keys.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting server host key ({:?})",
            server_public_key.algorithm()
        );
        Ok(true)
    }
}
