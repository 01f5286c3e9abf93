//! The session entity.
//!
//! A [`Session`] owns one authenticated transport connection plus everything
//! needed to run commands on it:
//!
//! - `guard`: a fair `tokio::sync::Mutex` held by the executors for the full
//!   duration of one command, so two channels never interleave on the same
//!   connection. Waiters are served in FIFO order.
//! - `state`: published through a `watch` channel so readers never need the
//!   guard to observe it.
//! - `closed`: cancelled by the registry on close; an in-flight command sees
//!   it on its next read and fails with a channel error.
//!
//! Sessions are shared as `Arc<Session>`. The registry hands out clones and
//! drops its own reference on close; the connection is torn down explicitly,
//! not on drop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio_util::sync::CancellationToken;

use crate::mcp::transport::Connection;
use crate::mcp::types::{SessionInfo, SessionState};

/// A secret that never shows up in `Debug` or `Display` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only the transport and the sudo executor need it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Host, username and secret of a session.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// `host` or `host:port`
    pub host: String,
    pub username: String,
    pub secret: Secret,
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            secret: Secret::new(secret),
        }
    }
}

/// One authenticated remote-shell connection.
pub struct Session {
    id: String,
    credentials: Credentials,
    connection: Arc<dyn Connection>,
    connected_at: DateTime<Utc>,
    guard: Mutex<()>,
    state: watch::Sender<SessionState>,
    last_used_at: watch::Sender<Option<DateTime<Utc>>>,
    commands_executed: AtomicU64,
    closed: CancellationToken,
}

impl Session {
    /// Wrap a freshly authenticated connection. The session starts `Active`.
    pub fn new(id: String, credentials: Credentials, connection: Box<dyn Connection>) -> Self {
        let (state, _) = watch::channel(SessionState::Active);
        let (last_used_at, _) = watch::channel(None);
        Self {
            id,
            credentials,
            connection: Arc::from(connection),
            connected_at: Utc::now(),
            guard: Mutex::new(()),
            state,
            last_used_at,
            commands_executed: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Move an `Active` session to `Error`. Closing/closed sessions are left alone.
    pub(crate) fn mark_error(&self) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Active || *state == SessionState::Connecting {
                *state = SessionState::Error;
                true
            } else {
                false
            }
        });
    }

    /// Acquire the per-session execution guard, waiting behind earlier callers.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().await
    }

    /// Whether a command currently holds the guard.
    pub fn is_busy(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    pub(crate) fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        *self.last_used_at.borrow()
    }

    pub(crate) fn touch(&self) {
        self.last_used_at.send_replace(Some(Utc::now()));
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commands_executed(&self) -> u64 {
        self.commands_executed.load(Ordering::Relaxed)
    }

    /// Tear the session down: `Closing`, release the connection, `Closed`.
    ///
    /// Does not wait for the guard; a command in flight observes the
    /// cancellation and the dead connection on its next read or write.
    pub(crate) async fn shutdown(&self) {
        self.set_state(SessionState::Closing);
        self.closed.cancel();
        self.connection.close().await;
        self.set_state(SessionState::Closed);
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            host: self.credentials.host.clone(),
            username: self.credentials.username.clone(),
            state: self.state(),
            connected_at: self.connected_at.to_rfc3339(),
            last_used_at: self.last_used_at().map(|t| t.to_rfc3339()),
            commands_executed: self.commands_executed(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("host", &self.credentials.host)
            .field("username", &self.credentials.username)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
