//! Session registry.
//!
//! Process-wide mapping from session id to [`Session`], backed by `DashMap`.
//! The shard locks are the registry lock: they are held only to look up,
//! insert or remove an entry and never across an `.await`. Callers get an
//! `Arc<Session>` clone and take the session's own guard afterwards, so the
//! registry lock is always released before a guard is acquired.
//!
//! # Lifecycle
//!
//! - `create`: connect first (no lock held), then insert under a fresh UUID.
//!   A failed connect inserts nothing.
//! - `close`: remove first, so other callers immediately get `NotFound`, then
//!   tear the connection down without holding any registry lock. A command
//!   still holding the session guard sees the dead connection as a channel
//!   error.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use once_cell::sync::Lazy;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::mcp::config::resolve_compression;
use crate::mcp::error::SshError;
use crate::mcp::session::{Credentials, Session};
use crate::mcp::transport::{Connector, RusshConnector};
use crate::mcp::types::{SessionInfo, SessionState};

/// Thread-safe registry of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    connector: Arc<dyn Connector>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            sessions: DashMap::new(),
            connector,
        }
    }

    /// Connect and register a new session, returning its id.
    ///
    /// # Errors
    ///
    /// `Auth` or `Network` from the connector. Nothing is registered then.
    pub async fn create(
        &self,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<String, SshError> {
        info!(
            "Starting SSH session to {}@{} with timeout {}s",
            credentials.username,
            credentials.host,
            timeout.as_secs()
        );

        let connection = self
            .connector
            .connect(&credentials, timeout)
            .await
            .inspect_err(|e| {
                error!(
                    "SSH connection to {}@{} failed ({}): {}",
                    credentials.username,
                    credentials.host,
                    e.kind(),
                    e
                );
            })?;

        let mut session_id = Uuid::new_v4().to_string();
        loop {
            match self.sessions.entry(session_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(Session::new(
                        session_id.clone(),
                        credentials,
                        connection,
                    )));
                    break;
                }
                Entry::Occupied(_) => {
                    warn!("Session id collision on {}, regenerating", session_id);
                    session_id = Uuid::new_v4().to_string();
                }
            }
        }

        info!("Started SSH session {}", session_id);
        Ok(session_id)
    }

    /// Look up a session.
    ///
    /// The returned handle stays valid after `close`, but every command on it
    /// then fails.
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>, SshError> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SshError::NotFound(session_id.to_string()))
    }

    /// Remove a session and release its connection.
    pub async fn close(&self, session_id: &str) -> Result<SessionInfo, SshError> {
        let (_, session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SshError::NotFound(session_id.to_string()))?;

        if session.is_busy() {
            info!(
                "Closing SSH session {} while a command is still running",
                session_id
            );
        }

        session.shutdown().await;
        info!("Closed SSH session {}", session_id);
        Ok(session.info())
    }

    /// Snapshot of all registered sessions.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| entry.value().info())
            .collect()
    }

    /// Remove and tear down every session in the `Error` state.
    ///
    /// Returns the number of sessions reaped.
    pub async fn reap_errored(&self) -> usize {
        let errored: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().state() == SessionState::Error)
            .map(|entry| entry.key().clone())
            .collect();

        let mut reaped = Vec::with_capacity(errored.len());
        for id in errored {
            if let Some((_, session)) = self
                .sessions
                .remove_if(&id, |_, s| s.state() == SessionState::Error)
            {
                warn!("Reaping SSH session {} in error state", id);
                reaped.push(session);
            }
        }

        let count = reaped.len();
        join_all(reaped.iter().map(|session| session.shutdown())).await;
        count
    }

    /// Close every session. Used on shutdown.
    pub async fn close_all(&self) -> usize {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        let results = join_all(ids.iter().map(|id| self.close(id))).await;
        results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Process-wide registry backed by the russh connector.
pub static SESSION_REGISTRY: Lazy<Arc<SessionRegistry>> = Lazy::new(|| {
    Arc::new(SessionRegistry::new(Arc::new(RusshConnector::new(
        resolve_compression(None),
    ))))
});
