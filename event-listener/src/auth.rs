//! Authentication seam
//!
//! The listener never logs in by itself. It consumes an `AuthProvider`
//! that knows the event socket URL, the current bearer token, when the
//! last successful authentication happened, and how to refresh it.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::ListenerError;

/// Failure reported by an `AuthProvider` refresh
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server refused the credentials; the session cannot continue
    #[error("Credentials rejected: {0}")]
    Rejected(String),

    /// The auth endpoint could not be reached; worth retrying later
    #[error("Auth service unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthError> for ListenerError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Rejected(msg) => ListenerError::AuthFailed(msg),
            AuthError::Unavailable(msg) => ListenerError::WebSocket(format!("token refresh failed: {msg}")),
        }
    }
}

/// Source of credentials for the event socket
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// WebSocket URL handed out by the last authentication
    fn event_listener_url(&self) -> Option<String>;

    /// Current bearer token
    fn bearer_token(&self) -> Option<String>;

    /// When the token was last obtained, if ever
    fn last_authenticated(&self) -> Option<SystemTime>;

    /// Re-run the last successful authentication to obtain a fresh token
    async fn refresh_token(&self) -> Result<(), AuthError>;

    /// Whether the token is old enough to be refreshed before connecting
    fn needs_refresh(&self, threshold: Duration) -> bool {
        self.last_authenticated()
            .and_then(|at| at.elapsed().ok())
            .is_some_and(|age| age >= threshold)
    }
}

/// Fixed credentials, for tests and tools that manage tokens themselves
///
/// `refresh_token` only restamps the authentication time.
#[derive(Debug)]
pub struct StaticAuth {
    url: String,
    token: String,
    authenticated_at: RwLock<SystemTime>,
}

impl StaticAuth {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            authenticated_at: RwLock::new(SystemTime::now()),
        }
    }

    /// Pretend the token was obtained at a given time
    pub fn authenticated_at(self, at: SystemTime) -> Self {
        *self.authenticated_at.write() = at;
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    fn event_listener_url(&self) -> Option<String> {
        Some(self.url.clone())
    }

    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone())
    }

    fn last_authenticated(&self) -> Option<SystemTime> {
        Some(*self.authenticated_at.read())
    }

    async fn refresh_token(&self) -> Result<(), AuthError> {
        *self.authenticated_at.write() = SystemTime::now();
        Ok(())
    }
}
