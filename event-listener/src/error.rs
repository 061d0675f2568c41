//! Error types for the event-listener crate.

use std::time::Duration;

/// Errors that can occur while listening for events.
///
/// Only [`ListenerError::AuthFailed`] and [`ListenerError::Protocol`] are
/// fatal to a listen session; everything else is retried with backoff.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Authentication was rejected, or no credentials are available
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The server reported a protocol-level error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The socket did not open in time
    #[error("Connection did not open within {0:?}")]
    OpenTimeout(Duration),

    /// A transport-level failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The socket closed without being asked to
    #[error("Connection closed (code: {code:?}, reason: {reason})")]
    ConnectionClosed {
        /// Close code sent by the peer, if any
        code: Option<u16>,
        /// Close reason sent by the peer
        reason: String,
    },

    /// No inbound message for too long
    #[error("No message received for {0:?}")]
    StaleConnection(Duration),

    /// A PING went unanswered
    #[error("No PONG received within {0:?}")]
    PongTimeout(Duration),

    /// A message could not be encoded or decoded
    #[error("Failed to parse message: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid configuration or listen options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation needs an active `listen()` session
    #[error("Listener is not listening; call listen() first")]
    NotListening,

    /// `listen()` was called outside a Tokio runtime
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),
}

impl ListenerError {
    /// Whether this error ends the listen session instead of triggering a reconnect
    pub fn is_fatal(&self) -> bool {
        matches!(self, ListenerError::AuthFailed(_) | ListenerError::Protocol(_))
    }

    /// Map a server ERROR message onto the fatal error taxonomy
    pub fn from_server(error_code: &str, error_message: &str) -> Self {
        let message = if error_message.is_empty() {
            format!("server error: {error_code}")
        } else {
            error_message.to_string()
        };

        if error_code == "AUTH_FAILED" {
            ListenerError::AuthFailed(message)
        } else {
            ListenerError::Protocol(message)
        }
    }
}

/// Convenience type alias for Results using ListenerError.
pub type Result<T> = std::result::Result<T, ListenerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_error_display() {
        let error = ListenerError::AuthFailed("token expired".to_string());
        assert_eq!(error.to_string(), "Authentication failed: token expired");

        let error = ListenerError::ConnectionClosed {
            code: Some(1006),
            reason: "abnormal".to_string(),
        };
        assert!(error.to_string().contains("1006"));
        assert!(error.to_string().contains("abnormal"));

        let error = ListenerError::OpenTimeout(Duration::from_secs(10));
        assert_eq!(error.to_string(), "Connection did not open within 10s");

        let error = ListenerError::NotListening;
        assert!(error.to_string().contains("listen()"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ListenerError::AuthFailed("x".to_string()).is_fatal());
        assert!(ListenerError::Protocol("x".to_string()).is_fatal());

        assert!(!ListenerError::OpenTimeout(Duration::from_secs(1)).is_fatal());
        assert!(!ListenerError::WebSocket("reset".to_string()).is_fatal());
        assert!(!ListenerError::StaleConnection(Duration::from_secs(120)).is_fatal());
        assert!(!ListenerError::PongTimeout(Duration::from_secs(15)).is_fatal());
        assert!(!ListenerError::ConnectionClosed {
            code: None,
            reason: String::new()
        }
        .is_fatal());
    }

    #[test]
    fn test_from_server() {
        match ListenerError::from_server("AUTH_FAILED", "bad token") {
            ListenerError::AuthFailed(msg) => assert_eq!(msg, "bad token"),
            other => panic!("Expected AuthFailed, got {other:?}"),
        }

        match ListenerError::from_server("ROOM_NOT_FOUND", "") {
            ListenerError::Protocol(msg) => assert_eq!(msg, "server error: ROOM_NOT_FOUND"),
            other => panic!("Expected Protocol, got {other:?}"),
        }
    }

    #[test]
    fn test_error_conversion_from_serde() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: ListenerError = parse_error.into();
        assert!(matches!(error, ListenerError::Parse(_)));
        assert!(!error.is_fatal());
    }
}
