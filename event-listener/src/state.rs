//! Observable state of a listener session

use serde::Serialize;

/// Connection state reported through `on_state_changed`
///
/// Callers always receive copies. `is_listening == false` implies
/// `is_connected == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerState {
    pub is_listening: bool,
    pub is_connected: bool,
    pub is_error: bool,
    pub error_message: Option<String>,
    pub reconnect_attempts: u32,
}

/// Where the connection state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// Not listening
    #[default]
    Idle,
    /// Refreshing credentials or opening the socket
    Connecting,
    /// Socket open, waiting out the grace period before JOIN
    Joining,
    /// JOIN sent, streaming messages
    Listening,
    /// Waiting out a backoff delay
    Reconnecting,
    /// Stopped by a fatal server error
    Failed,
}

impl ConnectionPhase {
    pub fn is_active(self) -> bool {
        !matches!(self, ConnectionPhase::Idle | ConnectionPhase::Failed)
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionPhase::Idle => "idle",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Joining => "joining",
            ConnectionPhase::Listening => "listening",
            ConnectionPhase::Reconnecting => "reconnecting",
            ConnectionPhase::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Initialization progress of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotProgress {
    /// SNAPSHOT messages with data received since `listen()`
    pub received: usize,
    /// Number of snapshot flags requested
    pub expected: usize,
}

impl SnapshotProgress {
    pub fn new(expected: usize) -> Self {
        Self { received: 0, expected }
    }

    pub fn is_initialized(&self) -> bool {
        self.received >= self.expected
    }
}
