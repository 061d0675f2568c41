//! Test helpers for event-listener integration tests.
//!
//! This module provides:
//! - A scripted in-memory `Connector` standing in for the EagleApi server
//! - A controllable `AuthProvider`
//! - Observer recorders and message builders

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use event_listener::{
    AuthError, AuthProvider, ConnectRequest, Connector, DocumentChange, EventListener,
    Frame, ListenerConfig, ListenerError, ListenerState, SnapshotEvent, Transport,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ============================================================================
// Mock server
// ============================================================================

/// What the next connection attempt should do
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Accept,
    Fail(String),
    /// Never completes; only the open timeout ends it
    Hang,
}

/// Something the client wrote to a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(Value),
    Close { code: u16, reason: String },
}

struct ConnectorShared {
    script: Mutex<VecDeque<ConnectOutcome>>,
    attempts: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerConnection>,
}

/// Scripted connector; attempts beyond the script are accepted
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<ConnectorShared>,
}

/// Server side of the mock: hands out accepted connections
pub struct MockServer {
    shared: Arc<ConnectorShared>,
    accepted: mpsc::UnboundedReceiver<ServerConnection>,
}

pub fn mock_server() -> (Arc<MockConnector>, MockServer) {
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(ConnectorShared {
        script: Mutex::new(VecDeque::new()),
        attempts: AtomicUsize::new(0),
        accepted: accepted_tx,
    });

    (
        Arc::new(MockConnector {
            shared: Arc::clone(&shared),
        }),
        MockServer {
            shared,
            accepted: accepted_rx,
        },
    )
}

impl MockServer {
    pub fn script(&self, outcome: ConnectOutcome) {
        self.shared.script.lock().push_back(outcome);
    }

    pub fn connect_attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Next accepted connection, failing the test after a minute of (virtual) time
    pub async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(Duration::from_secs(60), self.accepted.recv())
            .await
            .expect("Timeout waiting for a connection")
            .expect("Connector dropped")
    }

    /// Accept, then consume the JOIN command
    pub async fn accept_joined(&mut self) -> (ServerConnection, Value) {
        let mut connection = self.accept().await;
        let join = connection.expect_command().await;
        assert_eq!(join["command"], "JOIN");
        (connection, join)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, request: ConnectRequest) -> event_listener::Result<Box<dyn Transport>> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        let outcome = self
            .shared
            .script
            .lock()
            .pop_front()
            .unwrap_or(ConnectOutcome::Accept);

        match outcome {
            ConnectOutcome::Accept => {
                let (to_client, inbound) = mpsc::unbounded_channel();
                let (outbound, from_client) = mpsc::unbounded_channel();

                let _ = self.shared.accepted.send(ServerConnection {
                    request,
                    to_client,
                    from_client,
                });

                Ok(Box::new(MockTransport { inbound, outbound }))
            }
            ConnectOutcome::Fail(reason) => Err(ListenerError::WebSocket(reason)),
            ConnectOutcome::Hang => std::future::pending().await,
        }
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<Sent>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, text: String) -> event_listener::Result<()> {
        let value: Value = serde_json::from_str(&text)?;
        self.outbound
            .send(Sent::Text(value))
            .map_err(|_| ListenerError::WebSocket("peer gone".to_string()))
    }

    async fn next_frame(&mut self) -> Option<event_listener::Result<Frame>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16, reason: &str) -> event_listener::Result<()> {
        let _ = self.outbound.send(Sent::Close {
            code,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

/// One accepted connection, seen from the server
pub struct ServerConnection {
    pub request: ConnectRequest,
    to_client: mpsc::UnboundedSender<Frame>,
    from_client: mpsc::UnboundedReceiver<Sent>,
}

impl ServerConnection {
    pub fn send(&self, message: Value) {
        let _ = self.to_client.send(Frame::Text(message.to_string()));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.to_client.send(Frame::Text(text.to_string()));
    }

    pub fn heartbeat(&self) {
        let _ = self.to_client.send(Frame::Heartbeat);
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.to_client.send(Frame::Closed {
            code: Some(code),
            reason: reason.to_string(),
        });
    }

    /// Next thing the client wrote; `None` once the client dropped the transport
    pub async fn next_sent(&mut self) -> Option<Sent> {
        self.next_sent_within(Duration::from_secs(60)).await
    }

    pub async fn next_sent_within(&mut self, limit: Duration) -> Option<Sent> {
        tokio::time::timeout(limit, self.from_client.recv())
            .await
            .expect("Timeout waiting for client output")
    }

    /// Next command the client sent, failing on anything else
    pub async fn expect_command(&mut self) -> Value {
        match self.next_sent().await {
            Some(Sent::Text(value)) => value,
            other => panic!("Expected a command, got {other:?}"),
        }
    }

    /// Drain everything written so far without waiting
    pub fn drain_sent(&mut self) -> Vec<Sent> {
        let mut sent = Vec::new();
        while let Ok(item) = self.from_client.try_recv() {
            sent.push(item);
        }
        sent
    }

    /// Wait until the client drops its side, collecting what it wrote
    pub async fn wait_dropped(&mut self) -> Vec<Sent> {
        let mut sent = Vec::new();
        while let Some(item) = self.next_sent_within(Duration::from_secs(600)).await {
            sent.push(item);
        }
        sent
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Auth provider with switchable credentials and a refresh counter
pub struct TestAuth {
    url: Mutex<Option<String>>,
    token: Mutex<Option<String>>,
    authenticated_at: Mutex<Option<SystemTime>>,
    refresh_error: Mutex<Option<AuthError>>,
    refreshes: AtomicUsize,
}

impl TestAuth {
    pub fn new() -> Self {
        Self {
            url: Mutex::new(Some("wss://events.test/ws".to_string())),
            token: Mutex::new(Some("token-1".to_string())),
            authenticated_at: Mutex::new(Some(SystemTime::now())),
            refresh_error: Mutex::new(None),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn without_url(self) -> Self {
        *self.url.lock() = None;
        self
    }

    pub fn authenticated_ago(self, age: Duration) -> Self {
        *self.authenticated_at.lock() = Some(SystemTime::now() - age);
        self
    }

    pub fn failing_refresh(self, error: AuthError) -> Self {
        *self.refresh_error.lock() = Some(error);
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for TestAuth {
    fn event_listener_url(&self) -> Option<String> {
        self.url.lock().clone()
    }

    fn bearer_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn last_authenticated(&self) -> Option<SystemTime> {
        *self.authenticated_at.lock()
    }

    async fn refresh_token(&self) -> Result<(), AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.refresh_error.lock().take() {
            return Err(error);
        }
        *self.token.lock() = Some(format!("token-{}", self.refreshes() + 1));
        *self.authenticated_at.lock() = Some(SystemTime::now());
        Ok(())
    }
}

// ============================================================================
// Listener setup and recorders
// ============================================================================

/// Default config without jitter so backoff timing is exact
pub fn test_config() -> ListenerConfig {
    ListenerConfig::default().with_reconnect_jitter(Duration::ZERO)
}

pub fn build_listener(auth: Arc<TestAuth>, connector: Arc<MockConnector>) -> EventListener {
    EventListener::builder(auth)
        .connector(connector)
        .config(test_config())
        .build()
        .expect("Failed to build listener")
}

/// Everything observers saw, in order
#[derive(Default)]
pub struct Recorded {
    pub states: Mutex<Vec<ListenerState>>,
    pub snapshots: Mutex<Vec<SnapshotEvent>>,
    pub changes: Mutex<Vec<DocumentChange>>,
}

impl Recorded {
    pub fn attach(listener: &EventListener) -> Arc<Self> {
        let recorded = Arc::new(Self::default());

        let sink = Arc::clone(&recorded);
        listener.on_state_changed(move |state| sink.states.lock().push(state.clone()));
        let sink = Arc::clone(&recorded);
        listener.on_snapshot(move |event| sink.snapshots.lock().push(event.clone()));
        let sink = Arc::clone(&recorded);
        listener.on_document_changed(move |change| sink.changes.lock().push(change.clone()));

        recorded
    }

    pub fn changes(&self) -> Vec<DocumentChange> {
        self.changes.lock().clone()
    }

    pub fn last_state(&self) -> Option<ListenerState> {
        self.states.lock().last().cloned()
    }
}

// ============================================================================
// Message builders
// ============================================================================

pub fn snapshot(queue_count: u64, data: Value) -> Value {
    json!({"type": "SNAPSHOT", "queue_count": queue_count, "data": data})
}

pub fn server_error(code: &str, message: &str) -> Value {
    json!({"type": "ERROR", "error_code": code, "error_message": message})
}

/// Let spawned tasks run without advancing the clock meaningfully
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
