//! Connection state machine
//!
//! One `Worker` runs per `listen()` call on its own task. It owns the
//! change detector and, while connected, the transport and health monitor,
//! so nothing else ever touches them. The loop is:
//!
//! ```text
//! refresh token -> connect -> grace -> JOIN -> stream
//!        ^                                       |
//!        |           transient error             |
//!        +------------- backoff <----------------+
//! ```
//!
//! Fatal errors end the session with `is_error` set. Cancellation is
//! observed between attempts, during the grace period, while streaming and
//! during backoff; a connection attempt already in flight runs to
//! completion or to the open timeout.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep, timeout};

use document_cache::ChangeDetector;

use crate::config::ListenOptions;
use crate::error::{ListenerError, Result};
use crate::health::{HealthAlarm, HealthMonitor};
use crate::listener::Shared;
use crate::observers::SnapshotEvent;
use crate::protocol::{ClientCommand, JoinData, ServerMessage, SnapshotMessage};
use crate::state::ConnectionPhase;
use crate::transport::{ConnectRequest, Frame, Transport, NORMAL_CLOSURE};

const NORMAL_CLOSURE_REASON: &str = "Normal closure";

pub(crate) struct Worker {
    shared: Arc<Shared>,
    options: ListenOptions,
    detector: ChangeDetector,
    cancel: watch::Receiver<bool>,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        options: ListenOptions,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared,
            options,
            detector: ChangeDetector::new(),
            cancel,
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Run until cancelled or a fatal error
    pub(crate) async fn run(mut self) {
        self.shared.announce_state();

        tracing::info!(
            "Listening to accommodation {} with {} snapshot flag(s)",
            self.options.accom_id,
            self.options.snapshots.len()
        );

        while !self.is_cancelled() {
            let error = match self.connect_and_stream().await {
                Ok(()) => break,
                Err(error) => error,
            };

            if self.is_cancelled() {
                tracing::debug!("Ignoring error after stop was requested: {}", error);
                break;
            }

            if error.is_fatal() {
                tracing::error!("Event listener stopped by fatal error: {}", error);
                self.shared.set_phase(ConnectionPhase::Failed);
                self.shared.update_state(|state| {
                    state.is_listening = false;
                    state.is_connected = false;
                    state.is_error = true;
                    state.error_message = Some(error.to_string());
                });
                return;
            }

            let attempts = self.shared.update_state(|state| {
                state.is_connected = false;
                state.reconnect_attempts = state.reconnect_attempts.saturating_add(1);
                state.reconnect_attempts
            });
            let delay = self.shared.config.backoff_delay(attempts);

            tracing::warn!(
                "Event connection lost ({}); reconnecting in {:?} (attempt {})",
                error,
                delay,
                attempts
            );
            self.shared.set_phase(ConnectionPhase::Reconnecting);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancelled(&mut self.cancel) => {
                    tracing::debug!("Backoff interrupted by stop");
                    break;
                }
            }
        }

        self.shared.set_phase(ConnectionPhase::Idle);
        self.shared.update_state(|state| {
            state.is_listening = false;
            state.is_connected = false;
        });
        tracing::info!("Event listener stopped");
    }

    /// One connection from token check to close
    ///
    /// `Ok(())` means the session was cancelled and the socket closed
    /// gracefully; every other outcome is an error for `run` to classify.
    async fn connect_and_stream(&mut self) -> Result<()> {
        self.shared.set_phase(ConnectionPhase::Connecting);

        let mut transport = self.connect().await?;

        self.shared.update_state(|state| {
            state.is_connected = true;
            state.reconnect_attempts = 0;
        });
        self.shared.set_phase(ConnectionPhase::Joining);
        tracing::info!("Event socket connected");

        tokio::select! {
            _ = sleep(self.shared.config.join_grace) => {}
            _ = cancelled(&mut self.cancel) => {
                return close_gracefully(transport.as_mut()).await;
            }
        }

        let join = ClientCommand::Join(JoinData::from(&self.options));
        send(transport.as_mut(), &join).await?;
        self.shared.set_phase(ConnectionPhase::Listening);

        let mut health = HealthMonitor::new(&self.shared.config, self.options.enable_ping_pong);

        loop {
            tokio::select! {
                frame = transport.next_frame() => {
                    let frame = match frame {
                        Some(frame) => frame?,
                        None => {
                            return Err(ListenerError::ConnectionClosed {
                                code: None,
                                reason: "stream ended".to_string(),
                            })
                        }
                    };

                    health.record_message();

                    match frame {
                        Frame::Text(text) => {
                            self.handle_text(transport.as_mut(), &mut health, &text).await?;
                        }
                        Frame::Heartbeat => {}
                        Frame::Closed { code, reason } => {
                            tracing::info!("Event socket closed by server: code={:?}, reason={}", code, reason);
                            return Err(ListenerError::ConnectionClosed { code, reason });
                        }
                    }
                }
                alarm = health.next_alarm() => {
                    match alarm {
                        HealthAlarm::PingDue => {
                            send(transport.as_mut(), &ClientCommand::Ping).await?;
                            health.ping_sent();
                        }
                        HealthAlarm::Stale(silence) => {
                            tracing::warn!("No message for {:?}; dropping connection", silence);
                            return Err(ListenerError::StaleConnection(silence));
                        }
                        HealthAlarm::PongOverdue(waited) => {
                            tracing::warn!("PONG timeout after {:?}; dropping connection", waited);
                            return Err(ListenerError::PongTimeout(waited));
                        }
                    }
                }
                _ = cancelled(&mut self.cancel) => {
                    return close_gracefully(transport.as_mut()).await;
                }
            }
        }
    }

    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let shared = &self.shared;

        if shared.auth.needs_refresh(shared.config.token_refresh_threshold) {
            tracing::info!("Refreshing bearer token before connecting");
            shared.auth.refresh_token().await?;
            tracing::info!("Bearer token refreshed");
        }

        let url = shared.auth.event_listener_url().ok_or_else(|| {
            ListenerError::AuthFailed("No event listener URL; authenticate first".to_string())
        })?;
        let token = shared.auth.bearer_token().ok_or_else(|| {
            ListenerError::AuthFailed("No bearer token; authenticate first".to_string())
        })?;

        tracing::info!("Connecting to {}", url);

        let open_timeout = shared.config.open_timeout;
        timeout(open_timeout, shared.connector.connect(ConnectRequest::new(url, token)))
            .await
            .map_err(|_| ListenerError::OpenTimeout(open_timeout))?
    }

    async fn handle_text(
        &mut self,
        transport: &mut dyn Transport,
        health: &mut HealthMonitor,
        text: &str,
    ) -> Result<()> {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Ignoring unreadable message: {}", e);
                return Ok(());
            }
        };

        match message {
            ServerMessage::Snapshot(snapshot) => self.handle_snapshot(transport, snapshot).await,
            ServerMessage::Pong => {
                tracing::debug!("PONG received");
                health.pong_received();
                Ok(())
            }
            ServerMessage::Error(error) => {
                tracing::error!("Server error {}: {}", error.error_code, error.error_message);
                Err(ListenerError::from_server(&error.error_code, &error.error_message))
            }
            ServerMessage::Unknown(message_type) => {
                tracing::debug!("Ignoring message of unknown type '{}'", message_type);
                Ok(())
            }
        }
    }

    async fn handle_snapshot(
        &mut self,
        transport: &mut dyn Transport,
        snapshot: SnapshotMessage,
    ) -> Result<()> {
        if let Some(data) = snapshot.data.filter(|data| !data.is_null()) {
            let changes = self.detector.detect(&data);
            let progress = self.shared.record_snapshot();

            tracing::debug!(
                "SNAPSHOT {}/{} with {} change(s)",
                progress.received,
                progress.expected,
                changes.len()
            );

            let event = SnapshotEvent {
                is_initialized: progress.is_initialized(),
                raw: data,
                changes,
            };

            self.shared.observers.emit_snapshot(&event);
            for change in &event.changes {
                self.shared.observers.emit_document_changed(change);
            }
        }

        if snapshot.queue_count > 0 {
            send(transport, &ClientCommand::Accept).await?;
        }

        Ok(())
    }
}

async fn send(transport: &mut dyn Transport, command: &ClientCommand) -> Result<()> {
    let text = command.to_text()?;
    transport.send_text(text).await?;
    tracing::debug!("{} sent", command.name());
    Ok(())
}

async fn close_gracefully(transport: &mut dyn Transport) -> Result<()> {
    tracing::debug!("Closing event socket");
    if let Err(e) = transport.close(NORMAL_CLOSURE, NORMAL_CLOSURE_REASON).await {
        tracing::debug!("Error while closing event socket: {}", e);
    }
    Ok(())
}

/// Resolves once stop is requested or the facade is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|requested| *requested).await;
}
