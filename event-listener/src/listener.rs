//! Event Listener facade
//!
//! `EventListener` is the public surface: it starts and stops sessions,
//! exposes copies of the current state and lets callers attach typed
//! observers. All socket work happens on the worker task spawned by
//! `listen()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use document_cache::DocumentChange;

use crate::auth::AuthProvider;
use crate::config::{ListenOptions, ListenerConfig, DEFAULT_INIT_TIMEOUT, DEFAULT_STOP_TIMEOUT};
use crate::error::{ListenerError, Result};
use crate::observers::{ObserverId, Observers, SnapshotEvent};
use crate::state::{ConnectionPhase, ListenerState, SnapshotProgress};
use crate::transport::{Connector, WebSocketConnector};
use crate::worker::Worker;

/// State shared between the facade and the worker task
pub(crate) struct Shared {
    pub(crate) config: ListenerConfig,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) observers: Observers,
    state: RwLock<ListenerState>,
    phase: RwLock<ConnectionPhase>,
    progress: watch::Sender<SnapshotProgress>,
}

impl Shared {
    fn new(config: ListenerConfig, auth: Arc<dyn AuthProvider>, connector: Arc<dyn Connector>) -> Self {
        let (progress, _) = watch::channel(SnapshotProgress::default());
        Self {
            config,
            auth,
            connector,
            observers: Observers::new(),
            state: RwLock::new(ListenerState::default()),
            phase: RwLock::new(ConnectionPhase::Idle),
            progress,
        }
    }

    pub(crate) fn state(&self) -> ListenerState {
        self.state.read().clone()
    }

    /// Mutate the state and notify `on_state_changed` observers
    ///
    /// Observers run after the lock is released.
    pub(crate) fn update_state<R>(&self, mutate: impl FnOnce(&mut ListenerState) -> R) -> R {
        let (result, snapshot) = {
            let mut state = self.state.write();
            let result = mutate(&mut state);
            if !state.is_listening {
                state.is_connected = false;
            }
            (result, state.clone())
        };

        self.observers.emit_state(&snapshot);
        result
    }

    pub(crate) fn phase(&self) -> ConnectionPhase {
        *self.phase.read()
    }

    pub(crate) fn set_phase(&self, phase: ConnectionPhase) {
        let previous = std::mem::replace(&mut *self.phase.write(), phase);
        if previous != phase {
            tracing::debug!("Connection phase: {} -> {}", previous, phase);
        }
    }

    pub(crate) fn progress(&self) -> SnapshotProgress {
        *self.progress.borrow()
    }

    /// Count one SNAPSHOT with data and return the new progress
    pub(crate) fn record_snapshot(&self) -> SnapshotProgress {
        self.progress.send_modify(|progress| progress.received += 1);
        self.progress()
    }

    /// Reset state for a new session without notifying observers
    ///
    /// Runs under the facade's session lock; the worker announces the
    /// fresh state once it starts.
    fn begin_session(&self, expected_snapshots: usize) {
        self.progress.send_replace(SnapshotProgress::new(expected_snapshots));
        self.set_phase(ConnectionPhase::Connecting);
        *self.state.write() = ListenerState {
            is_listening: true,
            ..ListenerState::default()
        };
    }

    /// Send the current state to `on_state_changed` observers
    pub(crate) fn announce_state(&self) {
        let state = self.state();
        self.observers.emit_state(&state);
    }

    /// Mark the session over after the worker was aborted
    fn end_session_forcibly(&self) {
        self.set_phase(ConnectionPhase::Idle);
        if self.state.read().is_listening {
            self.update_state(|state| {
                state.is_listening = false;
                state.is_connected = false;
            });
        }
    }
}

struct Session {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Session {
    fn terminate(self) {
        let _ = self.cancel.send(true);
        self.task.abort();
    }
}

/// Real-time listener for EagleApi document changes
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use event_listener::{EventListener, ListenOptions, SnapshotFlag, StaticAuth};
///
/// # async fn example() -> event_listener::Result<()> {
/// let auth = Arc::new(StaticAuth::new("wss://events.example.com/ws", "token"));
/// let listener = EventListener::builder(auth).build()?;
///
/// listener.on_document_changed(|change| {
///     println!("{} {}:{}", change.change_type, change.collection_name, change.id);
/// });
///
/// listener.listen(ListenOptions::new("accom-1", [SnapshotFlag::ALL_ROOMS]))?;
/// listener.wait_for_initialized().await?;
///
/// // ...
///
/// listener.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct EventListener {
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
    dispatch: Option<Dispatch>,
}

impl EventListener {
    /// Start building a listener around an auth provider
    pub fn builder(auth: Arc<dyn AuthProvider>) -> EventListenerBuilder {
        EventListenerBuilder::new(auth)
    }

    /// Listener with the default config and WebSocket connector
    pub fn new(auth: Arc<dyn AuthProvider>) -> Result<Self> {
        Self::builder(auth).build()
    }

    fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    async fn in_scope_async<F: Future>(&self, future: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => future.with_subscriber(dispatch.clone()).await,
            None => future.await,
        }
    }

    /// Start a session
    ///
    /// Returns immediately; the connection is made on a background task of
    /// the current Tokio runtime. Calling this while a session is active
    /// logs a warning and does nothing.
    pub fn listen(&self, options: ListenOptions) -> Result<()> {
        self.in_scope(|| {
            options.validate()?;

            let mut session = self.session.lock();

            if self.shared.state().is_listening {
                tracing::warn!("Already listening; call stop() first");
                return Ok(());
            }

            let runtime = Handle::try_current().map_err(|e| ListenerError::NoRuntime(e.to_string()))?;

            if let Some(finished) = session.take() {
                finished.task.abort();
            }

            self.shared.begin_session(options.expected_snapshot_count());

            let (cancel, cancel_rx) = watch::channel(false);
            let worker = Worker::new(Arc::clone(&self.shared), options, cancel_rx);

            let task = match &self.dispatch {
                Some(dispatch) => runtime.spawn(worker.run().with_subscriber(dispatch.clone())),
                None => runtime.spawn(worker.run()),
            };

            *session = Some(Session { cancel, task });
            Ok(())
        })
    }

    /// Stop the session, waiting up to 5 seconds for a clean shutdown
    pub async fn stop(&self) -> bool {
        self.stop_within(DEFAULT_STOP_TIMEOUT).await
    }

    /// Stop the session, waiting up to `limit` for a clean shutdown
    ///
    /// Returns `true` when the worker closed the socket and exited on its
    /// own (or nothing was listening). On timeout the worker is terminated
    /// without a close handshake and `false` is returned; the listener is
    /// stopped either way.
    pub async fn stop_within(&self, limit: Duration) -> bool {
        self.in_scope_async(async {
            if !self.shared.state().is_listening {
                return true;
            }

            tracing::info!("Stopping event listener");
            {
                let session = self.session.lock();
                if let Some(session) = session.as_ref() {
                    let _ = session.cancel.send(true);
                }
            }

            let deadline = Instant::now() + limit;
            let poll = self.shared.config.stop_poll_interval;

            loop {
                if !self.shared.state().is_listening {
                    return true;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                sleep(poll.min(deadline - now)).await;
            }

            tracing::warn!("Event listener did not stop within {:?}; terminating", limit);
            self.terminate();
            false
        })
        .await
    }

    /// Wait up to 30 seconds for every requested snapshot to arrive
    pub async fn wait_for_initialized(&self) -> Result<bool> {
        self.wait_for_initialized_within(DEFAULT_INIT_TIMEOUT).await
    }

    /// Wait up to `limit` for every requested snapshot to arrive
    ///
    /// Resolves `Ok(true)` immediately if the session is already
    /// initialized and `Ok(false)` on timeout. Fails with
    /// [`ListenerError::NotListening`] outside a session.
    pub async fn wait_for_initialized_within(&self, limit: Duration) -> Result<bool> {
        if !self.shared.state().is_listening {
            return Err(ListenerError::NotListening);
        }

        let mut progress = self.shared.progress.subscribe();
        let initialized = timeout(limit, progress.wait_for(SnapshotProgress::is_initialized))
            .await
            .is_ok_and(|reached| reached.is_ok());

        Ok(initialized)
    }

    /// Tear everything down
    ///
    /// Terminates the session without a close handshake, drops the document
    /// cache and detaches every observer. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.in_scope(|| {
            self.terminate();
            self.shared.observers.clear();
            tracing::debug!("Event listener disposed");
        })
    }

    fn terminate(&self) {
        if let Some(session) = self.session.lock().take() {
            session.terminate();
        }
        self.shared.end_session_forcibly();
    }

    /// Copy of the current state
    pub fn state(&self) -> ListenerState {
        self.shared.state()
    }

    pub fn is_listening(&self) -> bool {
        self.shared.state.read().is_listening
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.read().is_connected
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.shared.phase()
    }

    pub fn snapshot_progress(&self) -> SnapshotProgress {
        self.shared.progress()
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.shared.config
    }

    /// Called after every state change
    pub fn on_state_changed<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&ListenerState) + Send + Sync + 'static,
    {
        self.shared.observers.on_state_changed(callback)
    }

    /// Called once per SNAPSHOT message carrying data
    pub fn on_snapshot<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&SnapshotEvent) + Send + Sync + 'static,
    {
        self.shared.observers.on_snapshot(callback)
    }

    /// Called once per document change, after the snapshot event it belongs to
    pub fn on_document_changed<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&DocumentChange) + Send + Sync + 'static,
    {
        self.shared.observers.on_document_changed(callback)
    }

    /// Detach one observer; returns `false` if it was not registered
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.shared.observers.remove(id)
    }

    pub fn observer_count(&self) -> usize {
        self.shared.observers.count()
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.terminate();
        }
    }
}

/// Builder for `EventListener`
pub struct EventListenerBuilder {
    auth: Arc<dyn AuthProvider>,
    connector: Option<Arc<dyn Connector>>,
    config: ListenerConfig,
    dispatch: Option<Dispatch>,
}

impl EventListenerBuilder {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth,
            connector: None,
            config: ListenerConfig::default(),
            dispatch: None,
        }
    }

    /// Use a custom connector instead of the WebSocket one
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(mut self, config: ListenerConfig) -> Self {
        self.config = config;
        self
    }

    /// Route the listener's diagnostics to a specific subscriber
    ///
    /// Without one, events go to the process default subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn build(self) -> Result<EventListener> {
        self.config.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new()));

        Ok(EventListener {
            shared: Arc::new(Shared::new(self.config, self.auth, connector)),
            session: Mutex::new(None),
            dispatch: self.dispatch,
        })
    }
}
