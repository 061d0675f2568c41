//! Real-time event listener for the EagleApi property-management service
//!
//! The server streams SNAPSHOT messages over a WebSocket: full documents,
//! keyed by collection and id, pushed on subscribe and on every relevant
//! mutation. This crate keeps that socket alive and turns the stream into
//! typed, deduplicated document-change events.
//!
//! # Features
//!
//! - **Automatic Reconnection**: exponential backoff with jitter on any transient failure
//! - **Health Monitoring**: staleness watchdog plus optional PING/PONG probing
//! - **Change Detection**: add/update/remove events with field-level diffs
//! - **Flow Control**: ACCEPT handshake for queued snapshot deliveries
//! - **Token Freshness**: bearer tokens refreshed before they age out
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use event_listener::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> event_listener::Result<()> {
//!     let auth = Arc::new(StaticAuth::new("wss://events.example.com/ws", "token"));
//!     let listener = EventListener::new(auth)?;
//!
//!     listener.on_state_changed(|state| println!("connected: {}", state.is_connected));
//!     listener.on_document_changed(|change| {
//!         if change.is_property_changed("temp") {
//!             println!("{} temperature changed", change.id);
//!         }
//!     });
//!
//!     listener.listen(ListenOptions::new(
//!         "accom-1",
//!         [SnapshotFlag::ALL_ROOMS, SnapshotFlag::ACTIVATED_ROOM_SALES],
//!     ))?;
//!
//!     if !listener.wait_for_initialized().await? {
//!         eprintln!("initial snapshots did not arrive in time");
//!     }
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     listener.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! EventListener (facade, observers, state copies)
//!     │
//!     └── worker task (one per listen())
//!             ├── AuthProvider   token refresh, URL, bearer token
//!             ├── Connector      opens a Transport (WebSocket by default)
//!             ├── HealthMonitor  staleness watchdog, PING/PONG
//!             └── ChangeDetector document cache, diffs
//! ```

// Modules
pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod listener;
pub mod logging;
pub mod observers;
pub mod protocol;
pub mod state;
pub mod transport;

mod worker;

// Re-exports - Public API
pub use auth::{AuthError, AuthProvider, StaticAuth};
pub use config::{ListenOptions, ListenerConfig, DEFAULT_INIT_TIMEOUT, DEFAULT_STOP_TIMEOUT};
pub use constants::{collections, SnapshotFlag};
pub use error::{ListenerError, Result};
pub use listener::{EventListener, EventListenerBuilder};
pub use observers::{ObserverId, SnapshotEvent};
pub use protocol::{ClientCommand, JoinData, ServerMessage};
pub use state::{ConnectionPhase, ListenerState, SnapshotProgress};
pub use transport::{ConnectRequest, Connector, Frame, Transport, WebSocketConnector};

// Re-export change types so users need only one dependency
pub use document_cache::{ChangeType, DocumentChange, PropertyChange};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::auth::{AuthProvider, StaticAuth};
    pub use crate::config::{ListenOptions, ListenerConfig};
    pub use crate::constants::SnapshotFlag;
    pub use crate::error::{ListenerError, Result};
    pub use crate::listener::EventListener;
    pub use crate::observers::SnapshotEvent;
    pub use crate::state::ListenerState;
    pub use document_cache::{ChangeType, DocumentChange};
}
