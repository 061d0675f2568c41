//! Document cache and change detection for EagleApi snapshot streams
//!
//! The EagleApi server pushes full documents on every relevant mutation and
//! on periodic resyncs. This crate remembers the last accepted version of
//! each document and reduces every incoming snapshot to the set of real
//! changes.
//!
//! # Features
//!
//! - **Add/Update/Remove Detection**: one record per real change
//! - **Field-Level Diffs**: updates list exactly the top-level fields that differ
//! - **Duplicate Suppression**: stale or repeated deliveries are dropped by `update_time`
//! - **Silent Resyncs**: identical redeliveries refresh the cache without an event
//!
//! # Quick Start
//!
//! ```rust
//! use document_cache::{ChangeDetector, ChangeType};
//! use serde_json::json;
//!
//! let mut detector = ChangeDetector::new();
//! detector.detect(&json!({"rooms": {"room-1": {"temp": 20, "update_time": 100}}}));
//!
//! let changes = detector.detect(&json!({"rooms": {"room-1": null}}));
//! assert_eq!(changes[0].change_type, ChangeType::Remove);
//! assert!(detector.cache().is_empty());
//! ```
//!
//! # Architecture
//!
//! ```text
//! ChangeDetector
//!     │
//!     └── cache: DocumentCache
//!             │
//!             └── HashMap<DocumentKey, CachedDocument>
//!                     "<collection>:<id>" -> { data, update_time }
//! ```

// Modules
pub mod cache;
pub mod change;
pub mod detector;
pub mod diff;

// Re-exports - Public API
pub use cache::{CachedDocument, DocumentCache, DocumentKey};
pub use change::{ChangeType, DocumentChange, PropertyChange};
pub use detector::ChangeDetector;
pub use diff::{changed_fields, update_time_of, values_equal, UPDATE_TIME_FIELD};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{ChangeType, DocumentChange};
    pub use crate::detector::ChangeDetector;
}
