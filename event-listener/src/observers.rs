//! Typed observer registry
//!
//! One callback list per event kind. Callbacks run on the listener task,
//! in registration order, outside any lock. A panicking callback is logged
//! and skipped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use document_cache::DocumentChange;

use crate::state::ListenerState;

/// Handle returned by the `on_*` registration methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Payload of the `on_snapshot` event, one per SNAPSHOT message with data
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    /// Whether the session had received all requested snapshots once this
    /// message was counted
    pub is_initialized: bool,
    /// The `data` object exactly as received
    pub raw: Value,
    /// Changes derived from this message, in emission order
    pub changes: Vec<DocumentChange>,
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct CallbackList<T> {
    entries: RwLock<Vec<(ObserverId, Callback<T>)>>,
}

impl<T> CallbackList<T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, id: ObserverId, callback: Callback<T>) {
        self.entries.write().push((id, callback));
    }

    fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn emit(&self, kind: &'static str, value: &T) {
        let callbacks: Vec<_> = self.entries.read().clone();

        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                tracing::error!("{} observer {} panicked; continuing", kind, id);
            }
        }
    }
}

/// All observers of one `EventListener`
pub(crate) struct Observers {
    next_id: AtomicU64,
    state_changed: CallbackList<ListenerState>,
    snapshot: CallbackList<SnapshotEvent>,
    document_changed: CallbackList<DocumentChange>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state_changed: CallbackList::new(),
            snapshot: CallbackList::new(),
            document_changed: CallbackList::new(),
        }
    }

    fn allocate(&self) -> ObserverId {
        ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn on_state_changed<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&ListenerState) + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.state_changed.push(id, Arc::new(callback));
        id
    }

    pub(crate) fn on_snapshot<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&SnapshotEvent) + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.snapshot.push(id, Arc::new(callback));
        id
    }

    pub(crate) fn on_document_changed<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&DocumentChange) + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.document_changed.push(id, Arc::new(callback));
        id
    }

    /// Detach one observer, whichever event it was registered for
    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        self.state_changed.remove(id) || self.snapshot.remove(id) || self.document_changed.remove(id)
    }

    pub(crate) fn clear(&self) {
        self.state_changed.clear();
        self.snapshot.clear();
        self.document_changed.clear();
    }

    pub(crate) fn count(&self) -> usize {
        self.state_changed.len() + self.snapshot.len() + self.document_changed.len()
    }

    pub(crate) fn emit_state(&self, state: &ListenerState) {
        self.state_changed.emit("state", state);
    }

    pub(crate) fn emit_snapshot(&self, event: &SnapshotEvent) {
        self.snapshot.emit("snapshot", event);
    }

    pub(crate) fn emit_document_changed(&self, change: &DocumentChange) {
        self.document_changed.emit("document", change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_register_emit_remove() {
        let observers = Observers::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = observers.on_state_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observers.emit_state(&ListenerState::default());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(observers.remove(id));
        assert!(!observers.remove(id));

        observers.emit_state(&ListenerState::default());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_observer_is_isolated() {
        let observers = Observers::new();
        let hits = Arc::new(AtomicUsize::new(0));

        observers.on_state_changed(|_| panic!("observer failure"));
        let counter = Arc::clone(&hits);
        observers.on_state_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observers.emit_state(&ListenerState::default());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let observers = Observers::new();
        observers.on_state_changed(|_| {});
        observers.on_snapshot(|_| {});
        observers.on_document_changed(|_| {});
        assert_eq!(observers.count(), 3);

        observers.clear();
        assert_eq!(observers.count(), 0);
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let observers = Observers::new();
        let a = observers.on_state_changed(|_| {});
        let b = observers.on_snapshot(|_| {});
        assert_ne!(a, b);

        assert!(observers.remove(b));
        assert_eq!(observers.count(), 1);
    }
}
