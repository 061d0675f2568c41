//! Snapshot change detection
//!
//! Turns collection-keyed snapshot payloads of the shape
//! `{collection: {doc_id: document_or_null}}` into discrete change records,
//! filtering stale redeliveries and no-op resyncs along the way.

use serde_json::{Map, Value};

use crate::cache::{CachedDocument, DocumentCache, DocumentKey};
use crate::change::{ChangeType, DocumentChange};
use crate::diff::{changed_fields, update_time_of, UPDATE_TIME_FIELD};

/// Owns a `DocumentCache` and diffs incoming snapshots against it
///
/// # Example
///
/// ```rust
/// use document_cache::{ChangeDetector, ChangeType};
/// use serde_json::json;
///
/// let mut detector = ChangeDetector::new();
///
/// let added = detector.detect(&json!({"rooms": {"room-1": {"temp": 20, "update_time": 100}}}));
/// assert_eq!(added[0].change_type, ChangeType::Add);
///
/// let updated = detector.detect(&json!({"rooms": {"room-1": {"temp": 22, "update_time": 101}}}));
/// assert_eq!(updated[0].changed_fields, vec!["temp"]);
/// ```
#[derive(Debug, Default)]
pub struct ChangeDetector {
    cache: DocumentCache,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the cache
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Forget every cached document
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Diff a snapshot payload against the cache and update it
    ///
    /// Changes are returned in payload order. Non-object payloads and
    /// non-object collection blocks are skipped.
    pub fn detect(&mut self, payload: &Value) -> Vec<DocumentChange> {
        let mut changes = Vec::new();

        let Some(collections) = payload.as_object() else {
            tracing::debug!("Ignoring non-object snapshot payload");
            return changes;
        };

        for (collection_name, collection) in collections {
            match collection.as_object() {
                Some(documents) => self.detect_collection(collection_name, documents, &mut changes),
                None => tracing::debug!("Skipping malformed collection block: {}", collection_name),
            }
        }

        changes
    }

    fn detect_collection(
        &mut self,
        collection_name: &str,
        documents: &Map<String, Value>,
        changes: &mut Vec<DocumentChange>,
    ) {
        for (id, document) in documents {
            let key = DocumentKey::new(collection_name, id.as_str());
            if let Some(change) = self.apply(key, document) {
                changes.push(change);
            }
        }
    }

    fn apply(&mut self, key: DocumentKey, document: &Value) -> Option<DocumentChange> {
        let new_update_time = update_time_of(document);

        if document.is_null() {
            // Tombstone for something never seen is not an error
            let removed = self.cache.remove(&key)?;
            return Some(DocumentChange {
                id: key.id().to_string(),
                collection_name: key.collection().to_string(),
                change_type: ChangeType::Remove,
                data: None,
                previous_data: Some(removed.data),
                changed_fields: Vec::new(),
                update_time: new_update_time,
            });
        }

        let cached = self.cache.get(&key);

        if let Some(cached) = cached {
            if cached.update_time > 0.0
                && new_update_time > 0.0
                && new_update_time <= cached.update_time
            {
                tracing::debug!(
                    "Ignoring stale document {} ({} <= {})",
                    key,
                    new_update_time,
                    cached.update_time
                );
                return None;
            }
        }

        let (change_type, previous_data, fields) = match cached {
            None => (ChangeType::Add, None, Vec::new()),
            Some(cached) => {
                // The timestamp advancing on its own is not a field change
                let fields: Vec<String> = changed_fields(&cached.data, document)
                    .into_iter()
                    .filter(|field| field != UPDATE_TIME_FIELD)
                    .collect();
                (ChangeType::Update, Some(cached.data.clone()), fields)
            }
        };

        let refreshed = CachedDocument::new(document.clone(), new_update_time);

        if change_type == ChangeType::Update && fields.is_empty() {
            // Resync with no field delta: refresh silently
            self.cache.insert(key, refreshed);
            return None;
        }

        let change = DocumentChange {
            id: key.id().to_string(),
            collection_name: key.collection().to_string(),
            change_type,
            data: Some(document.clone()),
            previous_data,
            changed_fields: fields,
            update_time: new_update_time,
        };

        self.cache.insert(key, refreshed);
        Some(change)
    }
}
