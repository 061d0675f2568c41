//! Process-local document storage
//!
//! This module provides the storage primitives used by change detection:
//! - `DocumentKey`: identity of a document within a collection
//! - `CachedDocument`: last accepted version of a document
//! - `DocumentCache`: the map between the two

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

// ============================================================================
// DocumentKey
// ============================================================================

/// Identity of a cached document
///
/// Document ids are only unique within their collection, so the key pairs
/// the two. Displayed as `"<collection>:<id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    collection: String,
    id: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection, self.id)
    }
}

// ============================================================================
// CachedDocument
// ============================================================================

/// Last accepted version of a document
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    /// Full document body as pushed by the server
    pub data: Value,

    /// `update_time` carried by that body, `0.0` when it had none
    pub update_time: f64,
}

impl CachedDocument {
    pub fn new(data: Value, update_time: f64) -> Self {
        Self { data, update_time }
    }
}

// ============================================================================
// DocumentCache
// ============================================================================

/// Map from document identity to its last accepted version
///
/// Only the change detector mutates the cache; everything else gets a
/// shared reference at most.
#[derive(Debug, Default, Clone)]
pub struct DocumentCache {
    entries: HashMap<DocumentKey, CachedDocument>,
}

impl DocumentCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a document
    pub fn get(&self, key: &DocumentKey) -> Option<&CachedDocument> {
        self.entries.get(key)
    }

    /// Check if a document is cached
    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached documents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all cached keys, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.entries.keys()
    }

    /// Drop every cached document
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn insert(&mut self, key: DocumentKey, document: CachedDocument) {
        self.entries.insert(key, document);
    }

    pub(crate) fn remove(&mut self, key: &DocumentKey) -> Option<CachedDocument> {
        self.entries.remove(key)
    }
}
