//! Secondary Index - Inverted index for exact-match queries
//!
//! Maps a normalized field value → ids of the records holding it.
//!
//! # Example
//! ```ignore
//! // Query: students whose last name is "johnson" (any case)
//! let ids = last_name_index.find(&Value::from("Johnson"));
//! // ids = ["S001", "S005"]
//! ```
//!
//! # Design Notes
//! - Keys are `IndexKey`s: text is case-folded, integral floats match integers
//! - Ids are kept in insertion order and deduplicated
//! - A unique index holds at most one id per key

use crate::storage::{IndexKey, RecordId, Value};
use std::collections::HashMap;

/// Inverted index over one field
#[derive(Debug, Clone, Default)]
pub struct SecondaryIndex {
    /// normalized value → ids, in insertion order
    index: HashMap<IndexKey, Vec<RecordId>>,
    /// Reject a second id under the same key
    unique: bool,
}

impl SecondaryIndex {
    /// Create an index allowing many ids per value
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index holding at most one id per value
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    /// Whether inserting `id` under `value` would violate uniqueness
    pub fn conflicts(&self, value: &Value) -> bool {
        if !self.unique {
            return false;
        }
        value
            .index_key()
            .map(|key| self.index.get(&key).map(|ids| !ids.is_empty()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Add an entry; nulls are skipped
    ///
    /// Returns false if the value is null or the entry already existed.
    /// Callers check `conflicts` first for unique indexes.
    pub fn add(&mut self, value: &Value, id: &RecordId) -> bool {
        let Some(key) = value.index_key() else {
            return false;
        };

        let ids = self.index.entry(key).or_default();
        if ids.contains(id) {
            return false;
        }
        ids.push(id.clone());
        true
    }

    /// Find ids holding `value` (after normalization)
    pub fn find(&self, value: &Value) -> &[RecordId] {
        value
            .index_key()
            .and_then(|key| self.index.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Total number of (key, id) entries
    pub fn entry_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }
}
