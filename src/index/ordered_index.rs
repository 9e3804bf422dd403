//! Ordered Index - Sorted (value, id) pairs for range and top-k queries
//!
//! Keeps entries in a `Vec` sorted ascending by `(value, seq)`, where `seq`
//! is the insertion sequence number. Equal values therefore keep their
//! insertion order, and the boundary search for a range is well-defined
//! when many records share a value.
//!
//! # Performance
//! - Insert: O(log n) search + O(n) shift
//! - Range query: O(log n + k) where k = results
//! - Top-k: O(k)

use crate::storage::RecordId;

/// One (value, id) pair of the ordered index
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedEntry {
    pub value: f64,
    /// Insertion sequence, breaks ties between equal values
    pub seq: u64,
    pub id: RecordId,
}

impl OrderedEntry {
    fn precedes(&self, value: f64, seq: u64) -> bool {
        self.value < value || (self.value == value && self.seq < seq)
    }
}

/// Sorted index over one numeric field
#[derive(Debug, Clone, Default)]
pub struct OrderedIndex {
    entries: Vec<OrderedEntry>,
    next_seq: u64,
}

impl OrderedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair at its sorted position
    ///
    /// Non-finite values are not orderable and are skipped (returns false).
    pub fn insert(&mut self, value: f64, id: RecordId) -> bool {
        if !value.is_finite() {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let pos = self.entries.partition_point(|e| e.precedes(value, seq));
        self.entries.insert(pos, OrderedEntry { value, seq, id });
        true
    }

    /// Entries with `low <= value <= high`, ascending
    pub fn range(&self, low: f64, high: f64) -> &[OrderedEntry] {
        if low.is_nan() || high.is_nan() || low > high {
            return &[];
        }

        let start = self.entries.partition_point(|e| e.value < low);
        let end = self.entries.partition_point(|e| e.value <= high);
        &self.entries[start..end]
    }

    /// Entries with `low <= value <= high`, highest first
    pub fn range_desc(&self, low: f64, high: f64) -> impl Iterator<Item = &OrderedEntry> {
        self.range(low, high).iter().rev()
    }

    /// The `k` largest entries, highest first
    ///
    /// Returns every entry when `k` exceeds the index size.
    pub fn top_k(&self, k: usize) -> impl Iterator<Item = &OrderedEntry> {
        let start = self.entries.len().saturating_sub(k);
        self.entries[start..].iter().rev()
    }

    /// All entries, ascending
    pub fn entries(&self) -> &[OrderedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the sort invariant (used by tests and debug assertions)
    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].precedes(w[1].value, w[1].seq))
    }
}
