//! Rollcall Index Structures
//!
//! Provides the in-memory indexes behind a record collection:
//!
//! - **RecordIndex**: Primary collection coordinating every index below
//! - **SecondaryIndex**: Inverted value → ids map for O(1) exact matches
//! - **OrderedIndex**: Sorted (value, id) pairs for range and top-k queries
//! - **TextIndex**: Inverted word → positions index over free text
//!
//! # Architecture
//!
//! ```text
//! add(record)
//!        ↓
//! validate against IndexSchema → reject duplicates (id, unique fields)
//!        ↓
//! primary map + SecondaryIndex per exact field + OrderedIndex per ordered field
//! ```

mod ordered_index;
mod record_index;
mod secondary_index;
pub mod stats;
mod text_index;

pub use ordered_index::{OrderedEntry, OrderedIndex};
pub use record_index::RecordIndex;
pub use secondary_index::SecondaryIndex;
pub use stats::{GroupCount, NumericSummary, Statistics};
pub use text_index::{tokenize, TextIndex};

use serde::{Deserialize, Serialize};

/// Statistics about index usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of records in the primary collection
    pub records: usize,
    /// Number of secondary (exact/unique) indexes
    pub secondary_indexes: usize,
    /// Number of ordered indexes
    pub ordered_indexes: usize,
    /// Distinct keys across all secondary indexes
    pub secondary_keys: usize,
    /// Entries across all ordered indexes
    pub ordered_entries: usize,
}
