//! Rollcall Storage Layer
//!
//! This module provides the record model and its persistent forms:
//!
//! - **types**: Core data structures (Record, Value, IndexSchema, Enrollment)
//! - **tabular**: CSV export/import with a union-of-fields column set
//! - **snapshot**: Full exports as JSON or checksummed LZ4/bincode
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Export:
//!   Roster → Snapshot → JSON | header + lz4(bincode) → temp file → rename
//!
//! Import:
//!   bytes → verify (magic, version, crc32) → Snapshot → revalidate → new Roster → swap
//! ```

pub mod error;
pub mod snapshot;
pub mod tabular;
pub mod types;

// Re-export commonly used types
pub use error::{RosterError, RosterResult};
pub use snapshot::{
    CollectionSnapshot, Snapshot, SnapshotFormat, SnapshotHeader, SnapshotStatistics,
    SNAPSHOT_VERSION,
};
pub use tabular::{CsvRow, DEFAULT_NULL_MARKER};
pub use types::{
    Enrollment, FieldIndex, FieldKind, FieldSpec, IndexKey, IndexSchema, Record, RecordId, Value,
};
