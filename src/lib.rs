//! # Rollcall
//!
//! Student Record Indexing - An in-memory, multi-index record store for
//! students and courses with snapshot persistence.
//!
//! ## Features
//!
//! - **Keyed records**: Unique ids with duplicate-key rejection
//! - **Secondary indexes**: Case-insensitive exact matches in O(1)
//! - **Ordered indexes**: Inclusive range and top-k queries in O(log n + k)
//! - **Aggregates**: Count, mean, median and grouped counts
//! - **Snapshots**: JSON or checksummed LZ4/bincode, plus CSV export/import
//!
//! ## Modules
//!
//! - [`storage`]: Record model, errors, CSV and snapshot formats
//! - [`index`]: Index structures and the `RecordIndex` coordinating them
//! - [`roster`]: Students, courses and enrollments
//! - [`query`]: Query language parser and executor
//! - [`config`]: TOML configuration and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollcall::roster::{NewCourse, NewStudent, Roster};
//! use rollcall::storage::{Enrollment, SnapshotFormat};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut roster = Roster::new()?;
//!
//!     roster.add_student(
//!         NewStudent::new("S001", "Alice", "Johnson")
//!             .email("alice.j@school.edu")
//!             .grade_level(10)
//!             .gpa(3.8),
//!     )?;
//!     roster.add_course(NewCourse::new("MATH101", "Algebra I").credits(4))?;
//!     roster.enroll(Enrollment::new("S001", "MATH101", "Fall 2024").score(92.5))?;
//!
//!     // Query by index
//!     let honors = roster.students_by_gpa_range(3.5, 4.0);
//!     println!("Found {} honor students", honors.len());
//!
//!     // Persist
//!     roster.save(std::path::Path::new("roster.json"), SnapshotFormat::Json)?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod index;
pub mod query;
pub mod roster;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    Enrollment, FieldSpec, IndexSchema, Record, RecordId, RosterError, RosterResult, Snapshot,
    SnapshotFormat, Value,
};

pub use index::{IndexStats, RecordIndex, Statistics, TextIndex};

pub use query::{parse_query, Query, QueryError, QueryExecutor, QueryOutput};

pub use roster::{
    Collection, NewCourse, NewStudent, Roster, RosterStatistics, SharedRoster, StudentReport,
};

pub use config::{Config, ConfigError, IndexConfig, LoggingConfig, StorageConfig};
