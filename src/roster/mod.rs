//! Rollcall Roster
//!
//! The student record system built on `RecordIndex`:
//!
//! - **model**: Input builders (`NewStudent`, `NewCourse`) and result views
//! - **registry**: `Roster`, owning students, courses and enrollments
//! - **shared**: `SharedRoster`, a lock-guarded handle for concurrent use
//!
//! # Indexes
//!
//! ```text
//! students: last_name (exact), email (unique), grade_level (exact), gpa (ordered)
//! courses:  department (exact)
//! enrollments: student → positions, course → positions
//! ```

mod model;
mod registry;
mod shared;

pub use model::{
    Collection, CourseEntry, NewCourse, NewStudent, PopularCourse, RosterEntry, RosterStatistics,
    StudentInfo, StudentReport, DEFAULT_CREDITS, DEFAULT_STATUS,
};
pub use registry::{CsvImportResult, Roster};
pub use shared::SharedRoster;

use crate::config::IndexConfig;
use crate::storage::{FieldSpec, IndexSchema};

/// Schema of the student collection
pub fn student_schema(config: &IndexConfig) -> IndexSchema {
    IndexSchema::new(Collection::Students.name(), Collection::Students.id_field())
        .with_field(FieldSpec::text("first_name").required())
        .with_field(FieldSpec::text("last_name").required().exact())
        .with_field(FieldSpec::text("email").unique())
        .with_field(FieldSpec::text("phone"))
        .with_field(FieldSpec::text("date_of_birth"))
        .with_field(FieldSpec::text("enrollment_date"))
        .with_field(FieldSpec::integer("grade_level").exact())
        .with_field(
            FieldSpec::float("gpa")
                .ordered()
                .range(config.gpa_min, config.gpa_max),
        )
        .with_field(FieldSpec::text("status"))
        .with_summary("gpa", "grade_level")
}

/// Schema of the course collection
pub fn course_schema() -> IndexSchema {
    IndexSchema::new(Collection::Courses.name(), Collection::Courses.id_field())
        .with_field(FieldSpec::text("course_name").required())
        .with_field(FieldSpec::integer("credits").range(0.0, 60.0))
        .with_field(FieldSpec::text("department").exact())
        .with_summary("credits", "department")
}
