//! Roster - Students, courses and the enrollments linking them
//!
//! Owns two `RecordIndex` collections plus the enrollment list with its
//! per-student and per-course adjacency. All writes go through methods
//! that validate first, so a rejected write leaves the roster unchanged.

use crate::config::IndexConfig;
use crate::index::RecordIndex;
use crate::roster::model::{
    Collection, CourseEntry, NewCourse, NewStudent, PopularCourse, RosterEntry, RosterStatistics,
    StudentInfo, StudentReport, DEFAULT_STATUS,
};
use crate::roster::{course_schema, student_schema};
use crate::storage::tabular;
use crate::storage::{
    CollectionSnapshot, Enrollment, IndexSchema, Record, RecordId, RosterError, RosterResult,
    Snapshot, SnapshotFormat, SnapshotStatistics, Value,
};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

const ENROLLMENTS: &str = "enrollments";

/// Result of a bulk CSV import
#[derive(Debug, Default)]
pub struct CsvImportResult {
    pub rows_processed: usize,
    pub imported: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

/// The student record system
#[derive(Debug, Clone)]
pub struct Roster {
    students: RecordIndex,
    courses: RecordIndex,
    /// All enrollments in insertion order
    enrollments: Vec<Enrollment>,
    /// student id → positions in `enrollments`
    by_student: HashMap<RecordId, Vec<usize>>,
    /// course code → positions in `enrollments`
    by_course: HashMap<RecordId, Vec<usize>>,
    config: IndexConfig,
}

impl Roster {
    /// Create an empty roster with default settings
    pub fn new() -> RosterResult<Self> {
        Self::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> RosterResult<Self> {
        Ok(Self {
            students: RecordIndex::new(student_schema(&config))?,
            courses: RecordIndex::new(course_schema())?,
            enrollments: Vec::new(),
            by_student: HashMap::new(),
            by_course: HashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn students(&self) -> &RecordIndex {
        &self.students
    }

    pub fn courses(&self) -> &RecordIndex {
        &self.courses
    }

    pub fn collection(&self, collection: Collection) -> &RecordIndex {
        match collection {
            Collection::Students => &self.students,
            Collection::Courses => &self.courses,
        }
    }

    pub fn enrollments(&self) -> &[Enrollment] {
        &self.enrollments
    }

    // ==================== Write Methods ====================

    /// Add a student; fails on a taken id or email
    pub fn add_student(&mut self, student: NewStudent) -> RosterResult<&Record> {
        let today = Utc::now().date_naive().to_string();
        let id = student.id.clone();
        self.students.add(student.into_record(&today))?;
        self.students.get_by_id(id.as_str())
    }

    /// Add a course; fails on a taken code
    pub fn add_course(&mut self, course: NewCourse) -> RosterResult<&Record> {
        let code = course.code.clone();
        self.courses.add(course.into_record())?;
        self.courses.get_by_id(code.as_str())
    }

    /// Record an enrollment; both endpoints must exist
    ///
    /// The same student may enroll in the same course more than once
    /// (e.g. in different semesters).
    pub fn enroll(&mut self, enrollment: Enrollment) -> RosterResult<()> {
        self.check_enrollment(&enrollment)?;

        let pos = self.enrollments.len();
        self.by_student
            .entry(enrollment.student_id.clone())
            .or_default()
            .push(pos);
        self.by_course
            .entry(enrollment.course_code.clone())
            .or_default()
            .push(pos);

        tracing::debug!(
            student = %enrollment.student_id,
            course = %enrollment.course_code,
            semester = %enrollment.semester,
            "Enrolled"
        );
        self.enrollments.push(enrollment);
        Ok(())
    }

    fn check_enrollment(&self, enrollment: &Enrollment) -> RosterResult<()> {
        self.students.get_by_id(enrollment.student_id.as_str())?;
        self.courses.get_by_id(enrollment.course_code.as_str())?;

        if let Some(score) = enrollment.score {
            if !score.is_finite() {
                return Err(RosterError::invalid("score", "value must be finite"));
            }
        }
        if enrollment.semester.trim().is_empty() {
            return Err(RosterError::invalid("semester", "must not be empty"));
        }
        Ok(())
    }

    /// Bulk-add students from CSV with a header row
    ///
    /// Rows that fail to parse or insert are reported and skipped; the
    /// remaining rows are still imported.
    pub fn import_students_csv<R: Read>(
        &mut self,
        reader: R,
        null_marker: &str,
    ) -> RosterResult<CsvImportResult> {
        let today = Utc::now().date_naive().to_string();
        let rows = tabular::read_records(self.students.schema(), reader, null_marker)?;
        let mut result = CsvImportResult::default();

        for row in rows {
            result.rows_processed += 1;
            let outcome = row.record.and_then(|mut record| {
                if record.get("status").is_none() {
                    record.set("status", DEFAULT_STATUS);
                }
                if record.get("enrollment_date").is_none() {
                    record.set("enrollment_date", today.as_str());
                }
                self.students.add(record)
            });

            match outcome {
                Ok(()) => result.imported += 1,
                Err(e) => {
                    result.rows_failed += 1;
                    result.errors.push(format!("Line {}: {}", row.line, e));
                }
            }
        }

        tracing::info!(
            imported = result.imported,
            failed = result.rows_failed,
            "Imported students from CSV"
        );
        Ok(result)
    }

    // ==================== Student Queries ====================

    /// Direct lookup by student id
    pub fn student(&self, id: &str) -> RosterResult<&Record> {
        self.students.get_by_id(id)
    }

    /// Students with this last name (case-insensitive)
    pub fn students_by_last_name(&self, last_name: &str) -> Vec<&Record> {
        self.students
            .get_by_exact_field("last_name", &Value::from(last_name))
    }

    /// The student registered under `email` (case-insensitive)
    pub fn student_by_email(&self, email: &str) -> Option<&Record> {
        self.students
            .get_by_exact_field("email", &Value::from(email))
            .into_iter()
            .next()
    }

    /// Students whose first or last name contains `fragment`
    pub fn students_by_partial_name(&self, fragment: &str) -> Vec<&Record> {
        self.students
            .get_by_substring_any(&["first_name", "last_name"], fragment)
    }

    /// Students in a grade level, highest gpa first, missing gpa last
    pub fn students_by_grade_level(&self, grade_level: i64) -> Vec<&Record> {
        let mut students = self
            .students
            .get_by_exact_field("grade_level", &Value::from(grade_level));
        students.sort_by(|a, b| desc_missing_last(a.number("gpa"), b.number("gpa")));
        students
    }

    /// Students with `min <= gpa <= max`, highest first
    pub fn students_by_gpa_range(&self, min: f64, max: f64) -> Vec<&Record> {
        self.students.get_by_range("gpa", min, max)
    }

    /// The `n` students with the highest gpa
    pub fn top_students(&self, n: usize) -> Vec<&Record> {
        self.students.get_top_k("gpa", n)
    }

    /// Courses offered by a department (case-insensitive)
    pub fn courses_by_department(&self, department: &str) -> Vec<&Record> {
        self.courses
            .get_by_exact_field("department", &Value::from(department))
    }

    /// Direct lookup by course code
    pub fn course(&self, code: &str) -> RosterResult<&Record> {
        self.courses.get_by_id(code)
    }

    // ==================== Relationship Queries ====================

    /// Every enrollment of a student, in enrollment order
    pub fn student_courses(&self, student_id: &str) -> RosterResult<Vec<CourseEntry>> {
        self.students.get_by_id(student_id)?;

        let entries = self
            .enrollments_of(&self.by_student, student_id)
            .filter_map(|e| {
                let course = self.courses.find_by_id(e.course_code.as_str())?;
                Some(CourseEntry {
                    course_code: e.course_code.clone(),
                    course_name: course.text("course_name").unwrap_or_default().to_string(),
                    semester: e.semester.clone(),
                    grade: e.grade.clone(),
                    score: e.score,
                })
            })
            .collect();
        Ok(entries)
    }

    /// Everyone enrolled in a course, highest score first, missing scores last
    pub fn course_students(&self, course_code: &str) -> RosterResult<Vec<RosterEntry>> {
        self.courses.get_by_id(course_code)?;

        let mut entries: Vec<RosterEntry> = self
            .enrollments_of(&self.by_course, course_code)
            .filter_map(|e| {
                let student = self.students.find_by_id(e.student_id.as_str())?;
                Some(RosterEntry {
                    student_id: e.student_id.clone(),
                    first_name: student.text("first_name").unwrap_or_default().to_string(),
                    last_name: student.text("last_name").unwrap_or_default().to_string(),
                    grade: e.grade.clone(),
                    score: e.score,
                })
            })
            .collect();

        entries.sort_by(|a, b| desc_missing_last(a.score, b.score));
        Ok(entries)
    }

    fn enrollments_of<'a>(
        &'a self,
        adjacency: &'a HashMap<RecordId, Vec<usize>>,
        key: &str,
    ) -> impl Iterator<Item = &'a Enrollment> + 'a {
        adjacency
            .get(key)
            .into_iter()
            .flatten()
            .map(|&pos| &self.enrollments[pos])
    }

    /// Report on one student: details, enrollments and credit total
    pub fn report(&self, student_id: &str) -> RosterResult<StudentReport> {
        let record = self.students.get_by_id(student_id)?;
        let courses = self.student_courses(student_id)?;

        let total_credits = courses
            .iter()
            .filter_map(|c| self.courses.find_by_id(c.course_code.as_str()))
            .filter_map(|c| c.integer("credits"))
            .sum();

        Ok(StudentReport {
            student: StudentInfo::from_record(record),
            total_courses: courses.len(),
            courses,
            total_credits,
        })
    }

    // ==================== Statistics ====================

    /// Roster-wide statistics
    pub fn statistics(&self) -> RosterStatistics {
        let student_stats = self.students.aggregate();
        let summary = student_stats.summary.as_ref();

        let students_per_grade = student_stats
            .groups
            .iter()
            .filter_map(|g| g.value.as_i64().map(|level| (level, g.count)))
            .collect();

        let threshold = self.config.honor_threshold;
        let honor_students = self
            .students
            .records()
            .iter()
            .filter(|r| r.number("gpa").map_or(false, |g| g >= threshold))
            .count();

        RosterStatistics {
            total_students: student_stats.count,
            average_gpa: summary.map(|s| s.mean),
            median_gpa: summary.map(|s| s.median),
            students_per_grade,
            honor_threshold: threshold,
            honor_students,
            total_courses: self.courses.len(),
            total_enrollments: self.enrollments.len(),
            popular_courses: self.popular_courses(),
            courses_per_department: self.courses_per_department(),
        }
    }

    /// Most enrolled courses; ties keep the order of first enrollment
    fn popular_courses(&self) -> Vec<PopularCourse> {
        let mut counts: Vec<(&RecordId, usize)> = Vec::new();
        let mut slots: HashMap<&RecordId, usize> = HashMap::new();

        for e in &self.enrollments {
            match slots.get(&e.course_code) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    slots.insert(&e.course_code, counts.len());
                    counts.push((&e.course_code, 1));
                }
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(self.config.popular_courses)
            .map(|(code, enrollments)| PopularCourse {
                course_code: code.clone(),
                course_name: self
                    .courses
                    .find_by_id(code.as_str())
                    .and_then(|c| c.text("course_name"))
                    .unwrap_or_default()
                    .to_string(),
                enrollments,
            })
            .collect()
    }

    /// Courses per department, most first; ties keep first appearance
    fn courses_per_department(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();

        for dept in self.courses.records().iter().filter_map(|c| c.text("department")) {
            match slots.get(&dept.to_lowercase()) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    slots.insert(dept.to_lowercase(), counts.len());
                    counts.push((dept.to_string(), 1));
                }
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    // ==================== Export / Import ====================

    /// Capture the roster as a self-describing snapshot
    pub fn snapshot(&self) -> Snapshot {
        let collection = |index: &RecordIndex| CollectionSnapshot {
            schema: index.schema().clone(),
            records: index.records().to_vec(),
        };

        Snapshot::new(
            collection(&self.students),
            collection(&self.courses),
            self.enrollments.clone(),
            SnapshotStatistics {
                students: self.students.aggregate(),
                courses: self.courses.aggregate(),
                enrollments: self.enrollments.len(),
            },
        )
    }

    /// Rebuild a roster from a snapshot
    ///
    /// Records are re-validated against this roster's schemas and every
    /// enrollment must reference existing records. Statistics stored in
    /// the snapshot are ignored; they are recomputed on demand.
    pub fn from_snapshot(snapshot: Snapshot, config: IndexConfig) -> RosterResult<Self> {
        let students_schema = student_schema(&config);
        let courses_schema = course_schema();
        check_embedded_schema(&snapshot.students.schema, &students_schema)?;
        check_embedded_schema(&snapshot.courses.schema, &courses_schema)?;

        let mut roster = Self {
            students: RecordIndex::from_records(students_schema, snapshot.students.records)?,
            courses: RecordIndex::from_records(courses_schema, snapshot.courses.records)?,
            enrollments: Vec::new(),
            by_student: HashMap::new(),
            by_course: HashMap::new(),
            config,
        };

        for enrollment in snapshot.enrollments {
            let key = format!("{} -> {}", enrollment.student_id, enrollment.course_code);
            roster.enroll(enrollment).map_err(|e| RosterError::Snapshot {
                collection: ENROLLMENTS.to_string(),
                record: Some(key),
                reason: e.to_string(),
            })?;
        }

        Ok(roster)
    }

    /// Encode the whole roster
    pub fn export(&self, format: SnapshotFormat) -> RosterResult<Vec<u8>> {
        let bytes = self.snapshot().to_bytes(format)?;
        tracing::info!(
            format = %format,
            bytes = bytes.len(),
            students = self.students.len(),
            courses = self.courses.len(),
            enrollments = self.enrollments.len(),
            "Exported roster"
        );
        Ok(bytes)
    }

    /// Replace the roster with the content of an encoded snapshot
    ///
    /// The new roster is fully built before it replaces `self`, so a
    /// failed import leaves the current content untouched.
    pub fn import(&mut self, format: SnapshotFormat, bytes: &[u8]) -> RosterResult<()> {
        let snapshot = Snapshot::from_bytes(bytes, format)?;
        let roster = Self::from_snapshot(snapshot, self.config.clone())?;
        *self = roster;

        tracing::info!(
            format = %format,
            students = self.students.len(),
            courses = self.courses.len(),
            enrollments = self.enrollments.len(),
            "Imported roster"
        );
        Ok(())
    }

    /// Write one collection as CSV; returns the number of rows
    pub fn export_csv<W: Write>(
        &self,
        collection: Collection,
        writer: W,
        null_marker: &str,
    ) -> RosterResult<usize> {
        self.collection(collection).export_csv(writer, null_marker)
    }

    /// Save a snapshot file
    pub fn save(&self, path: &Path, format: SnapshotFormat) -> RosterResult<usize> {
        self.snapshot().write_to(path, format)
    }

    /// Load a snapshot file; `None` detects the format from the content
    pub fn load(
        path: &Path,
        format: Option<SnapshotFormat>,
        config: IndexConfig,
    ) -> RosterResult<Self> {
        let snapshot = Snapshot::read_from(path, format)?;
        Self::from_snapshot(snapshot, config)
    }
}

/// Embedded schemas must describe the same collection
fn check_embedded_schema(embedded: &IndexSchema, expected: &IndexSchema) -> RosterResult<()> {
    if embedded.collection != expected.collection || embedded.id_field != expected.id_field {
        return Err(RosterError::Snapshot {
            collection: expected.collection.clone(),
            record: None,
            reason: format!(
                "expected collection '{}' keyed by '{}', found '{}' keyed by '{}'",
                expected.collection, expected.id_field, embedded.collection, embedded.id_field
            ),
        });
    }
    Ok(())
}

/// Descending order for optional numbers with `None` sorted last
fn desc_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn ids(records: &[&Record]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    fn sample_roster() -> Roster {
        let mut roster = Roster::new().unwrap();

        let students = [
            ("S001", "Alice", "Johnson", "alice.j@school.edu", 10, 3.8),
            ("S002", "Bob", "Smith", "bob.s@school.edu", 10, 3.5),
            ("S003", "Charlie", "Brown", "charlie.b@school.edu", 11, 3.9),
            ("S004", "Diana", "Martinez", "diana.m@school.edu", 11, 3.7),
            ("S005", "Eve", "Johnson", "eve.j@school.edu", 12, 4.0),
            ("S006", "Frank", "Lee", "frank.l@school.edu", 12, 3.6),
        ];
        for (id, first, last, email, grade, gpa) in students {
            roster
                .add_student(
                    NewStudent::new(id, first, last)
                        .email(email)
                        .grade_level(grade)
                        .gpa(gpa),
                )
                .unwrap();
        }

        let courses = [
            ("MATH101", "Algebra I", 4, "Mathematics"),
            ("ENG101", "English Literature", 3, "English"),
            ("SCI101", "Physics", 4, "Science"),
            ("HIST101", "World History", 3, "History"),
            ("MATH201", "Calculus", 4, "Mathematics"),
        ];
        for (code, name, credits, dept) in courses {
            roster
                .add_course(NewCourse::new(code, name).credits(credits).department(dept))
                .unwrap();
        }

        let enrollments = [
            ("S001", "MATH101", "A", 92.5),
            ("S001", "ENG101", "A-", 88.0),
            ("S002", "MATH101", "B+", 87.0),
            ("S003", "SCI101", "A", 95.0),
            ("S005", "MATH101", "A+", 98.0),
            ("S005", "MATH201", "A", 96.0),
        ];
        for (student, course, grade, score) in enrollments {
            roster
                .enroll(Enrollment::new(student, course, "Fall 2024").grade(grade).score(score))
                .unwrap();
        }

        roster
    }

    #[test]
    fn test_lookups() {
        let roster = sample_roster();

        assert_eq!(roster.student("S001").unwrap().text("first_name"), Some("Alice"));
        assert!(roster.student("S999").unwrap_err().is_not_found());

        assert_eq!(ids(&roster.students_by_last_name("johnson")), vec!["S001", "S005"]);
        assert_eq!(
            roster.student_by_email("EVE.J@school.edu").map(|r| r.id.as_str()),
            Some("S005")
        );
        assert!(roster.student_by_email("nobody@school.edu").is_none());
        assert_eq!(ids(&roster.students_by_partial_name("ar")), vec!["S003", "S004"]);
        assert_eq!(ids(&roster.students_by_grade_level(11)), vec!["S003", "S004"]);
        assert_eq!(
            ids(&roster.students_by_gpa_range(3.7, 4.0)),
            vec!["S005", "S003", "S001", "S004"]
        );
        assert_eq!(ids(&roster.top_students(3)), vec!["S005", "S003", "S001"]);
        assert_eq!(ids(&roster.courses_by_department("mathematics")), vec!["MATH101", "MATH201"]);
    }

    #[test]
    fn test_grade_level_puts_missing_gpa_last() {
        let mut roster = sample_roster();
        roster
            .add_student(NewStudent::new("S007", "Gina", "Park").grade_level(10))
            .unwrap();
        assert_eq!(ids(&roster.students_by_grade_level(10)), vec!["S001", "S002", "S007"]);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let mut roster = sample_roster();
        let err = roster
            .add_student(NewStudent::new("S100", "Al", "Jay").email("Alice.J@school.edu"))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(roster.students().len(), 6);
        assert!(roster.student("S100").is_err());
    }

    #[test]
    fn test_enroll_requires_endpoints() {
        let mut roster = sample_roster();

        let err = roster.enroll(Enrollment::new("S999", "MATH101", "Fall 2024")).unwrap_err();
        assert!(matches!(err, RosterError::NotFound { ref collection, .. } if collection == "students"));

        let err = roster.enroll(Enrollment::new("S001", "ART999", "Fall 2024")).unwrap_err();
        assert!(matches!(err, RosterError::NotFound { ref collection, .. } if collection == "courses"));

        let err = roster
            .enroll(Enrollment::new("S001", "SCI101", "Fall 2024").score(f64::NAN))
            .unwrap_err();
        assert!(matches!(err, RosterError::InvalidInput { .. }));

        assert_eq!(roster.enrollments().len(), 6);
    }

    #[test]
    fn test_relationships() {
        let roster = sample_roster();

        let courses = roster.student_courses("S005").unwrap();
        let codes: Vec<&str> = courses.iter().map(|c| c.course_code.as_str()).collect();
        assert_eq!(codes, vec!["MATH101", "MATH201"]);
        assert_eq!(courses[1].course_name, "Calculus");

        let math = roster.course_students("MATH101").unwrap();
        let order: Vec<&str> = math.iter().map(|e| e.student_id.as_str()).collect();
        assert_eq!(order, vec!["S005", "S001", "S002"]);

        assert!(roster.student_courses("S006").unwrap().is_empty());
        assert!(roster.course_students("HIST101").unwrap().is_empty());
        assert!(roster.course_students("NOPE").is_err());
    }

    #[test]
    fn test_report() {
        let roster = sample_roster();
        let report = roster.report("S001").unwrap();

        assert_eq!(report.student.name, "Alice Johnson");
        assert_eq!(report.total_courses, 2);
        assert_eq!(report.total_credits, 7);
        assert_eq!(report.student.status.as_deref(), Some("active"));

        let text = report.to_string();
        assert!(text.contains("Student: Alice Johnson"));
        assert!(text.contains("MATH101: Algebra I - A (92.5)"));

        assert!(roster.report("S404").unwrap_err().is_not_found());
    }

    #[test]
    fn test_statistics() {
        let roster = sample_roster();
        let stats = roster.statistics();

        assert_eq!(stats.total_students, 6);
        assert!((stats.average_gpa.unwrap() - 3.75).abs() < 1e-9);
        // sorted: 3.5 3.6 3.7 3.8 3.9 4.0 -> lower-middle
        assert_eq!(stats.median_gpa, Some(3.7));
        assert_eq!(stats.students_per_grade, vec![(10, 2), (11, 2), (12, 2)]);
        assert_eq!(stats.honor_students, 6);
        assert_eq!(stats.total_courses, 5);
        assert_eq!(stats.total_enrollments, 6);

        let popular: Vec<(&str, usize)> = stats
            .popular_courses
            .iter()
            .map(|c| (c.course_code.as_str(), c.enrollments))
            .collect();
        assert_eq!(
            popular,
            vec![("MATH101", 3), ("ENG101", 1), ("SCI101", 1), ("MATH201", 1)]
        );
        assert_eq!(stats.courses_per_department[0], ("Mathematics".to_string(), 2));
        assert_eq!(stats.courses_per_department.len(), 4);
    }

    #[test]
    fn test_honor_threshold_excludes_missing_gpa() {
        let config = IndexConfig {
            honor_threshold: 3.75,
            ..IndexConfig::default()
        };
        let mut roster = Roster::with_config(config).unwrap();
        roster.add_student(NewStudent::new("A", "A", "A").gpa(3.8)).unwrap();
        roster.add_student(NewStudent::new("B", "B", "B").gpa(3.7)).unwrap();
        roster.add_student(NewStudent::new("C", "C", "C")).unwrap();

        let stats = roster.statistics();
        assert_eq!(stats.honor_students, 1);
        assert_eq!(stats.total_students, 3);
        assert!(stats.popular_courses.is_empty());
    }

    #[test]
    fn test_snapshot_roundtrip_both_formats() {
        let roster = sample_roster();

        for format in [SnapshotFormat::Json, SnapshotFormat::Binary] {
            let bytes = roster.export(format).unwrap();
            let mut restored = Roster::new().unwrap();
            restored.import(format, &bytes).unwrap();

            assert_eq!(restored.students().records(), roster.students().records());
            assert_eq!(restored.courses().records(), roster.courses().records());
            assert_eq!(restored.enrollments(), roster.enrollments());
            assert_eq!(restored.statistics(), roster.statistics());
            assert_eq!(ids(&restored.top_students(2)), vec!["S005", "S003"]);
        }
    }

    #[test]
    fn test_failed_import_keeps_current_state() {
        let mut roster = sample_roster();

        let mut snapshot = roster.snapshot();
        let dup = snapshot.students.records[0].clone();
        snapshot.students.records.push(dup);
        let bytes = snapshot.to_bytes(SnapshotFormat::Json).unwrap();

        let mut target = Roster::new().unwrap();
        target.add_student(NewStudent::new("X1", "Keep", "Me")).unwrap();
        let err = target.import(SnapshotFormat::Json, &bytes).unwrap_err();
        assert!(matches!(
            err,
            RosterError::Snapshot { ref collection, ref record, .. }
                if collection == "students" && record.as_deref() == Some("S001")
        ));
        assert_eq!(target.students().len(), 1);
        assert!(target.student("X1").is_ok());

        // Dangling enrollment
        let mut snapshot = roster.snapshot();
        snapshot.enrollments.push(Enrollment::new("S001", "GONE1", "Fall 2024"));
        let bytes = snapshot.to_bytes(SnapshotFormat::Binary).unwrap();
        let err = roster.import(SnapshotFormat::Binary, &bytes).unwrap_err();
        assert!(matches!(err, RosterError::Snapshot { ref collection, .. } if collection == "enrollments"));
        assert_eq!(roster.enrollments().len(), 6);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roster.rcsn");
        let roster = sample_roster();
        roster.save(&path, SnapshotFormat::Binary).unwrap();

        let loaded = Roster::load(&path, None, IndexConfig::default()).unwrap();
        assert_eq!(loaded.students().len(), 6);
        assert_eq!(loaded.report("S005").unwrap().total_credits, 8);
    }

    #[test]
    fn test_csv_export_and_import() {
        let roster = sample_roster();
        let mut out = Vec::new();
        let rows = roster.export_csv(Collection::Students, &mut out, "NULL").unwrap();
        assert_eq!(rows, 6);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("student_id,first_name,last_name,email,phone"));
        assert!(text.lines().nth(1).unwrap().contains("S001,Alice,Johnson,alice.j@school.edu,NULL"));

        let mut copy = Roster::new().unwrap();
        let result = copy.import_students_csv(text.as_bytes(), "NULL").unwrap();
        assert_eq!(result.imported, 6);
        assert_eq!(result.rows_failed, 0);
        assert_eq!(copy.students().records(), roster.students().records());
    }

    #[test]
    fn test_csv_import_collects_row_errors() {
        let data = "\
student_id,first_name,last_name,email,gpa
S1,Ann,Lee,ann@x.edu,3.2
S2,Ben,Ko,ann@x.edu,3.1
S3,Cat,Wu,cat@x.edu,9.9
S4,Dan,Oh,dan@x.edu,abc
S5,Eli,Ma,,2.5
";
        let mut roster = Roster::new().unwrap();
        let result = roster.import_students_csv(data.as_bytes(), "NULL").unwrap();

        assert_eq!(result.rows_processed, 5);
        assert_eq!(result.imported, 2);
        assert_eq!(result.rows_failed, 3);
        assert!(result.errors[0].starts_with("Line 3:"));
        assert_eq!(roster.student("S5").unwrap().text("status"), Some("active"));
    }

    fn arb_roster() -> impl Strategy<Value = Roster> {
        prop::collection::vec(
            (prop::option::of(0.0f64..=4.0), prop::option::of(0.0f64..=100.0)),
            0..30,
        )
        .prop_map(|rows| {
            let mut roster = Roster::new().unwrap();
            roster
                .add_course(NewCourse::new("C1", "Course").department("Dept"))
                .unwrap();
            for (i, (gpa, score)) in rows.into_iter().enumerate() {
                let id = format!("S{:03}", i);
                let mut student =
                    NewStudent::new(id.as_str(), "First", "Last").grade_level(9 + (i % 4) as i64);
                if let Some(gpa) = gpa {
                    student = student.gpa(gpa);
                }
                roster.add_student(student).unwrap();

                let mut enrollment = Enrollment::new(id, "C1", "Fall 2024");
                if let Some(score) = score {
                    enrollment = enrollment.score(score);
                }
                roster.enroll(enrollment).unwrap();
            }
            roster
        })
    }

    #[test]
    fn test_json_snapshot_keeps_exact_gpa() {
        let gpas = [3.8351490809164757, 1.6196765132907793, 1.8828378788440903];
        let mut roster = Roster::new().unwrap();
        for (i, gpa) in gpas.iter().enumerate() {
            roster
                .add_student(NewStudent::new(format!("S{}", i), "First", "Last").gpa(*gpa))
                .unwrap();
        }

        let bytes = roster.export(SnapshotFormat::Json).unwrap();
        let mut copy = Roster::new().unwrap();
        copy.import(SnapshotFormat::Json, &bytes).unwrap();

        for (i, gpa) in gpas.iter().enumerate() {
            let id = format!("S{}", i);
            let restored = copy.student(&id).unwrap().number("gpa").unwrap();
            assert_eq!(restored.to_bits(), gpa.to_bits());
            assert_eq!(ids(&copy.students_by_gpa_range(*gpa, *gpa)), vec![id]);
        }
    }

    proptest! {
        #[test]
        fn prop_export_import_preserves_queries(roster in arb_roster(), k in 0usize..40) {
            let gpas: Vec<f64> = roster.students().records().iter().filter_map(|r| r.number("gpa")).collect();

            for format in [SnapshotFormat::Json, SnapshotFormat::Binary] {
                let bytes = roster.export(format).unwrap();
                let mut copy = Roster::new().unwrap();
                copy.import(format, &bytes).unwrap();

                prop_assert_eq!(copy.students().records(), roster.students().records());
                prop_assert_eq!(copy.enrollments(), roster.enrollments());
                prop_assert_eq!(ids(&copy.top_students(k)), ids(&roster.top_students(k)));

                // bounds equal to stored values must select the same records
                for &gpa in &gpas {
                    prop_assert_eq!(
                        ids(&copy.students_by_gpa_range(gpa, gpa)),
                        ids(&roster.students_by_gpa_range(gpa, gpa))
                    );
                    prop_assert_eq!(
                        ids(&copy.students_by_gpa_range(gpa, 4.0)),
                        ids(&roster.students_by_gpa_range(gpa, 4.0))
                    );
                }
                prop_assert_eq!(
                    ids(&copy.students_by_grade_level(10)),
                    ids(&roster.students_by_grade_level(10))
                );
                prop_assert_eq!(copy.course_students("C1").unwrap(), roster.course_students("C1").unwrap());
                prop_assert_eq!(copy.statistics(), roster.statistics());
            }
        }
    }
}
