//! Roster input builders and query result views

use crate::storage::{Record, RecordId, RosterError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default credits for a course that does not specify them
pub const DEFAULT_CREDITS: i64 = 3;

/// Status given to newly added students
pub const DEFAULT_STATUS: &str = "active";

/// The two record collections of a roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Students,
    Courses,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Courses => "courses",
        }
    }

    /// Column the record id is exported under
    pub fn id_field(&self) -> &'static str {
        match self {
            Collection::Students => "student_id",
            Collection::Courses => "course_code",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "students" | "student" => Ok(Collection::Students),
            "courses" | "course" => Ok(Collection::Courses),
            other => Err(RosterError::invalid(
                "collection",
                format!("unknown collection '{}'", other),
            )),
        }
    }
}

/// A student to be added
///
/// # Example
/// ```ignore
/// let student = NewStudent::new("S001", "Alice", "Johnson")
///     .email("alice.j@school.edu")
///     .grade_level(10)
///     .gpa(3.8);
/// roster.add_student(student)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub grade_level: Option<i64>,
    pub gpa: Option<f64>,
    /// Additional undeclared fields
    pub extra: BTreeMap<String, Value>,
}

impl NewStudent {
    pub fn new(
        id: impl Into<RecordId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            date_of_birth: None,
            grade_level: None,
            gpa: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn date_of_birth(mut self, date: impl Into<String>) -> Self {
        self.date_of_birth = Some(date.into());
        self
    }

    pub fn grade_level(mut self, level: i64) -> Self {
        self.grade_level = Some(level);
        self
    }

    pub fn gpa(mut self, gpa: f64) -> Self {
        self.gpa = Some(gpa);
        self
    }

    /// Builder method: attach an undeclared field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Build the stored record; `enrollment_date` is an ISO date
    pub(crate) fn into_record(self, enrollment_date: &str) -> Record {
        let mut record = Record::new(self.id)
            .field("first_name", self.first_name)
            .field("last_name", self.last_name)
            .field("email", self.email)
            .field("phone", self.phone)
            .field("date_of_birth", self.date_of_birth)
            .field("enrollment_date", enrollment_date)
            .field("grade_level", self.grade_level)
            .field("gpa", self.gpa)
            .field("status", DEFAULT_STATUS);
        for (name, value) in self.extra {
            record.set(name, value);
        }
        record
    }
}

/// A course to be added
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub code: RecordId,
    pub name: String,
    pub credits: i64,
    pub department: Option<String>,
}

impl NewCourse {
    pub fn new(code: impl Into<RecordId>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            credits: DEFAULT_CREDITS,
            department: None,
        }
    }

    pub fn credits(mut self, credits: i64) -> Self {
        self.credits = credits;
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub(crate) fn into_record(self) -> Record {
        Record::new(self.code)
            .field("course_name", self.name)
            .field("credits", self.credits)
            .field("department", self.department)
    }
}

/// One enrollment seen from the student's side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseEntry {
    pub course_code: RecordId,
    pub course_name: String,
    pub semester: String,
    pub grade: Option<String>,
    pub score: Option<f64>,
}

/// One enrollment seen from the course's side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub student_id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub grade: Option<String>,
    pub score: Option<f64>,
}

/// Student details shown in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentInfo {
    pub id: RecordId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub grade_level: Option<i64>,
    pub gpa: Option<f64>,
    pub enrollment_date: Option<String>,
    pub status: Option<String>,
}

impl StudentInfo {
    pub(crate) fn from_record(record: &Record) -> Self {
        let text = |name: &str| record.text(name).map(str::to_string);
        let name = [record.text("first_name"), record.text("last_name")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            id: record.id.clone(),
            name,
            email: text("email"),
            phone: text("phone"),
            grade_level: record.integer("grade_level"),
            gpa: record.number("gpa"),
            enrollment_date: text("enrollment_date"),
            status: text("status"),
        }
    }
}

/// Full report on one student
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReport {
    pub student: StudentInfo,
    pub courses: Vec<CourseEntry>,
    pub total_courses: usize,
    pub total_credits: i64,
}

fn opt<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for StudentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.student;
        writeln!(f, "Student: {}", s.name)?;
        writeln!(f, "ID: {}", s.id)?;
        writeln!(f, "Email: {}", opt(&s.email))?;
        writeln!(f, "Grade Level: {}", opt(&s.grade_level))?;
        writeln!(f, "GPA: {}", opt(&s.gpa))?;
        writeln!(f, "Status: {}", opt(&s.status))?;
        writeln!(f, "Total Courses: {}", self.total_courses)?;
        writeln!(f, "Total Credits: {}", self.total_credits)?;
        write!(f, "Courses:")?;
        for c in &self.courses {
            write!(
                f,
                "\n  {}: {} - {} ({})",
                c.course_code,
                c.course_name,
                opt(&c.grade),
                opt(&c.score)
            )?;
        }
        Ok(())
    }
}

/// A course and how many enrollments it has
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularCourse {
    pub course_code: RecordId,
    pub course_name: String,
    pub enrollments: usize,
}

/// Roster-wide statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterStatistics {
    pub total_students: usize,
    pub average_gpa: Option<f64>,
    /// Lower-middle element of the sorted gpas
    pub median_gpa: Option<f64>,
    /// (grade level, students), ascending by grade level
    pub students_per_grade: Vec<(i64, usize)>,
    pub honor_threshold: f64,
    /// Students with a gpa at or above the threshold
    pub honor_students: usize,
    pub total_courses: usize,
    pub total_enrollments: usize,
    pub popular_courses: Vec<PopularCourse>,
    /// (department, courses), most courses first
    pub courses_per_department: Vec<(String, usize)>,
}

impl fmt::Display for RosterStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gpa = |v: Option<f64>| v.map(|g| format!("{:.2}", g)).unwrap_or_else(|| "-".into());

        writeln!(f, "Total Students: {}", self.total_students)?;
        writeln!(f, "Average GPA: {}", gpa(self.average_gpa))?;
        writeln!(f, "Median GPA: {}", gpa(self.median_gpa))?;
        writeln!(
            f,
            "Honor Students (GPA >= {}): {}",
            self.honor_threshold, self.honor_students
        )?;
        writeln!(f, "Total Courses: {}", self.total_courses)?;
        writeln!(f, "Total Enrollments: {}", self.total_enrollments)?;

        writeln!(f, "\nStudents per Grade:")?;
        for (grade, count) in &self.students_per_grade {
            writeln!(f, "  Grade {}: {} students", grade, count)?;
        }

        writeln!(f, "\nMost Popular Courses:")?;
        for c in &self.popular_courses {
            writeln!(f, "  {} ({}): {} students", c.course_code, c.course_name, c.enrollments)?;
        }

        write!(f, "\nCourses per Department:")?;
        for (dept, count) in &self.courses_per_department {
            write!(f, "\n  {}: {}", dept, count)?;
        }
        Ok(())
    }
}
