//! Rollcall - Demo run
//!
//! Builds a sample roster, runs every query type, prints statistics and
//! a report, then round-trips the roster through each export format in
//! a temporary directory.

use rollcall::config::{init_logging, Config};
use rollcall::query::QueryExecutor;
use rollcall::roster::{Collection, NewCourse, NewStudent, Roster};
use rollcall::storage::{Enrollment, Record, RosterResult, SnapshotFormat};
use rollcall::TextIndex;

fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    init_logging(&config.logging);

    tracing::info!("Starting Rollcall demo v{}", env!("CARGO_PKG_VERSION"));

    let mut roster = Roster::with_config(config.index.clone())?;
    demo_load(&mut roster)?;
    demo_errors(&mut roster);
    demo_queries(&roster)?;
    demo_reports(&roster)?;
    demo_persistence(&mut roster, &config)?;
    demo_words();

    tracing::info!("Demo complete");
    Ok(())
}

fn demo_load(roster: &mut Roster) -> RosterResult<()> {
    tracing::info!("Loading sample roster...");

    let students = [
        ("S001", "Alice", "Johnson", "alice.j@school.edu", "555-0101", "2008-03-15", 10, 3.8),
        ("S002", "Bob", "Smith", "bob.s@school.edu", "555-0102", "2008-07-22", 10, 3.5),
        ("S003", "Charlie", "Brown", "charlie.b@school.edu", "555-0103", "2007-11-30", 11, 3.9),
        ("S004", "Diana", "Martinez", "diana.m@school.edu", "555-0104", "2007-05-18", 11, 3.7),
        ("S005", "Eve", "Johnson", "eve.j@school.edu", "555-0105", "2006-09-10", 12, 4.0),
        ("S006", "Frank", "Lee", "frank.l@school.edu", "555-0106", "2006-12-03", 12, 3.6),
    ];
    for (id, first, last, email, phone, dob, grade, gpa) in students {
        roster.add_student(
            NewStudent::new(id, first, last)
                .email(email)
                .phone(phone)
                .date_of_birth(dob)
                .grade_level(grade)
                .gpa(gpa),
        )?;
    }

    let courses = [
        ("MATH101", "Algebra I", 4, "Mathematics"),
        ("ENG101", "English Literature", 3, "English"),
        ("SCI101", "Physics", 4, "Science"),
        ("HIST101", "World History", 3, "History"),
        ("MATH201", "Calculus", 4, "Mathematics"),
    ];
    for (code, name, credits, department) in courses {
        roster.add_course(NewCourse::new(code, name).credits(credits).department(department))?;
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
        roster.enroll(Enrollment::new(student, course, "Fall 2024").grade(grade).score(score))?;
    }

    tracing::info!(
        students = roster.students().len(),
        courses = roster.courses().len(),
        enrollments = roster.enrollments().len(),
        "Sample roster loaded"
    );
    Ok(())
}

fn demo_errors(roster: &mut Roster) {
    let attempts = [
        ("duplicate id", NewStudent::new("S001", "Alicia", "Jones")),
        (
            "duplicate email",
            NewStudent::new("S007", "Grace", "Hopper").email("ALICE.J@school.edu"),
        ),
        ("gpa out of range", NewStudent::new("S008", "Hal", "Nine").gpa(4.7)),
    ];

    for (label, student) in attempts {
        match roster.add_student(student) {
            Ok(record) => tracing::warn!("Unexpectedly accepted {} ({})", record.id, label),
            Err(e) => tracing::info!("Rejected {}: {}", label, e),
        }
    }

    if let Err(e) = roster.enroll(Enrollment::new("S999", "MATH101", "Fall 2024")) {
        tracing::info!("Rejected enrollment: {}", e);
    }
}

fn demo_queries(roster: &Roster) -> anyhow::Result<()> {
    tracing::info!("Running queries...");

    show("Students named Johnson", &roster.students_by_last_name("Johnson"));
    if let Some(student) = roster.student_by_email("bob.s@school.edu") {
        show("Student with email bob.s@school.edu", &[student]);
    }
    show("Names containing 'ar'", &roster.students_by_partial_name("ar"));
    show("Grade 11", &roster.students_by_grade_level(11));
    show("GPA between 3.6 and 3.85", &roster.students_by_gpa_range(3.6, 3.85));
    show("Top 3 by GPA", &roster.top_students(3));
    show("Mathematics courses", &roster.courses_by_department("mathematics"));

    let executor = QueryExecutor::new(roster);
    for query in [
        "FROM students WHERE gpa BETWEEN 3.5 AND 3.8 LIMIT 2",
        "FROM courses TOP 2 BY credits",
        "FROM students WHERE email CONTAINS 'school'",
    ] {
        let output = executor.execute_str(query)?;
        tracing::info!(
            "{} -> {:?} ({}us)",
            query,
            output.ids(),
            output.execution_time_us
        );
    }

    tracing::info!("Students: {}", roster.students().aggregate());
    tracing::info!("Courses: {}", roster.courses().aggregate());

    Ok(())
}

fn demo_reports(roster: &Roster) -> RosterResult<()> {
    println!("\n=== Student Report ===\n{}", roster.report("S001")?);

    println!("\n=== MATH101 Roster ===");
    for entry in roster.course_students("MATH101")? {
        println!(
            "  {} {} {}: {}",
            entry.student_id,
            entry.first_name,
            entry.last_name,
            entry.grade.as_deref().unwrap_or("-")
        );
    }

    println!("\n=== Statistics ===\n{}", roster.statistics());
    Ok(())
}

fn demo_persistence(roster: &mut Roster, config: &Config) -> anyhow::Result<()> {
    tracing::info!("Exporting and importing snapshots...");

    let dir = std::env::temp_dir().join(format!("rollcall-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;

    for format in [SnapshotFormat::Json, SnapshotFormat::Binary] {
        let path = dir.join(format!("roster.{}", format.extension()));
        let bytes = roster.save(&path, format)?;
        let restored = Roster::load(&path, None, config.index.clone())?;
        tracing::info!(
            "{} snapshot: {} bytes, {} students, {} enrollments",
            format,
            bytes,
            restored.students().len(),
            restored.enrollments().len()
        );
    }

    let csv_path = dir.join("students.csv");
    let mut file = std::fs::File::create(&csv_path)?;
    let rows = roster.export_csv(Collection::Students, &mut file, &config.storage.csv_null_marker)?;
    tracing::info!("Wrote {} student rows to {:?}", rows, csv_path);

    let mut fresh = Roster::with_config(config.index.clone())?;
    let result = fresh.import_students_csv(
        std::fs::File::open(&csv_path)?,
        &config.storage.csv_null_marker,
    )?;
    tracing::info!(
        "Re-imported {} of {} CSV rows",
        result.imported,
        result.rows_processed
    );

    // A corrupt import must leave the roster untouched
    let mut bytes = roster.export(SnapshotFormat::Binary)?;
    if let Some(last) = bytes.last_mut() {
        *last ^= 0xff;
    }
    match roster.import(SnapshotFormat::Binary, &bytes) {
        Ok(()) => tracing::warn!("Corrupt snapshot was accepted"),
        Err(e) => tracing::info!(
            "Corrupt snapshot rejected ({}); still {} students",
            e,
            roster.students().len()
        ),
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

fn demo_words() {
    let text = "The quick brown fox jumps over the lazy dog. \
                The dog sleeps while the fox runs. \
                A quick brown dog chases the fox.";

    let mut index = TextIndex::new();
    index.build(text);

    tracing::info!(
        "Indexed {} words ({} distinct)",
        index.word_count(),
        index.distinct_words()
    );
    tracing::info!("Most common: {:?}", index.most_common(3));
    tracing::info!("'fox' at positions {:?}", index.search("fox"));
    for snippet in index.context("dog", 2) {
        tracing::info!("  ...{}...", snippet);
    }
}

fn show(label: &str, records: &[&Record]) {
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    tracing::info!("{}: {:?}", label, ids);
}
