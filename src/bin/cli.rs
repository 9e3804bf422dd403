//! Rollcall CLI
//!
//! Command-line interface for roster operations:
//! - Add students, courses and enrollments
//! - Run queries, reports and statistics
//! - Import/Export snapshots and CSV
//!
//! State lives in the configured snapshot file; mutating commands
//! rewrite it on success.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rollcall::config::{generate_default_config, init_logging, Config};
use rollcall::query::QueryExecutor;
use rollcall::roster::{Collection, NewCourse, NewStudent, Roster};
use rollcall::storage::{Enrollment, Record, SnapshotFormat};
use rollcall::TextIndex;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Indexed student and course records")]
#[command(long_about = "Rollcall keeps students, courses and enrollments in memory behind\nexact, range and top-k indexes, persisted as a snapshot file.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir, then ./rollcall.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    pub output_format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Json,
    Binary,
    Csv,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a student
    AddStudent {
        /// Student id
        id: String,
        first_name: String,
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<String>,
        #[arg(long)]
        grade_level: Option<i64>,
        #[arg(long)]
        gpa: Option<f64>,
    },

    /// Add a course
    AddCourse {
        /// Course code
        code: String,
        name: String,
        #[arg(long, default_value = "3")]
        credits: i64,
        #[arg(long)]
        department: Option<String>,
    },

    /// Enroll a student in a course
    Enroll {
        student_id: String,
        course_code: String,
        semester: String,
        /// Letter grade
        #[arg(long)]
        grade: Option<String>,
        /// Numeric score
        #[arg(long)]
        score: Option<f64>,
    },

    /// Run a query, e.g. "FROM students TOP 3 BY gpa"
    Find {
        query: String,
    },

    /// Show a student's report
    Report {
        student_id: String,
    },

    /// List the students in a course
    Roster {
        course_code: String,
    },

    /// Show roster statistics
    Stats,

    /// Export the roster
    Export {
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Collection for CSV export
        #[arg(short, long, default_value = "students")]
        collection: Collection,
        /// Output file (default: stdout, not allowed for binary)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the roster with a snapshot file
    Import {
        path: PathBuf,
        /// json or binary (default: detect)
        #[arg(short, long)]
        format: Option<SnapshotFormat>,
    },

    /// Add students from a CSV file with a header row
    ImportCsv {
        path: PathBuf,
    },

    /// Index a text file and search it
    Words {
        file: PathBuf,
        /// Term to look up
        #[arg(short, long)]
        term: Option<String>,
        /// Number of most common words to show
        #[arg(long, default_value = "10")]
        top: usize,
        /// Words of context around each occurrence of --term
        #[arg(long)]
        context: Option<usize>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    let json = cli.output_format == OutputFormat::Json;

    match cli.command {
        Commands::AddStudent {
            id,
            first_name,
            last_name,
            email,
            phone,
            dob,
            grade_level,
            gpa,
        } => {
            let mut student = NewStudent::new(id, first_name, last_name);
            if let Some(email) = email {
                student = student.email(email);
            }
            if let Some(phone) = phone {
                student = student.phone(phone);
            }
            if let Some(dob) = dob {
                student = student.date_of_birth(dob);
            }
            if let Some(level) = grade_level {
                student = student.grade_level(level);
            }
            if let Some(gpa) = gpa {
                student = student.gpa(gpa);
            }

            let mut roster = open_roster(&config)?;
            let id = roster.add_student(student)?.id.clone();
            save_roster(&roster, &config)?;
            println!("Added student {}", id);
        }

        Commands::AddCourse {
            code,
            name,
            credits,
            department,
        } => {
            let mut course = NewCourse::new(code, name).credits(credits);
            if let Some(department) = department {
                course = course.department(department);
            }

            let mut roster = open_roster(&config)?;
            let code = roster.add_course(course)?.id.clone();
            save_roster(&roster, &config)?;
            println!("Added course {}", code);
        }

        Commands::Enroll {
            student_id,
            course_code,
            semester,
            grade,
            score,
        } => {
            let mut enrollment = Enrollment::new(student_id, course_code, semester);
            if let Some(grade) = grade {
                enrollment = enrollment.grade(grade);
            }
            if let Some(score) = score {
                enrollment = enrollment.score(score);
            }
            let summary = format!(
                "Enrolled {} in {} ({})",
                enrollment.student_id, enrollment.course_code, enrollment.semester
            );

            let mut roster = open_roster(&config)?;
            roster.enroll(enrollment)?;
            save_roster(&roster, &config)?;
            println!("{}", summary);
        }

        Commands::Find { query } => {
            let roster = open_roster(&config)?;
            let output = QueryExecutor::new(&roster).execute_str(&query)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&output.records)?);
            } else {
                print_records(output.columns(), &output.records);
                println!();
                println!(
                    "{} {} in {}us",
                    output.len(),
                    output.collection,
                    output.execution_time_us
                );
            }
        }

        Commands::Report { student_id } => {
            let roster = open_roster(&config)?;
            let report = roster.report(&student_id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }

        Commands::Roster { course_code } => {
            let roster = open_roster(&config)?;
            let course = roster.course(&course_code)?;
            let entries = roster.course_students(&course_code)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!(
                    "{}: {}",
                    course.id,
                    course.text("course_name").unwrap_or("-")
                );
                println!();
                println!("{:<10} {:<25} {:<6} {}", "ID", "Name", "Grade", "Score");
                println!("{}", "-".repeat(50));
                for entry in entries {
                    println!(
                        "{:<10} {:<25} {:<6} {}",
                        entry.student_id,
                        format!("{} {}", entry.first_name, entry.last_name),
                        entry.grade.as_deref().unwrap_or("-"),
                        entry
                            .score
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }
        }

        Commands::Stats => {
            let roster = open_roster(&config)?;
            let stats = roster.statistics();

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", stats);
                println!();
                println!("Indexes:");
                for collection in [Collection::Students, Collection::Courses] {
                    let s = roster.collection(collection).stats();
                    println!(
                        "  {}: {} records, {} secondary ({} keys), {} ordered ({} entries)",
                        collection,
                        s.records,
                        s.secondary_indexes,
                        s.secondary_keys,
                        s.ordered_indexes,
                        s.ordered_entries
                    );
                }
            }
        }

        Commands::Export {
            format,
            collection,
            output,
        } => {
            let roster = open_roster(&config)?;

            let bytes = match format {
                ExportFormat::Json => roster.export(SnapshotFormat::Json)?,
                ExportFormat::Binary => {
                    if output.is_none() {
                        bail!("Binary export needs --output");
                    }
                    roster.export(SnapshotFormat::Binary)?
                }
                ExportFormat::Csv => {
                    let mut buf = Vec::new();
                    roster.export_csv(collection, &mut buf, &config.storage.csv_null_marker)?;
                    buf
                }
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Exported {} bytes to {:?}", bytes.len(), path);
                }
                None => {
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }

        Commands::Import { path, format } => {
            if !path.exists() {
                bail!("File not found: {:?}", path);
            }

            let roster = Roster::load(&path, format, config.index.clone())
                .with_context(|| format!("Failed to import {:?}", path))?;
            save_roster(&roster, &config)?;

            println!("Imported snapshot:");
            println!("  Students: {}", roster.students().len());
            println!("  Courses: {}", roster.courses().len());
            println!("  Enrollments: {}", roster.enrollments().len());
        }

        Commands::ImportCsv { path } => {
            let file = File::open(&path).with_context(|| format!("File not found: {:?}", path))?;

            let mut roster = open_roster(&config)?;
            let result = roster.import_students_csv(file, &config.storage.csv_null_marker)?;
            if result.imported > 0 {
                save_roster(&roster, &config)?;
            }

            println!("Import results:");
            println!("  Rows processed: {}", result.rows_processed);
            println!("  Imported: {}", result.imported);
            println!("  Rows failed: {}", result.rows_failed);

            if !result.errors.is_empty() {
                println!();
                println!("Errors (first 10):");
                for error in result.errors.iter().take(10) {
                    println!("  {}", error);
                }
            }
        }

        Commands::Words {
            file,
            term,
            top,
            context,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let mut index = TextIndex::new();
            index.build(&text);

            if json {
                let body = serde_json::json!({
                    "word_count": index.word_count(),
                    "distinct_words": index.distinct_words(),
                    "most_common": index.most_common(top),
                    "term": term.as_deref().map(|t| serde_json::json!({
                        "term": t,
                        "positions": index.search(t),
                        "context": context.map(|size| index.context(t, size)),
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!(
                    "{} words, {} distinct",
                    index.word_count(),
                    index.distinct_words()
                );
                println!();
                println!("{:<20} {}", "Word", "Count");
                println!("{}", "-".repeat(30));
                for (word, count) in index.most_common(top) {
                    println!("{:<20} {}", word, count);
                }

                if let Some(term) = term {
                    println!();
                    println!("'{}': {} occurrences", term, index.count(&term));
                    if let Some(size) = context {
                        for snippet in index.context(&term, size) {
                            println!("  ...{}...", snippet);
                        }
                    }
                }
            }
        }

        Commands::Config { output } => {
            let config_content = generate_default_config();

            match output {
                Some(path) => {
                    std::fs::write(&path, &config_content)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config_content);
                }
            }
        }
    }

    Ok(())
}

/// Load the persisted roster, or start an empty one
fn open_roster(config: &Config) -> anyhow::Result<Roster> {
    let path = config.storage.snapshot_path();
    if path.exists() {
        Roster::load(&path, None, config.index.clone())
            .with_context(|| format!("Failed to load roster from {:?}", path))
    } else {
        Ok(Roster::with_config(config.index.clone())?)
    }
}

fn save_roster(roster: &Roster, config: &Config) -> anyhow::Result<()> {
    let path = config.storage.snapshot_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    roster
        .save(&path, config.storage.snapshot_format)
        .with_context(|| format!("Failed to save roster to {:?}", path))?;
    Ok(())
}

fn print_records(columns: &[String], records: &[&Record]) {
    if records.is_empty() {
        println!("No matching records.");
        return;
    }

    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    if i == 0 {
                        record.id.to_string()
                    } else {
                        record
                            .get(column)
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "-".to_string())
                    }
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    println!("{}", header.join("  "));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));

    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        println!("{}", line.join("  "));
    }
}
