//! Tabular (CSV) export and import
//!
//! One row per record, one column per field. The column set is the id
//! column, then every declared field in schema order, then any other
//! field found on any record (alphabetical). Absent and null values are
//! written as an explicit null marker so heterogeneous records keep all
//! of their fields.

use crate::storage::error::{RosterError, RosterResult};
use crate::storage::types::{FieldKind, IndexSchema, Record, RecordId, Value};
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// Marker written for absent/null values unless configured otherwise
pub const DEFAULT_NULL_MARKER: &str = "NULL";

/// Compute the export column list for `records`
pub fn columns<'a>(schema: &IndexSchema, records: impl Iterator<Item = &'a Record>) -> Vec<String> {
    let declared: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();

    let extras: BTreeSet<&str> = records
        .flat_map(|r| r.fields.keys())
        .map(String::as_str)
        .filter(|name| !declared.contains(name))
        .collect();

    std::iter::once(schema.id_field.as_str())
        .chain(declared.iter().copied())
        .chain(extras)
        .map(str::to_string)
        .collect()
}

/// Write `records` as CSV with a header row; returns the number of rows
pub fn write_records<W: Write>(
    schema: &IndexSchema,
    records: &[Record],
    writer: W,
    null_marker: &str,
) -> RosterResult<usize> {
    let header = columns(schema, records.iter());
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&header)?;

    for record in records {
        let row = header.iter().enumerate().map(|(i, column)| {
            if i == 0 {
                return record.id.to_string();
            }
            match record.get(column) {
                Some(value) => value.to_string(),
                None => null_marker.to_string(),
            }
        });
        csv.write_record(row)?;
    }

    csv.flush()?;
    Ok(records.len())
}

/// One parsed data row of a CSV import
#[derive(Debug)]
pub struct CsvRow {
    /// 1-based line number in the source
    pub line: u64,
    pub record: RosterResult<Record>,
}

/// Parse CSV rows into records guided by `schema`
///
/// The header must contain the id column. Cells equal to the null marker
/// or empty become `Value::Null`. A row that fails to parse yields an
/// error for that row only.
pub fn read_records<R: Read>(
    schema: &IndexSchema,
    reader: R,
    null_marker: &str,
) -> RosterResult<Vec<CsvRow>> {
    let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv.headers()?.clone();

    let id_col = headers
        .iter()
        .position(|h| h == schema.id_field)
        .ok_or_else(|| {
            RosterError::invalid(&schema.id_field, "CSV header has no id column")
        })?;

    let mut rows = Vec::new();
    for (i, result) in csv.records().enumerate() {
        let fallback_line = i as u64 + 2;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                rows.push(CsvRow {
                    line,
                    record: Err(e.into()),
                });
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(fallback_line);

        rows.push(CsvRow {
            line,
            record: parse_row(schema, &headers, &row, id_col, null_marker),
        });
    }

    Ok(rows)
}

fn parse_row(
    schema: &IndexSchema,
    headers: &csv::StringRecord,
    row: &csv::StringRecord,
    id_col: usize,
    null_marker: &str,
) -> RosterResult<Record> {
    let id = row.get(id_col).unwrap_or_default().trim();
    let mut record = Record::new(RecordId::from(id));

    for (col, name) in headers.iter().enumerate() {
        if col == id_col {
            continue;
        }
        let cell = row.get(col).unwrap_or_default();
        let kind = schema.field(name).map(|f| f.kind);
        record.set(name, parse_cell(name, cell, kind, null_marker)?);
    }

    Ok(record)
}

/// Parse one cell; declared fields must parse as their kind
fn parse_cell(
    field: &str,
    cell: &str,
    kind: Option<FieldKind>,
    null_marker: &str,
) -> RosterResult<Value> {
    let cell = cell.trim();
    if cell.is_empty() || cell == null_marker {
        return Ok(Value::Null);
    }

    let invalid = |expected: FieldKind| {
        RosterError::invalid(field, format!("expected {}, got '{}'", expected, cell))
    };

    match kind {
        Some(FieldKind::Text) => Ok(Value::Text(cell.to_string())),
        Some(FieldKind::Integer) => cell
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid(FieldKind::Integer)),
        Some(FieldKind::Float) => cell
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid(FieldKind::Float)),
        Some(FieldKind::Bool) => cell
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| invalid(FieldKind::Bool)),
        None => Ok(infer_value(cell)),
    }
}

/// Best-effort typing for undeclared columns
fn infer_value(cell: &str) -> Value {
    if let Ok(i) = cell.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = cell.parse::<f64>() {
        if f.is_finite() {
            Value::Float(f)
        } else {
            Value::Text(cell.to_string())
        }
    } else if let Ok(b) = cell.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::Text(cell.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FieldSpec;

    fn schema() -> IndexSchema {
        IndexSchema::new("students", "student_id")
            .with_field(FieldSpec::text("first_name").required())
            .with_field(FieldSpec::text("email"))
            .with_field(FieldSpec::float("gpa"))
    }

    #[test]
    fn test_columns_are_union_of_fields() {
        let records = vec![
            Record::new("S1").field("first_name", "Alice"),
            Record::new("S2").field("first_name", "Bob").field("nickname", "Bobby"),
            Record::new("S3").field("first_name", "Cy").field("club", "chess"),
        ];
        assert_eq!(
            columns(&schema(), records.iter()),
            vec!["student_id", "first_name", "email", "gpa", "club", "nickname"]
        );
    }

    #[test]
    fn test_write_fills_null_marker() {
        let records = vec![
            Record::new("S1").field("first_name", "Alice").field("gpa", 3.8),
            Record::new("S2")
                .field("first_name", "Bob")
                .field("email", Value::Null)
                .field("nickname", "Bobby"),
        ];

        let mut out = Vec::new();
        let n = write_records(&schema(), &records, &mut out, DEFAULT_NULL_MARKER).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "student_id,first_name,email,gpa,nickname");
        assert_eq!(lines[1], "S1,Alice,NULL,3.8,NULL");
        assert_eq!(lines[2], "S2,Bob,NULL,NULL,Bobby");
    }

    #[test]
    fn test_read_parses_declared_and_extra_columns() {
        let data = "student_id,first_name,gpa,email,age\nS1,Alice,3.8,NULL,16\nS2,Bob,,b@x.io,abc\n";
        let rows = read_records(&schema(), data.as_bytes(), DEFAULT_NULL_MARKER).unwrap();
        assert_eq!(rows.len(), 2);

        let alice = rows[0].record.as_ref().unwrap();
        assert_eq!(alice.id.as_str(), "S1");
        assert_eq!(alice.fields["gpa"], Value::Float(3.8));
        assert_eq!(alice.fields["email"], Value::Null);
        assert_eq!(alice.fields["age"], Value::Integer(16));

        let bob = rows[1].record.as_ref().unwrap();
        assert_eq!(bob.fields["gpa"], Value::Null);
        assert_eq!(bob.fields["age"], Value::Text("abc".to_string()));
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_read_reports_bad_cell_per_row() {
        let data = "student_id,first_name,gpa\nS1,Alice,high\nS2,Bob,3.1\n";
        let rows = read_records(&schema(), data.as_bytes(), DEFAULT_NULL_MARKER).unwrap();

        assert!(matches!(
            &rows[0].record,
            Err(RosterError::InvalidInput { field, .. }) if field == "gpa"
        ));
        assert!(rows[1].record.is_ok());
    }

    #[test]
    fn test_read_requires_id_column() {
        let data = "first_name,gpa\nAlice,3.8\n";
        assert!(read_records(&schema(), data.as_bytes(), DEFAULT_NULL_MARKER).is_err());
    }
}
