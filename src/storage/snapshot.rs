//! Snapshot file formats
//!
//! A snapshot captures both record collections, the enrollments linking
//! them, and informational statistics. Two encodings are supported:
//!
//! JSON: the `Snapshot` document itself, pretty-printed.
//!
//! Binary:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (16 bytes)                       │
//! │   magic: [u8; 4] = "RCSN"               │
//! │   version: u16                          │
//! │   flags: u16        (bit 0 = LZ4)       │
//! │   payload_len: u32                      │
//! │   checksum: u32     (crc32 of payload)  │
//! ├─────────────────────────────────────────┤
//! │ PAYLOAD (payload_len bytes)             │
//! │   lz4(bincode(EncodedSnapshot))         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The binary payload interns field names into a string table so each
//! record stores `(name_idx, value)` pairs instead of repeated names.

use crate::index::Statistics;
use crate::storage::error::{RosterError, RosterResult};
use crate::storage::types::{Enrollment, IndexSchema, Record, RecordId, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Current snapshot document version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Magic bytes for binary snapshot identification
const SNAPSHOT_MAGIC: [u8; 4] = *b"RCSN";

/// Binary container version
const BINARY_VERSION: u16 = 1;

/// Header size in bytes
const HEADER_SIZE: usize = 16;

const FLAG_LZ4: u16 = 0b1;

/// On-disk encoding of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Binary,
}

impl SnapshotFormat {
    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Binary => "rcsn",
        }
    }

    /// Guess the format from leading bytes
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&SNAPSHOT_MAGIC) {
            SnapshotFormat::Binary
        } else {
            SnapshotFormat::Json
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotFormat::Json => write!(f, "json"),
            SnapshotFormat::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for SnapshotFormat {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "binary" | "bin" | "rcsn" => Ok(SnapshotFormat::Binary),
            other => Err(RosterError::invalid(
                "format",
                format!("unknown snapshot format '{}' (expected json or binary)", other),
            )),
        }
    }
}

/// One collection: its schema and records in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub schema: IndexSchema,
    pub records: Vec<Record>,
}

/// Statistics captured at export time
///
/// Informational only: an importer recomputes them from the records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStatistics {
    pub students: Statistics,
    pub courses: Statistics,
    pub enrollments: usize,
}

/// Full, self-describing export of a roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub students: CollectionSnapshot,
    pub courses: CollectionSnapshot,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub statistics: SnapshotStatistics,
}

impl Snapshot {
    pub fn new(
        students: CollectionSnapshot,
        courses: CollectionSnapshot,
        enrollments: Vec<Enrollment>,
        statistics: SnapshotStatistics,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            students,
            courses,
            enrollments,
            statistics,
        }
    }

    /// Encode the snapshot in `format`
    pub fn to_bytes(&self, format: SnapshotFormat) -> RosterResult<Vec<u8>> {
        match format {
            SnapshotFormat::Json => Ok(serde_json::to_vec_pretty(self)?),
            SnapshotFormat::Binary => encode_binary(self),
        }
    }

    /// Decode a snapshot, verifying its version (and checksum for binary)
    pub fn from_bytes(bytes: &[u8], format: SnapshotFormat) -> RosterResult<Self> {
        let snapshot = match format {
            SnapshotFormat::Json => {
                // Check the version before the shape so newer documents fail clearly
                let probe: VersionProbe = serde_json::from_slice(bytes)?;
                if probe.version > SNAPSHOT_VERSION {
                    return Err(RosterError::UnsupportedVersion(probe.version));
                }
                serde_json::from_slice(bytes)?
            }
            SnapshotFormat::Binary => decode_binary(bytes)?,
        };

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(RosterError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Write the snapshot to `path`
    ///
    /// The bytes go to a sibling temp file which is then renamed over
    /// `path`, so readers never observe a half-written snapshot.
    pub fn write_to(&self, path: &Path, format: SnapshotFormat) -> RosterResult<usize> {
        let bytes = self.to_bytes(format)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;

        tracing::info!(
            path = %path.display(),
            format = %format,
            bytes = bytes.len(),
            "Wrote snapshot"
        );
        Ok(bytes.len())
    }

    /// Read a snapshot from `path`; `None` detects the format from the content
    pub fn read_from(path: &Path, format: Option<SnapshotFormat>) -> RosterResult<Self> {
        let bytes = fs::read(path)?;
        let format = format.unwrap_or_else(|| SnapshotFormat::detect(&bytes));
        let snapshot = Self::from_bytes(&bytes, format)?;

        tracing::info!(
            path = %path.display(),
            format = %format,
            students = snapshot.students.records.len(),
            courses = snapshot.courses.records.len(),
            enrollments = snapshot.enrollments.len(),
            "Read snapshot"
        );
        Ok(snapshot)
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

// ==================== Binary Encoding ====================

/// Binary container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u16,
    pub flags: u16,
    pub payload_len: u32,
    pub checksum: u32,
}

impl SnapshotHeader {
    fn for_payload(payload: &[u8]) -> RosterResult<Self> {
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| RosterError::Serialization("snapshot payload exceeds 4 GiB".to_string()))?;
        Ok(Self {
            version: BINARY_VERSION,
            flags: FLAG_LZ4,
            payload_len,
            checksum: crc32fast::hash(payload),
        })
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&SNAPSHOT_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..12].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse header from bytes, checking magic and version
    pub fn from_bytes(buf: &[u8]) -> RosterResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(RosterError::Corruption(format!(
                "Snapshot too short: {} bytes",
                buf.len()
            )));
        }
        if buf[0..4] != SNAPSHOT_MAGIC {
            return Err(RosterError::Corruption(format!(
                "Invalid magic: {:?}",
                &buf[0..4]
            )));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > BINARY_VERSION {
            return Err(RosterError::UnsupportedVersion(version as u32));
        }

        Ok(Self {
            version,
            flags: u16::from_le_bytes([buf[6], buf[7]]),
            payload_len: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            checksum: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }
}

/// Field-name string table
#[derive(Debug, Default, Serialize, Deserialize)]
struct StringTable {
    strings: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, u32>,
}

impl StringTable {
    /// Intern a string, returning its index
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.lookup.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), idx);
        idx
    }

    fn resolve(&self, idx: u32) -> RosterResult<&str> {
        self.strings
            .get(idx as usize)
            .map(String::as_str)
            .ok_or_else(|| RosterError::Corruption(format!("Invalid string index: {}", idx)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedRecord {
    id: RecordId,
    fields: Vec<(u32, Value)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedCollection {
    schema: IndexSchema,
    records: Vec<EncodedRecord>,
}

/// Intermediate format for the binary payload
#[derive(Debug, Serialize, Deserialize)]
struct EncodedSnapshot {
    version: u32,
    exported_at: DateTime<Utc>,
    names: StringTable,
    students: EncodedCollection,
    courses: EncodedCollection,
    enrollments: Vec<Enrollment>,
    statistics: SnapshotStatistics,
}

fn encode_collection(collection: &CollectionSnapshot, names: &mut StringTable) -> EncodedCollection {
    EncodedCollection {
        schema: collection.schema.clone(),
        records: collection
            .records
            .iter()
            .map(|r| EncodedRecord {
                id: r.id.clone(),
                fields: r
                    .fields
                    .iter()
                    .map(|(name, value)| (names.intern(name), value.clone()))
                    .collect(),
            })
            .collect(),
    }
}

fn decode_collection(
    encoded: EncodedCollection,
    names: &StringTable,
) -> RosterResult<CollectionSnapshot> {
    let records = encoded
        .records
        .into_iter()
        .map(|r| -> RosterResult<Record> {
            let mut record = Record::new(r.id);
            for (idx, value) in r.fields {
                record.set(names.resolve(idx)?, value);
            }
            Ok(record)
        })
        .collect::<RosterResult<Vec<_>>>()?;

    Ok(CollectionSnapshot {
        schema: encoded.schema,
        records,
    })
}

fn encode_binary(snapshot: &Snapshot) -> RosterResult<Vec<u8>> {
    let mut names = StringTable::default();
    let students = encode_collection(&snapshot.students, &mut names);
    let courses = encode_collection(&snapshot.courses, &mut names);

    let encoded = EncodedSnapshot {
        version: snapshot.version,
        exported_at: snapshot.exported_at,
        names,
        students,
        courses,
        enrollments: snapshot.enrollments.clone(),
        statistics: snapshot.statistics.clone(),
    };

    let serialized = bincode::serialize(&encoded)?;
    let payload = lz4_flex::compress_prepend_size(&serialized);
    let header = SnapshotHeader::for_payload(&payload)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

fn decode_binary(bytes: &[u8]) -> RosterResult<Snapshot> {
    let header = SnapshotHeader::from_bytes(bytes)?;

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != header.payload_len as usize {
        return Err(RosterError::Corruption(format!(
            "Payload length mismatch: header={}, actual={}",
            header.payload_len,
            payload.len()
        )));
    }

    let computed = crc32fast::hash(payload);
    if computed != header.checksum {
        return Err(RosterError::Corruption(format!(
            "Checksum mismatch: stored={}, computed={}",
            header.checksum, computed
        )));
    }

    let serialized = if header.flags & FLAG_LZ4 != 0 {
        lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| RosterError::Compression(format!("LZ4 decompression failed: {}", e)))?
    } else {
        payload.to_vec()
    };

    let encoded: EncodedSnapshot = bincode::deserialize(&serialized)?;
    if encoded.version > SNAPSHOT_VERSION {
        return Err(RosterError::UnsupportedVersion(encoded.version));
    }

    Ok(Snapshot {
        version: encoded.version,
        exported_at: encoded.exported_at,
        students: decode_collection(encoded.students, &encoded.names)?,
        courses: decode_collection(encoded.courses, &encoded.names)?,
        enrollments: encoded.enrollments,
        statistics: encoded.statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FieldSpec;
    use tempfile::tempdir;

    fn sample() -> Snapshot {
        let students = CollectionSnapshot {
            schema: IndexSchema::new("students", "student_id")
                .with_field(FieldSpec::text("last_name").required().exact())
                .with_field(FieldSpec::float("gpa").ordered()),
            records: vec![
                Record::new("S001").field("last_name", "Johnson").field("gpa", 4.0),
                Record::new("S002")
                    .field("last_name", "Smith")
                    .field("gpa", 3.5)
                    .field("phone", Value::Null),
            ],
        };
        let courses = CollectionSnapshot {
            schema: IndexSchema::new("courses", "course_code")
                .with_field(FieldSpec::integer("credits")),
            records: vec![Record::new("MATH101").field("credits", 4)],
        };
        let enrollments = vec![Enrollment::new("S001", "MATH101", "Fall 2024").score(92.5)];
        Snapshot::new(students, courses, enrollments, SnapshotStatistics::default())
    }

    #[test]
    fn test_json_roundtrip() {
        let snapshot = sample();
        let bytes = snapshot.to_bytes(SnapshotFormat::Json).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"version\": 1"));
        assert!(text.contains("\"last_name\": \"Johnson\""));

        let back = Snapshot::from_bytes(&bytes, SnapshotFormat::Json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_binary_roundtrip_keeps_value_types() {
        let snapshot = sample();
        let bytes = snapshot.to_bytes(SnapshotFormat::Binary).unwrap();
        assert_eq!(&bytes[0..4], b"RCSN");
        assert_eq!(SnapshotFormat::detect(&bytes), SnapshotFormat::Binary);

        let back = Snapshot::from_bytes(&bytes, SnapshotFormat::Binary).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.students.records[0].fields["gpa"], Value::Float(4.0));
        assert_eq!(back.students.records[1].fields["phone"], Value::Null);
    }

    #[test]
    fn test_binary_detects_corruption() {
        let mut bytes = sample().to_bytes(SnapshotFormat::Binary).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            Snapshot::from_bytes(&bytes, SnapshotFormat::Binary),
            Err(RosterError::Corruption(_))
        ));

        let truncated = &sample().to_bytes(SnapshotFormat::Binary).unwrap()[..10];
        assert!(Snapshot::from_bytes(truncated, SnapshotFormat::Binary).is_err());

        assert!(Snapshot::from_bytes(b"XXXXXXXXXXXXXXXXXXXX", SnapshotFormat::Binary).is_err());
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut doc = serde_json::to_value(sample()).unwrap();
        doc["version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&doc).unwrap();
        assert!(matches!(
            Snapshot::from_bytes(&bytes, SnapshotFormat::Json),
            Err(RosterError::UnsupportedVersion(99))
        ));

        let mut header = sample().to_bytes(SnapshotFormat::Binary).unwrap();
        header[4..6].copy_from_slice(&7u16.to_le_bytes());
        assert!(matches!(
            Snapshot::from_bytes(&header, SnapshotFormat::Binary),
            Err(RosterError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempdir().unwrap();
        for format in [SnapshotFormat::Json, SnapshotFormat::Binary] {
            let path = dir.path().join(format!("roster.{}", format.extension()));
            sample().write_to(&path, format).unwrap();
            assert!(!path.with_extension("tmp").exists());

            let back = Snapshot::read_from(&path, None).unwrap();
            assert_eq!(back.students.records.len(), 2);
            assert_eq!(back.enrollments[0].score, Some(92.5));
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Json);
        assert_eq!("bin".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Binary);
        assert!("xml".parse::<SnapshotFormat>().is_err());
    }
}
