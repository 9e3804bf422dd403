//! Core data types for the record store
//!
//! This module defines the fundamental types used throughout the crate:
//! - `Record`: a uniquely identified set of named scalar fields
//! - `Value`: a single scalar field value (possibly null)
//! - `IndexSchema` / `FieldSpec`: what a collection's fields look like and how they are indexed
//! - `Enrollment`: a relationship linking a student to a course

use crate::storage::error::{RosterError, RosterResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier of a record within its collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A scalar field value
///
/// Human-readable formats (JSON, TOML) see a plain scalar; binary formats
/// get an explicitly tagged variant. `Null` marks an optional field that
/// is absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Serialize)]
enum TaggedValueRef<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(&'a str),
}

#[derive(Deserialize)]
enum TaggedValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlainValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                Value::Null => serializer.serialize_unit(),
                Value::Bool(b) => serializer.serialize_bool(*b),
                Value::Integer(i) => serializer.serialize_i64(*i),
                Value::Float(f) => serializer.serialize_f64(*f),
                Value::Text(s) => serializer.serialize_str(s),
            }
        } else {
            let tagged = match self {
                Value::Null => TaggedValueRef::Null,
                Value::Bool(b) => TaggedValueRef::Bool(*b),
                Value::Integer(i) => TaggedValueRef::Integer(*i),
                Value::Float(f) => TaggedValueRef::Float(*f),
                Value::Text(s) => TaggedValueRef::Text(s),
            };
            tagged.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            Ok(match PlainValue::deserialize(deserializer)? {
                PlainValue::Null => Value::Null,
                PlainValue::Bool(b) => Value::Bool(b),
                PlainValue::Integer(i) => Value::Integer(i),
                PlainValue::Float(f) => Value::Float(f),
                PlainValue::Text(s) => Value::Text(s),
            })
        } else {
            Ok(match TaggedValue::deserialize(deserializer)? {
                TaggedValue::Null => Value::Null,
                TaggedValue::Bool(b) => Value::Bool(b),
                TaggedValue::Integer(i) => Value::Integer(i),
                TaggedValue::Float(f) => Value::Float(f),
                TaggedValue::Text(s) => Value::Text(s),
            })
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value (integers widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the variant, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }

    /// Normalized key used by secondary indexes and exact matching.
    ///
    /// Text is case-folded; integral floats share a key with the equal
    /// integer. Null has no key and is never indexed.
    pub fn index_key(&self) -> Option<IndexKey> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Integer(i) => Some(IndexKey::Int(*i)),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some(IndexKey::Int(*f as i64))
                } else {
                    Some(IndexKey::Float(f.to_bits()))
                }
            }
            Value::Text(s) => Some(IndexKey::Text(s.to_lowercase())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Normalized form of a value, as stored in secondary indexes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

/// A uniquely identified entity with named fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key, never changes once inserted
    pub id: RecordId,
    /// Field name → value
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder method: set a field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Get a field value; absent and null fields both yield `None`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }
}

/// Scalar type a declared field must hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Integer,
    /// Floats; integers are accepted and compared numerically
    Float,
    Bool,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Bool => write!(f, "bool"),
        }
    }
}

/// How a declared field is indexed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldIndex {
    /// No index; queries on the field are served by a linear scan
    #[default]
    Scan,
    /// Secondary index (value → ids) for exact matches
    Exact,
    /// Sorted (value, id) index for range and top-k queries
    Ordered,
}

/// Declaration of one named field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// No two records may share a (normalized) value of this field
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: FieldIndex,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            index: FieldIndex::Scan,
            min_value: None,
            max_value: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// Builder method: field must be present and non-null
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder method: enforce uniqueness (implies an exact index)
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Builder method: maintain a secondary index
    pub fn exact(mut self) -> Self {
        self.index = FieldIndex::Exact;
        self
    }

    /// Builder method: maintain an ordered index
    pub fn ordered(mut self) -> Self {
        self.index = FieldIndex::Ordered;
        self
    }

    /// Builder method: set valid numeric range (inclusive)
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    /// Check a single value against this declaration
    pub fn check(&self, value: Option<&Value>) -> RosterResult<()> {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ if self.required => {
                return Err(RosterError::invalid(&self.name, "required field is missing"))
            }
            _ => return Ok(()),
        };

        let type_ok = matches!(
            (self.kind, value),
            (FieldKind::Text, Value::Text(_))
                | (FieldKind::Integer, Value::Integer(_))
                | (FieldKind::Float, Value::Float(_))
                | (FieldKind::Float, Value::Integer(_))
                | (FieldKind::Bool, Value::Bool(_))
        );
        if !type_ok {
            return Err(RosterError::invalid(
                &self.name,
                format!("expected {}, got {} '{}'", self.kind, value.kind_name(), value),
            ));
        }

        if let Some(n) = value.as_f64() {
            if !n.is_finite() {
                return Err(RosterError::invalid(&self.name, "value must be finite"));
            }
            if let Some(min) = self.min_value {
                if n < min {
                    return Err(RosterError::invalid(
                        &self.name,
                        format!("{} is below minimum {}", n, min),
                    ));
                }
            }
            if let Some(max) = self.max_value {
                if n > max {
                    return Err(RosterError::invalid(
                        &self.name,
                        format!("{} is above maximum {}", n, max),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Field declarations and index layout of one collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSchema {
    /// Collection name, used in errors and snapshots
    pub collection: String,
    /// Column name the id is exported under
    pub id_field: String,
    pub fields: Vec<FieldSpec>,
    /// Numeric field summarized by `aggregate()`
    #[serde(default)]
    pub summary_field: Option<String>,
    /// Categorical field counted by `aggregate()`
    #[serde(default)]
    pub group_field: Option<String>,
}

impl IndexSchema {
    pub fn new(collection: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id_field: id_field.into(),
            fields: Vec::new(),
            summary_field: None,
            group_field: None,
        }
    }

    /// Builder method: declare a field
    pub fn with_field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Builder method: fields used by `aggregate()`
    pub fn with_summary(mut self, numeric: &str, group: &str) -> Self {
        self.summary_field = Some(numeric.to_string());
        self.group_field = Some(group.to_string());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check the schema itself is coherent
    pub fn check(&self) -> RosterResult<()> {
        for (i, spec) in self.fields.iter().enumerate() {
            if spec.name == self.id_field {
                return Err(RosterError::invalid(
                    &spec.name,
                    "field name collides with the id column",
                ));
            }
            if self.fields[..i].iter().any(|f| f.name == spec.name) {
                return Err(RosterError::invalid(&spec.name, "field declared twice"));
            }
            if spec.index == FieldIndex::Ordered
                && !matches!(spec.kind, FieldKind::Integer | FieldKind::Float)
            {
                return Err(RosterError::invalid(
                    &spec.name,
                    "ordered index requires a numeric field",
                ));
            }
        }
        Ok(())
    }

    /// Validate a record against the declared fields
    pub fn validate(&self, record: &Record) -> RosterResult<()> {
        if record.id.as_str().trim().is_empty() {
            return Err(RosterError::invalid(&self.id_field, "id must not be empty"));
        }
        if record.fields.contains_key(&self.id_field) {
            return Err(RosterError::invalid(
                &self.id_field,
                "id must not be repeated as a field",
            ));
        }

        for spec in &self.fields {
            spec.check(record.fields.get(&spec.name))?;
        }

        // Undeclared fields are kept as-is, but never as NaN/inf
        for (name, value) in &record.fields {
            if let Value::Float(f) = value {
                if !f.is_finite() {
                    return Err(RosterError::invalid(name, "value must be finite"));
                }
            }
        }

        Ok(())
    }
}

/// A relationship linking a student to a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enrollment {
    pub student_id: RecordId,
    pub course_code: RecordId,
    /// Session label, e.g. "Fall 2024"
    pub semester: String,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(
        student_id: impl Into<RecordId>,
        course_code: impl Into<RecordId>,
        semester: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            course_code: course_code.into(),
            semester: semester.into(),
            grade: None,
            score: None,
            enrolled_at: Utc::now(),
        }
    }

    /// Builder method: set letter grade
    pub fn grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    /// Builder method: set numeric score
    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_json_is_plain_scalar() {
        let record = Record::new("S001")
            .field("last_name", "Johnson")
            .field("grade_level", 10)
            .field("gpa", 3.8)
            .field("phone", Option::<String>::None);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "S001");
        assert_eq!(json["fields"]["last_name"], "Johnson");
        assert_eq!(json["fields"]["grade_level"], 10);
        assert_eq!(json["fields"]["gpa"], 3.8);
        assert!(json["fields"]["phone"].is_null());

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_integral_float_stays_float() {
        let record = Record::new("S002").field("gpa", 4.0);
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fields["gpa"], Value::Float(4.0));
    }

    #[test]
    fn test_value_binary_roundtrip() {
        let record = Record::new("S001")
            .field("last_name", "Johnson")
            .field("grade_level", 10)
            .field("gpa", 4.0)
            .field("active", true)
            .field("phone", Value::Null);

        let bytes = bincode::serialize(&record).unwrap();
        let back: Record = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.fields["gpa"], Value::Float(4.0));
    }

    #[test]
    fn test_index_key_normalization() {
        assert_eq!(
            Value::from("Johnson").index_key(),
            Value::from("JOHNSON").index_key()
        );
        assert_eq!(Value::from(11).index_key(), Value::from(11.0).index_key());
        assert_ne!(Value::from(3.5).index_key(), Value::from(3).index_key());
        assert!(Value::Null.index_key().is_none());
    }

    #[test]
    fn test_get_treats_null_as_absent() {
        let record = Record::new("S001").field("email", Value::Null);
        assert!(record.get("email").is_none());
        assert!(record.get("missing").is_none());
        assert!(record.fields.contains_key("email"));
    }

    fn student_schema() -> IndexSchema {
        IndexSchema::new("students", "student_id")
            .with_field(FieldSpec::text("last_name").required().exact())
            .with_field(FieldSpec::integer("grade_level").exact())
            .with_field(FieldSpec::float("gpa").ordered().range(0.0, 4.0))
    }

    #[test]
    fn test_validate_accepts_well_formed_record() {
        let schema = student_schema();
        let record = Record::new("S001")
            .field("last_name", "Lee")
            .field("grade_level", 12)
            .field("gpa", 4);
        assert!(schema.validate(&record).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let schema = student_schema();

        let missing = Record::new("S001").field("gpa", 3.0);
        assert!(matches!(
            schema.validate(&missing),
            Err(RosterError::InvalidInput { field, .. }) if field == "last_name"
        ));

        let wrong_type = Record::new("S001")
            .field("last_name", "Lee")
            .field("gpa", "excellent");
        assert!(matches!(
            schema.validate(&wrong_type),
            Err(RosterError::InvalidInput { field, .. }) if field == "gpa"
        ));

        let out_of_range = Record::new("S001")
            .field("last_name", "Lee")
            .field("gpa", 4.5);
        assert!(schema.validate(&out_of_range).is_err());

        let nan = Record::new("S001")
            .field("last_name", "Lee")
            .field("gpa", f64::NAN);
        assert!(schema.validate(&nan).is_err());

        let float_grade = Record::new("S001")
            .field("last_name", "Lee")
            .field("grade_level", 10.0);
        assert!(schema.validate(&float_grade).is_err());

        let empty_id = Record::new("  ").field("last_name", "Lee");
        assert!(schema.validate(&empty_id).is_err());
    }

    #[test]
    fn test_schema_check() {
        assert!(student_schema().check().is_ok());

        let bad = IndexSchema::new("students", "id").with_field(FieldSpec::text("name").ordered());
        assert!(bad.check().is_err());

        let clash = IndexSchema::new("students", "id").with_field(FieldSpec::text("id"));
        assert!(clash.check().is_err());
    }
}
