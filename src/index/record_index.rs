//! Record Index - A keyed record collection and all of its indexes
//!
//! Coordinates:
//! - the primary collection (id → record, insertion ordered)
//! - SecondaryIndex per `Exact`/`unique` field (value → ids)
//! - OrderedIndex per `Ordered` field (sorted (value, id) pairs)
//!
//! # Query Paths
//!
//! ```text
//! get_by_id            → primary map                 O(1)
//! get_by_exact_field   → SecondaryIndex, else scan   O(1) / O(n)
//! get_by_substring     → scan                        O(n)
//! get_by_range         → OrderedIndex, else scan     O(log n + k) / O(n log n)
//! get_top_k            → OrderedIndex, else scan     O(k) / O(n log n)
//! ```
//!
//! The collection is append-only: records are never updated or removed,
//! so the indexes only ever grow alongside the primary collection.

use crate::index::stats::{group_counts, NumericSummary, Statistics};
use crate::index::{IndexStats, OrderedIndex, SecondaryIndex};
use crate::storage::tabular;
use crate::storage::{FieldIndex, IndexSchema, Record, RecordId, RosterError, RosterResult, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;

/// A uniquely keyed record collection with secondary and ordered indexes
#[derive(Debug, Clone)]
pub struct RecordIndex {
    schema: IndexSchema,
    /// Records in insertion order
    records: Vec<Record>,
    /// id → position in `records`
    positions: HashMap<RecordId, usize>,
    /// field → inverted index
    secondary: HashMap<String, SecondaryIndex>,
    /// field → sorted index
    ordered: HashMap<String, OrderedIndex>,
}

impl RecordIndex {
    /// Create an empty index for `schema`
    pub fn new(schema: IndexSchema) -> RosterResult<Self> {
        schema.check()?;

        let mut secondary = HashMap::new();
        let mut ordered = HashMap::new();

        for spec in &schema.fields {
            if spec.unique {
                secondary.insert(spec.name.clone(), SecondaryIndex::unique());
            } else if spec.index == FieldIndex::Exact {
                secondary.insert(spec.name.clone(), SecondaryIndex::new());
            }
            if spec.index == FieldIndex::Ordered {
                ordered.insert(spec.name.clone(), OrderedIndex::new());
            }
        }

        Ok(Self {
            schema,
            records: Vec::new(),
            positions: HashMap::new(),
            secondary,
            ordered,
        })
    }

    /// Rebuild an index from records, e.g. when importing a snapshot
    ///
    /// Every record goes through `add`, so the result satisfies the same
    /// invariants as an index built incrementally. The first failure is
    /// reported with the collection and record it concerns.
    pub fn from_records(
        schema: IndexSchema,
        records: impl IntoIterator<Item = Record>,
    ) -> RosterResult<Self> {
        let mut index = Self::new(schema)?;
        for record in records {
            let id = record.id.to_string();
            index.insert(record).map_err(|e| RosterError::Snapshot {
                collection: index.schema.collection.clone(),
                record: Some(id),
                reason: e.to_string(),
            })?;
        }
        Ok(index)
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn collection(&self) -> &str {
        &self.schema.collection
    }

    // ==================== Insert ====================

    /// Insert a record and update every applicable index
    ///
    /// Fails with `InvalidInput` if the record does not match the schema and
    /// with `DuplicateKey` if its id or a unique field value is taken. All
    /// checks run before any mutation, so a failed insert changes nothing.
    pub fn add(&mut self, record: Record) -> RosterResult<()> {
        let id = record.id.clone();
        match self.insert(record) {
            Ok(()) => {
                tracing::debug!(collection = %self.schema.collection, id = %id, "Record added");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(collection = %self.schema.collection, id = %id, error = %e, "Record rejected");
                Err(e)
            }
        }
    }

    fn insert(&mut self, record: Record) -> RosterResult<()> {
        self.schema.validate(&record)?;

        if self.positions.contains_key(&record.id) {
            return Err(RosterError::duplicate(
                &self.schema.collection,
                &self.schema.id_field,
                record.id.as_str(),
            ));
        }

        for (field, index) in &self.secondary {
            if let Some(value) = record.get(field) {
                if index.conflicts(value) {
                    return Err(RosterError::duplicate(
                        &self.schema.collection,
                        field,
                        value.to_string(),
                    ));
                }
            }
        }

        // Checks passed: from here on nothing can fail
        for (field, index) in self.secondary.iter_mut() {
            if let Some(value) = record.get(field) {
                index.add(value, &record.id);
            }
        }
        for (field, index) in self.ordered.iter_mut() {
            if let Some(n) = record.number(field) {
                index.insert(n, record.id.clone());
            }
        }

        self.positions.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    // ==================== Query Methods ====================

    /// Direct lookup by id
    pub fn get_by_id(&self, id: &str) -> RosterResult<&Record> {
        self.find_by_id(id)
            .ok_or_else(|| RosterError::not_found(&self.schema.collection, id))
    }

    /// Direct lookup by id, `None` when absent
    pub fn find_by_id(&self, id: &str) -> Option<&Record> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Records whose `field` equals `value` after normalization
    ///
    /// Uses the field's secondary index when there is one and a linear scan
    /// otherwise. Returns an empty vector on no match.
    pub fn get_by_exact_field(&self, field: &str, value: &Value) -> Vec<&Record> {
        if let Some(index) = self.secondary.get(field) {
            return self.materialize(index.find(value).iter());
        }

        let Some(key) = value.index_key() else {
            return Vec::new();
        };
        self.records
            .iter()
            .filter(|r| {
                r.get(field)
                    .and_then(Value::index_key)
                    .map_or(false, |k| k == key)
            })
            .collect()
    }

    /// Records whose `field` contains `fragment`, case-insensitively (O(n))
    pub fn get_by_substring(&self, field: &str, fragment: &str) -> Vec<&Record> {
        self.get_by_substring_any(&[field], fragment)
    }

    /// Records where any of `fields` contains `fragment`, case-insensitively (O(n))
    pub fn get_by_substring_any(&self, fields: &[&str], fragment: &str) -> Vec<&Record> {
        let needle = fragment.to_lowercase();
        self.records
            .iter()
            .filter(|r| {
                fields.iter().any(|f| {
                    r.get(f)
                        .map_or(false, |v| v.to_string().to_lowercase().contains(&needle))
                })
            })
            .collect()
    }

    /// Records with `low <= field <= high`, highest value first
    ///
    /// Records lacking the field never match. An inverted or NaN range is
    /// empty.
    pub fn get_by_range(&self, field: &str, low: f64, high: f64) -> Vec<&Record> {
        if let Some(index) = self.ordered.get(field) {
            return self.materialize(index.range_desc(low, high).map(|e| &e.id));
        }

        if low.is_nan() || high.is_nan() || low > high {
            return Vec::new();
        }
        self.scan_descending(field)
            .into_iter()
            .filter(|(v, _)| *v >= low && *v <= high)
            .map(|(_, r)| r)
            .collect()
    }

    /// The `k` records with the largest `field`, highest first
    ///
    /// Returns all records defining the field when fewer than `k` exist.
    pub fn get_top_k(&self, field: &str, k: usize) -> Vec<&Record> {
        if let Some(index) = self.ordered.get(field) {
            return self.materialize(index.top_k(k).map(|e| &e.id));
        }

        self.scan_descending(field)
            .into_iter()
            .take(k)
            .map(|(_, r)| r)
            .collect()
    }

    /// Unindexed fallback: (value, record) sorted like a reversed ordered index
    fn scan_descending(&self, field: &str) -> Vec<(f64, &Record)> {
        let mut hits: Vec<(f64, usize)> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(pos, r)| r.number(field).map(|v| (v, pos)))
            .collect();

        hits.sort_by(|a, b| match b.0.partial_cmp(&a.0) {
            Some(Ordering::Equal) | None => b.1.cmp(&a.1),
            Some(ord) => ord,
        });

        hits.into_iter()
            .map(|(v, pos)| (v, &self.records[pos]))
            .collect()
    }

    fn materialize<'a>(&'a self, ids: impl Iterator<Item = &'a RecordId>) -> Vec<&'a Record> {
        ids.filter_map(|id| self.find_by_id(id.as_str())).collect()
    }

    // ==================== Aggregates ====================

    /// Statistics over the schema's summary and group fields
    pub fn aggregate(&self) -> Statistics {
        self.aggregate_by(
            self.schema.summary_field.as_deref(),
            self.schema.group_field.as_deref(),
        )
    }

    /// Statistics over arbitrary fields
    ///
    /// Records lacking the numeric field are excluded from the summary,
    /// not counted as zero.
    pub fn aggregate_by(&self, numeric: Option<&str>, group: Option<&str>) -> Statistics {
        let summary = numeric.and_then(|field| {
            let values: Vec<f64> = self.records.iter().filter_map(|r| r.number(field)).collect();
            NumericSummary::from_values(field, &values)
        });

        let groups = group
            .map(|field| group_counts(self.records.iter().filter_map(|r| r.get(field))))
            .unwrap_or_default();

        Statistics {
            count: self.records.len(),
            summary,
            group_field: group.map(str::to_string),
            groups,
        }
    }

    // ==================== Export ====================

    /// Write every record as CSV; returns the number of rows written
    pub fn export_csv<W: Write>(&self, writer: W, null_marker: &str) -> RosterResult<usize> {
        let rows = tabular::write_records(&self.schema, &self.records, writer, null_marker)?;
        tracing::info!(collection = %self.schema.collection, rows, "Exported CSV");
        Ok(rows)
    }

    /// All records, in insertion order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ==================== Stats Methods ====================

    /// Get statistics about the indexes
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            records: self.records.len(),
            secondary_indexes: self.secondary.len(),
            ordered_indexes: self.ordered.len(),
            secondary_keys: self.secondary.values().map(|i| i.key_count()).sum(),
            ordered_entries: self.ordered.values().map(|i| i.len()).sum(),
        }
    }

    /// Check that every index agrees with the primary collection
    pub fn is_consistent(&self) -> bool {
        let secondary_ok = self.secondary.iter().all(|(field, index)| {
            let expected: usize = self
                .records
                .iter()
                .filter(|r| r.get(field).is_some())
                .count();
            index.entry_count() == expected
                && self.records.iter().all(|r| match r.get(field) {
                    Some(v) => index.find(v).contains(&r.id),
                    None => true,
                })
        });

        let ordered_ok = self.ordered.iter().all(|(field, index)| {
            let expected = self.records.iter().filter(|r| r.number(field).is_some()).count();
            index.is_sorted()
                && index.len() == expected
                && index.entries().iter().all(|e| {
                    self.find_by_id(e.id.as_str()).and_then(|r| r.number(field)) == Some(e.value)
                })
        });

        let primary_ok = self.positions.len() == self.records.len()
            && self
                .records
                .iter()
                .enumerate()
                .all(|(pos, r)| self.positions.get(&r.id) == Some(&pos));

        primary_ok && secondary_ok && ordered_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FieldSpec;
    use proptest::prelude::*;

    fn schema() -> IndexSchema {
        IndexSchema::new("students", "student_id")
            .with_field(FieldSpec::text("first_name").required())
            .with_field(FieldSpec::text("last_name").required().exact())
            .with_field(FieldSpec::text("email").unique())
            .with_field(FieldSpec::integer("grade_level").exact())
            .with_field(FieldSpec::float("gpa").ordered().range(0.0, 4.0))
            .with_summary("gpa", "grade_level")
    }

    fn student(id: &str, first: &str, last: &str, gpa: f64) -> Record {
        Record::new(id)
            .field("first_name", first)
            .field("last_name", last)
            .field("gpa", gpa)
    }

    fn ids(records: &[&Record]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    fn sample() -> RecordIndex {
        let mut index = RecordIndex::new(schema()).unwrap();
        index.add(student("A", "Alice", "Johnson", 3.8).field("grade_level", 10)).unwrap();
        index.add(student("B", "Bob", "Smith", 3.5).field("grade_level", 10)).unwrap();
        index.add(student("C", "Charlie", "Brown", 3.9).field("grade_level", 11)).unwrap();
        index.add(student("D", "Diana", "Martinez", 3.7).field("grade_level", 11)).unwrap();
        index
    }

    #[test]
    fn test_get_by_id_after_insert() {
        let index = sample();
        let record = index.get_by_id("C").unwrap();
        assert_eq!(record.text("first_name"), Some("Charlie"));
        assert!(index.get_by_id("Z").unwrap_err().is_not_found());
        assert!(index.find_by_id("Z").is_none());
        assert!(index.is_consistent());
    }

    #[test]
    fn test_top_k_and_range_scenario() {
        let index = sample();
        assert_eq!(ids(&index.get_top_k("gpa", 2)), vec!["C", "A"]);
        assert_eq!(ids(&index.get_by_range("gpa", 3.6, 3.85)), vec!["A", "D"]);
        assert_eq!(ids(&index.get_top_k("gpa", 10)), vec!["C", "A", "D", "B"]);
        assert!(index.get_top_k("gpa", 0).is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected_without_state_change() {
        let mut index = sample();
        let before = index.stats();

        let err = index.add(student("A", "Other", "Person", 2.0)).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(index.len(), 4);
        assert_eq!(index.stats(), before);
        assert!(index.get_by_exact_field("last_name", &Value::from("Person")).is_empty());
    }

    #[test]
    fn test_duplicate_unique_field_rejected() {
        let mut index = RecordIndex::new(schema()).unwrap();
        index.add(student("S1", "X", "Y", 3.0).field("email", "x@y.com")).unwrap();

        let err = index
            .add(student("S2", "Z", "W", 3.1).field("email", "x@y.com"))
            .unwrap_err();
        assert!(matches!(err, RosterError::DuplicateKey { ref field, .. } if field == "email"));
        assert_eq!(index.len(), 1);
        assert!(index.get_top_k("gpa", 5).len() == 1);
        assert!(index.is_consistent());

        // Records without an email never collide
        index.add(student("S3", "A", "B", 2.0)).unwrap();
        index.add(student("S4", "C", "D", 2.0)).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_invalid_input_rejected() {
        let mut index = RecordIndex::new(schema()).unwrap();
        let bad = Record::new("S1")
            .field("first_name", "A")
            .field("last_name", "B")
            .field("gpa", "four");
        assert!(matches!(
            index.add(bad),
            Err(RosterError::InvalidInput { .. })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_exact_field_indexed_and_scanned() {
        let index = sample();

        let johnsons = index.get_by_exact_field("last_name", &Value::from("JOHNSON"));
        assert_eq!(ids(&johnsons), vec!["A"]);

        let grade_11 = index.get_by_exact_field("grade_level", &Value::from(11));
        assert_eq!(ids(&grade_11), vec!["C", "D"]);

        // first_name has no index: scan with the same normalization
        let bobs = index.get_by_exact_field("first_name", &Value::from("bob"));
        assert_eq!(ids(&bobs), vec!["B"]);

        assert!(index.get_by_exact_field("last_name", &Value::from("Nobody")).is_empty());
        assert!(index.get_by_exact_field("no_such_field", &Value::from("x")).is_empty());
        assert!(index.get_by_exact_field("first_name", &Value::Null).is_empty());
    }

    #[test]
    fn test_empty_index_queries_return_empty() {
        let index = RecordIndex::new(schema()).unwrap();
        assert!(index.get_by_exact_field("last_name", &Value::from("Smith")).is_empty());
        assert!(index.get_by_substring("first_name", "a").is_empty());
        assert!(index.get_by_range("gpa", 0.0, 4.0).is_empty());
        assert!(index.get_top_k("gpa", 3).is_empty());
        assert_eq!(index.aggregate().count, 0);
        assert!(index.aggregate().summary.is_none());
    }

    #[test]
    fn test_substring_scan() {
        let index = sample();
        let hits = index.get_by_substring_any(&["first_name", "last_name"], "AR");
        assert_eq!(ids(&hits), vec!["C", "D"]);

        assert_eq!(ids(&index.get_by_substring("last_name", "son")), vec!["A"]);
        assert!(index.get_by_substring("first_name", "zz").is_empty());
    }

    #[test]
    fn test_unindexed_range_matches_indexed_order() {
        let plain = IndexSchema::new("scores", "id").with_field(FieldSpec::float("score"));
        let mut scan = RecordIndex::new(plain).unwrap();
        let ordered = IndexSchema::new("scores", "id").with_field(FieldSpec::float("score").ordered());
        let mut indexed = RecordIndex::new(ordered).unwrap();

        for (id, score) in [("a", 90.0), ("b", 85.0), ("c", 90.0), ("d", 70.0)] {
            scan.add(Record::new(id).field("score", score)).unwrap();
            indexed.add(Record::new(id).field("score", score)).unwrap();
        }

        assert_eq!(
            ids(&scan.get_by_range("score", 80.0, 95.0)),
            ids(&indexed.get_by_range("score", 80.0, 95.0))
        );
        assert_eq!(ids(&scan.get_top_k("score", 3)), ids(&indexed.get_top_k("score", 3)));
        assert_eq!(ids(&scan.get_top_k("score", 3)), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_aggregate_excludes_missing_values() {
        let mut index = sample();
        index.add(Record::new("E").field("first_name", "Eve").field("last_name", "J")).unwrap();

        let stats = index.aggregate();
        assert_eq!(stats.count, 5);

        let summary = stats.summary.unwrap();
        assert_eq!(summary.count, 4);
        // sorted: 3.5 3.7 3.8 3.9 -> lower-middle
        assert_eq!(summary.median, 3.7);
        assert!((summary.mean - 3.725).abs() < 1e-9);

        assert_eq!(stats.group_field.as_deref(), Some("grade_level"));
        let counts: Vec<(Value, usize)> =
            stats.groups.into_iter().map(|g| (g.value, g.count)).collect();
        assert_eq!(counts, vec![(Value::from(10), 2), (Value::from(11), 2)]);
    }

    #[test]
    fn test_from_records_reports_offending_record() {
        let records = vec![
            student("S1", "A", "B", 3.0),
            student("S1", "C", "D", 3.0),
        ];
        let err = RecordIndex::from_records(schema(), records).unwrap_err();
        match err {
            RosterError::Snapshot { collection, record, .. } => {
                assert_eq!(collection, "students");
                assert_eq!(record.as_deref(), Some("S1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_export_csv_union_columns() {
        let mut index = RecordIndex::new(schema()).unwrap();
        index.add(student("S1", "A", "B", 3.0)).unwrap();
        index.add(student("S2", "C", "D", 3.2).field("club", "chess")).unwrap();

        let mut out = Vec::new();
        assert_eq!(index.export_csv(&mut out, "NULL").unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "student_id,first_name,last_name,email,grade_level,gpa,club");
        assert!(text.contains("S1,A,B,NULL,NULL,3,NULL"));
    }

    // ==================== Properties ====================

    fn arb_gpas() -> impl Strategy<Value = Vec<Option<f64>>> {
        prop::collection::vec(
            prop::option::weighted(0.85, (0u32..=40).prop_map(|n| n as f64 / 10.0)),
            0..60,
        )
    }

    fn build(gpas: &[Option<f64>]) -> RecordIndex {
        let mut index = RecordIndex::new(schema()).unwrap();
        for (i, gpa) in gpas.iter().enumerate() {
            let record = Record::new(format!("S{:03}", i))
                .field("first_name", "F")
                .field("last_name", "L")
                .field("gpa", *gpa);
            index.add(record).unwrap();
        }
        index
    }

    proptest! {
        #[test]
        fn prop_range_matches_linear_filter(gpas in arb_gpas(), lo in 0u32..=40, span in 0u32..=20) {
            let index = build(&gpas);
            let (low, high) = (lo as f64 / 10.0, (lo + span) as f64 / 10.0);

            let got = index.get_by_range("gpa", low, high);
            let mut got_ids = ids(&got);

            let mut expected: Vec<String> = index
                .records()
                .iter()
                .filter(|r| r.number("gpa").map_or(false, |g| g >= low && g <= high))
                .map(|r| r.id.to_string())
                .collect();

            // descending by value
            prop_assert!(got.windows(2).all(|w| w[0].number("gpa") >= w[1].number("gpa")));

            got_ids.sort();
            expected.sort();
            prop_assert_eq!(got_ids, expected);
        }

        #[test]
        fn prop_top_k_matches_sorted_truncation(gpas in arb_gpas(), k in 0usize..80) {
            let index = build(&gpas);
            let got = index.get_top_k("gpa", k);

            let mut values: Vec<f64> = index.records().iter().filter_map(|r| r.number("gpa")).collect();
            values.sort_by(|a, b| b.total_cmp(a));
            values.truncate(k);

            let got_values: Vec<f64> = got.iter().filter_map(|r| r.number("gpa")).collect();
            prop_assert_eq!(got_values, values);
        }

        #[test]
        fn prop_indexes_stay_consistent(gpas in arb_gpas()) {
            let index = build(&gpas);
            prop_assert!(index.is_consistent());
            for record in index.records() {
                prop_assert_eq!(index.get_by_id(record.id.as_str()).unwrap(), record);
            }
        }
    }
}
