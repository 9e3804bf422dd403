//! Aggregate statistics over a record collection
//!
//! Numeric summaries skip records that lack the field (they are not
//! treated as zero). The median is the lower-middle element of the
//! sorted values, `sorted[(n - 1) / 2]`; the two central values of an
//! even count are never averaged.

use crate::storage::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Summary of a numeric field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub field: String,
    /// Records that define the field
    pub count: usize,
    pub mean: f64,
    /// Lower-middle element of the ascending values, index `(count - 1) / 2`
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericSummary {
    /// Summarize `values`; `None` when there are none
    pub fn from_values(field: impl Into<String>, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;

        Some(Self {
            field: field.into(),
            count,
            mean,
            median: sorted[(count - 1) / 2],
            min: sorted[0],
            max: sorted[count - 1],
        })
    }
}

/// Number of records sharing one value of a categorical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCount {
    pub value: Value,
    pub count: usize,
}

/// Statistics produced by `RecordIndex::aggregate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Total records in the collection
    pub count: usize,
    #[serde(default)]
    pub summary: Option<NumericSummary>,
    /// Field the groups were computed over
    #[serde(default)]
    pub group_field: Option<String>,
    /// Grouped counts, ordered by value
    #[serde(default)]
    pub groups: Vec<GroupCount>,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} records", self.count)?;
        if let Some(s) = &self.summary {
            write!(
                f,
                ", {}: n={} mean={:.2} median={:.2} min={:.2} max={:.2}",
                s.field, s.count, s.mean, s.median, s.min, s.max
            )?;
        }
        if let Some(field) = &self.group_field {
            write!(f, ", {} groups by {}", self.groups.len(), field)?;
        }
        Ok(())
    }
}

/// Ordering used for group output: bools, then numbers, then text
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

/// Count values by normalized key; the first spelling seen names the group
pub fn group_counts<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<GroupCount> {
    let mut slots: HashMap<_, usize> = HashMap::new();
    let mut groups: Vec<GroupCount> = Vec::new();

    for value in values {
        let Some(key) = value.index_key() else {
            continue;
        };
        match slots.get(&key) {
            Some(&slot) => groups[slot].count += 1,
            None => {
                slots.insert(key, groups.len());
                groups.push(GroupCount {
                    value: value.clone(),
                    count: 1,
                });
            }
        }
    }

    groups.sort_by(|a, b| compare_values(&a.value, &b.value));
    groups
}
