//! Query Executor
//!
//! Executes Query AST against a Roster, picking the index access path
//! for each selector:
//!
//! ```text
//! Id        → primary map
//! Equals    → secondary index (scan when the field has none)
//! Contains  → scan
//! Between   → ordered index, highest first
//! Top       → ordered index, highest first
//! ```
//!
//! An unknown id yields an empty result, not an error.

use crate::index::RecordIndex;
use crate::query::ast::*;
use crate::query::error::QueryResult;
use crate::roster::{Collection, Roster};
use crate::storage::{tabular, Record};
use std::time::Instant;

/// Result of a query execution
#[derive(Debug, Clone)]
pub struct QueryOutput<'a> {
    /// Collection the records came from
    pub collection: Collection,
    /// Matching records, in result order
    pub records: Vec<&'a Record>,
    /// Execution time in microseconds
    pub execution_time_us: u64,
    schema_columns: Vec<String>,
}

impl<'a> QueryOutput<'a> {
    /// Get the number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names: id, declared fields, then any extra field present
    pub fn columns(&self) -> &[String] {
        &self.schema_columns
    }

    /// Ids of the matching records
    pub fn ids(&self) -> Vec<&'a str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }
}

/// Query executor
pub struct QueryExecutor<'a> {
    roster: &'a Roster,
}

impl<'a> QueryExecutor<'a> {
    /// Create a new query executor
    pub fn new(roster: &'a Roster) -> Self {
        Self { roster }
    }

    /// Execute a query string (parses and executes)
    pub fn execute_str(&self, query_str: &str) -> QueryResult<QueryOutput<'a>> {
        let query = crate::query::parser::parse_query(query_str)?;
        self.execute(&query)
    }

    /// Execute a parsed query
    pub fn execute(&self, query: &Query) -> QueryResult<QueryOutput<'a>> {
        let start = Instant::now();
        let index = self.roster.collection(query.collection);

        let mut records = select(index, &query.selector);
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }

        let execution_time_us = start.elapsed().as_micros() as u64;
        tracing::debug!(
            query = %query,
            results = records.len(),
            elapsed_us = execution_time_us,
            "Executed query"
        );

        Ok(QueryOutput {
            collection: query.collection,
            schema_columns: tabular::columns(index.schema(), records.iter().copied()),
            records,
            execution_time_us,
        })
    }
}

fn select<'a>(index: &'a RecordIndex, selector: &Selector) -> Vec<&'a Record> {
    match selector {
        Selector::All => index.records().iter().collect(),
        Selector::Id(id) => index.find_by_id(id).into_iter().collect(),
        Selector::Equals { field, value } => index.get_by_exact_field(field, value),
        Selector::Contains { fields, fragment } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            index.get_by_substring_any(&fields, fragment)
        }
        Selector::Between { field, low, high } => index.get_by_range(field, *low, *high),
        Selector::Top { field, k } => index.get_top_k(field, *k),
    }
}
