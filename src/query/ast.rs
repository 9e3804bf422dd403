//! Query Abstract Syntax Tree
//!
//! Defines the AST for the roster query language, a small SQL-like
//! language over the student and course collections.
//!
//! # Example Queries
//!
//! ```text
//! FROM students WHERE last_name = 'johnson'
//! FROM students WHERE gpa BETWEEN 3.6 AND 3.85
//! FROM students TOP 3 BY gpa
//! FROM courses WHERE department = 'Mathematics' LIMIT 2
//! ```

use crate::roster::Collection;
use crate::storage::Value;
use std::fmt;

/// A parsed query ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection to read from
    pub collection: Collection,
    /// How records are selected
    pub selector: Selector,
    /// Optional limit on results
    pub limit: Option<usize>,
}

impl Query {
    /// Start building a query over a collection
    pub fn from(collection: Collection) -> QueryBuilder {
        QueryBuilder::new(collection)
    }

    /// Query over students
    pub fn students() -> QueryBuilder {
        QueryBuilder::new(Collection::Students)
    }

    /// Query over courses
    pub fn courses() -> QueryBuilder {
        QueryBuilder::new(Collection::Courses)
    }
}

/// Record selection, one per index access path
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every record, in insertion order
    All,
    /// Direct id lookup
    Id(String),
    /// Case-insensitive exact match on a field
    Equals { field: String, value: Value },
    /// Case-insensitive substring match on any of the fields
    Contains { fields: Vec<String>, fragment: String },
    /// Inclusive numeric range, highest first
    Between { field: String, low: f64, high: f64 },
    /// The `k` largest values of a field, highest first
    Top { field: String, k: usize },
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => Ok(()),
            Selector::Id(id) => write!(f, " WHERE id = '{}'", id),
            Selector::Equals { field, value } => match value {
                Value::Text(s) => write!(f, " WHERE {} = '{}'", field, s),
                other => write!(f, " WHERE {} = {}", field, other),
            },
            Selector::Contains { fields, fragment } => {
                write!(f, " WHERE {} CONTAINS '{}'", fields.join(", "), fragment)
            }
            Selector::Between { field, low, high } => {
                write!(f, " WHERE {} BETWEEN {} AND {}", field, low, high)
            }
            Selector::Top { field, k } => write!(f, " TOP {} BY {}", k, field),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FROM {}{}", self.collection, self.selector)?;
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

/// Builder for constructing queries programmatically
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    collection: Collection,
    selector: Selector,
    limit: Option<usize>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            selector: Selector::All,
            limit: None,
        }
    }

    /// Select by id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.selector = Selector::Id(id.into());
        self
    }

    /// Select by exact field value
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.selector = Selector::Equals {
            field: field.into(),
            value: value.into(),
        };
        self
    }

    /// Select by substring over one or more fields
    pub fn contains(mut self, fields: &[&str], fragment: impl Into<String>) -> Self {
        self.selector = Selector::Contains {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            fragment: fragment.into(),
        };
        self
    }

    /// Select by inclusive numeric range
    pub fn between(mut self, field: impl Into<String>, low: f64, high: f64) -> Self {
        self.selector = Selector::Between {
            field: field.into(),
            low,
            high,
        };
        self
    }

    /// Select the top `k` by a numeric field
    pub fn top(mut self, k: usize, field: impl Into<String>) -> Self {
        self.selector = Selector::Top {
            field: field.into(),
            k,
        };
        self
    }

    /// Set result limit
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Build the final query
    pub fn build(self) -> Query {
        Query {
            collection: self.collection,
            selector: self.selector,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let query = Query::students().between("gpa", 3.6, 3.85).limit(5).build();
        assert_eq!(query.collection, Collection::Students);
        assert_eq!(
            query.selector,
            Selector::Between {
                field: "gpa".to_string(),
                low: 3.6,
                high: 3.85
            }
        );
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Query::students().build().to_string(), "FROM students");
        assert_eq!(
            Query::students().equals("last_name", "Johnson").build().to_string(),
            "FROM students WHERE last_name = 'Johnson'"
        );
        assert_eq!(
            Query::students().equals("grade_level", 11).build().to_string(),
            "FROM students WHERE grade_level = 11"
        );
        assert_eq!(
            Query::students()
                .contains(&["first_name", "last_name"], "ar")
                .build()
                .to_string(),
            "FROM students WHERE first_name, last_name CONTAINS 'ar'"
        );
        assert_eq!(
            Query::courses().top(3, "credits").limit(2).build().to_string(),
            "FROM courses TOP 3 BY credits LIMIT 2"
        );
    }
}
