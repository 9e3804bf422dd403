//! Rollcall Query Engine
//!
//! Provides a small SQL-like query language over a roster:
//!
//! - **AST**: Query abstract syntax tree types
//! - **Parser**: Parse query strings into AST
//! - **Executor**: Execute queries against a `Roster`
//!
//! # Query Language
//!
//! ```text
//! FROM students|courses
//! [WHERE id = '..' | field = value | fields CONTAINS '..' | field BETWEEN a AND b]
//! [TOP k BY field]
//! [LIMIT n]
//! ```
//!
//! # Examples
//!
//! ## Using Query Builder
//!
//! ```rust,ignore
//! use rollcall::query::{Query, QueryExecutor};
//!
//! let query = Query::students().top(3, "gpa").build();
//! let output = QueryExecutor::new(&roster).execute(&query)?;
//! ```
//!
//! ## Using Query String
//!
//! ```rust,ignore
//! let output = QueryExecutor::new(&roster)
//!     .execute_str("FROM students WHERE gpa BETWEEN 3.6 AND 3.85")?;
//! ```

mod ast;
mod error;
mod executor;
mod parser;

pub use ast::{Query, QueryBuilder, Selector};
pub use error::{QueryError, QueryResult};
pub use executor::{QueryExecutor, QueryOutput};
pub use parser::parse_query;
