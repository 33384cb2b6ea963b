//! Declarative pattern-matching query engine for the embeddable graph
//! database: a small `MATCH ... WHERE ... RETURN ...` / `CREATE ...`
//! language over `graphdb_api::GraphBackend`.
//!
//! ```ignore
//! use graphdb_query::run;
//!
//! let result = run("MATCH (n:User) WHERE n.age > 30 RETURN n.name", &backend, &writer)?;
//! for row in &result.rows {
//!     println!("{row:?}");
//! }
//! ```

pub mod ast;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;

pub use error::{QueryError, Result};
pub use executor::QueryResult;

use graphdb_api::{GraphBackend, GraphWriter};

/// Parses and runs a single query string end to end.
pub fn run(text: &str, backend: &dyn GraphBackend, writer: &dyn GraphWriter) -> Result<QueryResult> {
    let query = parser::parse(text)?;
    executor::execute(&query, backend, writer)
}

/// Parses a query string into its AST without running it.
pub fn parse(text: &str) -> Result<ast::Query> {
    parser::parse(text)
}
