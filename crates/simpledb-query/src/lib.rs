//! Query descriptors and SQL builders for SimpleDB.
//!
//! `simpledb-query` is the **query construction layer**. A [`Query`] names a
//! command, a table and ordered `(column, value)` pairs; the
//! [`BuilderRegistry`] turns it into SQL text through the builder registered
//! for its command.
//!
//! # Role In The Architecture
//!
//! - **Descriptors**: [`Query`] carries either explicit SQL or builder input,
//!   plus optional callbacks for the dispatch worker.
//! - **Builders**: plain functions registered by command name; the standard
//!   ones live in [`builders`].
//! - **Renderers**: [`render`] holds the list renderers builders reuse.
//!
//! The rendered SQL executes through the `Connection` trait from
//! `simpledb-core`, usually via the `simpledb` facade crate.

pub mod builder;
pub mod builders;
pub mod query;
pub mod render;

pub use builder::{BuilderFn, BuilderRegistry};
pub use query::{FailureHandler, Query, QueryFailure, SuccessCallback};
pub use render::{assignment_list, assignment_list_default, placeholder_list, value_list};

use simpledb_core::{Connection, Result, Row};

/// Create a [`Query`] from a command, a table and `column => value` pairs.
///
/// # Example
///
/// ```
/// use simpledb_query::query;
///
/// let q = query!("UPDATE", "users", "id" => 1, "name" => "bob");
/// assert_eq!(q.values().len(), 2);
/// assert_eq!(q.values()[0], ("id".to_string(), "1".to_string()));
/// ```
#[macro_export]
macro_rules! query {
    ($command:expr, $table:expr $(, $column:expr => $value:expr)* $(,)?) => {
        $crate::Query::new($command, $table)
            $(.value($column, ($value).to_string()))*
    };
}

/// Render `query` and run it as a row-producing statement.
pub fn run_query(conn: &dyn Connection, builders: &BuilderRegistry, query: &Query) -> Result<Vec<Row>> {
    let sql = builders.render(query)?;
    conn.query(sql, query.params())
}

/// Render `query` and run it, returning the affected row count.
pub fn run_statement(conn: &dyn Connection, builders: &BuilderRegistry, query: &Query) -> Result<u64> {
    let sql = builders.render(query)?;
    conn.execute(sql, query.params())
}
