//! The query descriptor: one unit of database work.

use simpledb_core::{Error, ObjectMapper, Result, Row, Value};
use std::fmt;
use std::sync::OnceLock;

/// Called with the result rows when a queued query succeeds.
pub type SuccessCallback = Box<dyn FnOnce(Vec<Row>) + Send>;

/// Called when a queued query fails to render or execute.
pub type FailureHandler = Box<dyn FnOnce(QueryFailure) + Send>;

/// Describes one database operation.
///
/// A query is either built from a command name, a table and ordered
/// `(column, value)` pairs, rendered later by a
/// [`BuilderRegistry`](crate::BuilderRegistry), or carries explicit SQL set
/// with [`Query::raw`] / [`Query::set_sql`], which bypasses the registry.
///
/// Rendering is memoized: the first rendered SQL sticks, and later
/// modifications of the pairs do not change it.
pub struct Query {
    command: String,
    table: String,
    values: Vec<(String, String)>,
    params: Vec<Value>,
    pub(crate) rendered: OnceLock<String>,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureHandler>,
}

impl Query {
    /// Create a query for `command` (e.g. "SELECT") against `table`.
    pub fn new(command: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            table: table.into(),
            values: Vec::new(),
            params: Vec::new(),
            rendered: OnceLock::new(),
            on_success: None,
            on_failure: None,
        }
    }

    /// Create a query carrying explicit SQL.
    pub fn raw(sql: impl Into<String>) -> Self {
        let mut query = Self::new("", "");
        query.set_sql(sql);
        query
    }

    /// Replace the SQL of this query; the builder registry is no longer used.
    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.rendered = OnceLock::from(sql.into());
    }

    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = command.into();
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        self.table = table.into();
    }

    /// Append a `(column, value)` pair.
    pub fn add_value(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.push((column.into(), value.into()));
    }

    /// Builder-style [`Query::add_value`].
    #[must_use]
    pub fn value(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_value(column, value);
        self
    }

    /// Append the members of `obj` selected by `groups`.
    pub fn add_values<T: 'static>(
        &mut self,
        mapper: &ObjectMapper<'_>,
        obj: &T,
        groups: &[i32],
    ) -> Result<()> {
        let pairs = mapper.extract_values(obj, groups)?;
        self.values.extend(pairs);
        Ok(())
    }

    /// Append the selected members of every object in order.
    pub fn add_values_all<T: 'static>(
        &mut self,
        mapper: &ObjectMapper<'_>,
        objs: &[T],
        groups: &[i32],
    ) -> Result<()> {
        for obj in objs {
            self.add_values(mapper, obj, groups)?;
        }
        Ok(())
    }

    /// Bind parameters for SQL containing `?` placeholders.
    #[must_use]
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Set the callback invoked with the result rows.
    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce(Vec<Row>) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Set the handler invoked when this query fails on the worker.
    #[must_use]
    pub fn on_failure(mut self, handler: impl FnOnce(QueryFailure) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(handler));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn values(&self) -> &[(String, String)] {
        &self.values
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// The SQL of this query if it is explicit or already rendered.
    pub fn sql(&self) -> Option<&str> {
        self.rendered.get().map(String::as_str)
    }

    pub fn has_callback(&self) -> bool {
        self.on_success.is_some()
    }

    pub fn take_on_success(&mut self) -> Option<SuccessCallback> {
        self.on_success.take()
    }

    pub fn take_on_failure(&mut self) -> Option<FailureHandler> {
        self.on_failure.take()
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("command", &self.command)
            .field("table", &self.table)
            .field("values", &self.values)
            .field("params", &self.params)
            .field("sql", &self.sql())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// A query that failed on the dispatch worker, with the reason.
#[derive(Debug)]
pub struct QueryFailure {
    pub query: Query,
    pub error: Error,
}

impl QueryFailure {
    pub fn new(query: Query, error: Error) -> Self {
        Self { query, error }
    }
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.query.sql() {
            Some(sql) => write!(f, "query '{}' failed: {}", sql, self.error),
            None => write!(
                f,
                "{} on '{}' failed: {}",
                self.query.command(),
                self.query.table(),
                self.error
            ),
        }
    }
}

impl std::error::Error for QueryFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
