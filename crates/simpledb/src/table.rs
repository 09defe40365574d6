//! Read helpers bound to one table.

use crate::manager::DatabaseManager;
use simpledb_core::{ColumnRef, FromValue, Result, Row, get_column, get_column_packed};
use simpledb_query::Query;
use std::fmt;

/// What a [`Table`] read runs: a prepared query, or a command name run
/// against the bound table with no pairs.
#[derive(Debug, Clone, Copy)]
pub enum QuerySource<'q> {
    Query(&'q Query),
    Command(&'q str),
}

impl<'q> From<&'q Query> for QuerySource<'q> {
    fn from(query: &'q Query) -> Self {
        QuerySource::Query(query)
    }
}

impl<'q> From<&'q str> for QuerySource<'q> {
    fn from(command: &'q str) -> Self {
        QuerySource::Command(command)
    }
}

/// A table name bound to a manager. Every read runs on the caller's thread.
///
/// ```no_run
/// use simpledb::{DatabaseInfo, DatabaseManager, Registry};
/// use std::sync::Arc;
///
/// let manager = DatabaseManager::connect(
///     DatabaseInfo::file("data", "app"),
///     Arc::new(Registry::with_standard_builders()),
/// )?;
/// let names: Vec<String> = manager.table("users").column("SELECT", "name")?;
/// # Ok::<(), simpledb::Error>(())
/// ```
pub struct Table<'m> {
    manager: &'m DatabaseManager,
    name: String,
}

impl<'m> Table<'m> {
    pub(crate) fn new(manager: &'m DatabaseManager, name: impl Into<String>) -> Self {
        Self {
            manager,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A query for `command` against this table, ready for pairs.
    pub fn query(&self, command: &str) -> Query {
        Query::new(command, self.name.as_str())
    }

    /// One column of every returned row as `T`.
    ///
    /// Rows whose value is NULL or of another kind are skipped.
    pub fn column<'q, T: FromValue>(
        &self,
        source: impl Into<QuerySource<'q>>,
        column: impl Into<ColumnRef>,
    ) -> Result<Vec<T>> {
        get_column(&self.fetch(source.into())?, column)
    }

    /// Like [`Table::column`], passing each value through `pack`.
    pub fn column_packed<'q, T, S, E, P>(
        &self,
        source: impl Into<QuerySource<'q>>,
        column: impl Into<ColumnRef>,
        pack: P,
    ) -> Result<Vec<S>>
    where
        T: FromValue,
        E: fmt::Display,
        P: FnMut(T) -> std::result::Result<S, E>,
    {
        get_column_packed(&self.fetch(source.into())?, column, pack)
    }

    /// One object per returned row, assigning the fields in `groups`.
    pub fn objects<'q, T: 'static>(
        &self,
        source: impl Into<QuerySource<'q>>,
        groups: &[i32],
    ) -> Result<Vec<T>> {
        let rows = self.fetch(source.into())?;
        self.manager.mapper().get_database_objects(&rows, groups)
    }

    /// One object per returned row, built through its row constructor.
    pub fn objects_from_columns<'q, T: 'static>(
        &self,
        source: impl Into<QuerySource<'q>>,
    ) -> Result<Vec<T>> {
        let rows = self.fetch(source.into())?;
        self.manager.mapper().get_from_result_set(&rows)
    }

    /// Run `command` with the members of `template` in `groups` as pairs,
    /// and build an object from the first returned row.
    pub fn object<T: 'static>(&self, template: &T, command: &str, groups: &[i32]) -> Result<Option<T>> {
        let mapper = self.manager.mapper();
        let mut query = self.query(command);
        query.add_values(&mapper, template, groups)?;
        let rows = self.manager.execute_query(&query)?;
        mapper.get_database_object(&rows, groups)
    }

    fn fetch(&self, source: QuerySource<'_>) -> Result<Vec<Row>> {
        match source {
            QuerySource::Query(query) => self.manager.execute_query(query),
            QuerySource::Command(command) => self.manager.execute_query(&self.query(command)),
        }
    }
}

impl fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("name", &self.name).finish_non_exhaustive()
    }
}
