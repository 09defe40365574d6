//! The command-name to SQL builder registry.

use crate::builders;
use crate::query::Query;
use simpledb_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Turns a table name and ordered `(column, value)` pairs into SQL text.
pub type BuilderFn = Arc<dyn Fn(&str, &[(String, String)]) -> Result<String> + Send + Sync>;

/// Maps command names such as `"SELECT"` to SQL builders.
///
/// Names are case-sensitive. Registering a name again replaces the previous
/// builder.
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: HashMap<String, BuilderFn>,
}

impl BuilderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `SELECT`, `INSERT`, `UPDATE` and `DELETE` registered.
    pub fn with_standard_builders() -> Self {
        let mut registry = Self::new();
        registry.register("SELECT", builders::select);
        registry.register("INSERT", builders::insert);
        registry.register_fallible("UPDATE", builders::update);
        registry.register("DELETE", builders::delete);
        registry
    }

    pub fn register<F>(&mut self, command: impl Into<String>, builder: F)
    where
        F: Fn(&str, &[(String, String)]) -> String + Send + Sync + 'static,
    {
        let wrapped = move |table: &str, pairs: &[(String, String)]| -> Result<String> {
            Ok(builder(table, pairs))
        };
        self.insert(command.into(), Arc::new(wrapped));
    }

    /// Register a builder that can reject its input.
    ///
    /// An error from the builder is returned by [`BuilderRegistry::render`]
    /// and nothing is stored on the query.
    pub fn register_fallible<F>(&mut self, command: impl Into<String>, builder: F)
    where
        F: Fn(&str, &[(String, String)]) -> Result<String> + Send + Sync + 'static,
    {
        self.insert(command.into(), Arc::new(builder));
    }

    fn insert(&mut self, command: String, builder: BuilderFn) {
        if self.builders.insert(command.clone(), builder).is_some() {
            tracing::debug!(%command, "query builder replaced");
        }
    }

    pub fn contains(&self, command: &str) -> bool {
        self.builders.contains_key(command)
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Produce the SQL for `query`.
    ///
    /// Explicit SQL is returned unchanged. Otherwise the builder registered
    /// for the query's command runs until it succeeds once; the result is
    /// stored on the query and returned by every later call.
    pub fn render<'q>(&self, query: &'q Query) -> Result<&'q str> {
        if let Some(sql) = query.rendered.get() {
            return Ok(sql);
        }
        let builder = self
            .builders
            .get(query.command())
            .ok_or_else(|| Error::UnknownCommand(query.command().to_string()))?;
        let built = builder(query.table(), query.values())?;
        let sql = query.rendered.get_or_init(|| built);
        tracing::trace!(command = query.command(), %sql, "query rendered");
        Ok(sql)
    }
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("commands", &self.commands())
            .finish()
    }
}
