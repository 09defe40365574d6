//! The configuration bundle shared by a manager and its worker.

use simpledb_core::{ConverterRegistry, DatabaseObject, ObjectMapper, SchemaRegistry};
use simpledb_query::{BuilderRegistry, QueryFailure};
use std::fmt;
use std::sync::Arc;

/// Handles failures of queued queries that carry no handler of their own.
pub type DefaultFailureHandler = Arc<dyn Fn(QueryFailure) + Send + Sync>;

/// Query builders, converters, object schemas and the default failure
/// handler.
///
/// Configure it mutably, then hand it to
/// [`DatabaseManager::connect`](crate::DatabaseManager::connect) as an
/// `Arc<Registry>`; it is read-only from then on.
///
/// ```
/// use simpledb::Registry;
///
/// let mut registry = Registry::with_standard_builders();
/// registry.register_builder("COUNT", |table: &str, _: &[(String, String)]| {
///     format!("SELECT COUNT(*) FROM {}", table)
/// });
/// assert!(registry.builders().contains("COUNT"));
/// assert!(registry.builders().contains("SELECT"));
/// ```
#[derive(Clone)]
pub struct Registry {
    builders: BuilderRegistry,
    converters: ConverterRegistry,
    schemas: SchemaRegistry,
    on_failure: DefaultFailureHandler,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// No builders, the built-in converters, no schemas, and a failure
    /// handler that logs.
    pub fn new() -> Self {
        Self {
            builders: BuilderRegistry::new(),
            converters: ConverterRegistry::new(),
            schemas: SchemaRegistry::new(),
            on_failure: Arc::new(log_failure),
        }
    }

    /// Like [`Registry::new`] with the SELECT, INSERT, UPDATE and DELETE
    /// builders registered.
    pub fn with_standard_builders() -> Self {
        Self {
            builders: BuilderRegistry::with_standard_builders(),
            ..Self::new()
        }
    }

    pub fn builders(&self) -> &BuilderRegistry {
        &self.builders
    }

    pub fn builders_mut(&mut self) -> &mut BuilderRegistry {
        &mut self.builders
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn converters_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.converters
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn schemas_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.schemas
    }

    /// Register the SQL builder for `command`, replacing any previous one.
    pub fn register_builder<F>(&mut self, command: impl Into<String>, builder: F)
    where
        F: Fn(&str, &[(String, String)]) -> String + Send + Sync + 'static,
    {
        self.builders.register(command, builder);
    }

    /// Register the descriptor table of `T`.
    pub fn register_object<T: DatabaseObject>(&mut self) {
        self.schemas.register::<T>();
    }

    /// Replace the handler used for failed queued queries without their own
    /// handler.
    pub fn set_default_failure_handler(
        &mut self,
        handler: impl Fn(QueryFailure) + Send + Sync + 'static,
    ) {
        self.on_failure = Arc::new(handler);
    }

    /// A mapper over this registry's schemas and converters.
    pub fn mapper(&self) -> ObjectMapper<'_> {
        ObjectMapper::new(&self.schemas, &self.converters)
    }

    pub(crate) fn report_failure(&self, failure: QueryFailure) {
        (self.on_failure)(failure);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("builders", &self.builders)
            .field("converters", &self.converters)
            .field("schemas", &self.schemas)
            .finish_non_exhaustive()
    }
}

fn log_failure(failure: QueryFailure) {
    tracing::error!(
        command = failure.query.command(),
        table = failure.query.table(),
        sql = failure.query.sql().unwrap_or_default(),
        error = %failure.error,
        "queued query failed"
    );
}
