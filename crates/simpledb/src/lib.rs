//! SimpleDB - a lightweight data-access layer with queued writes and static
//! object mapping.
//!
//! SimpleDB lets application code read and write rows without writing SQL
//! for the common cases, while raw SQL stays available:
//!
//! - Query descriptors rendered to SQL by builders registered per command
//! - A background worker that runs queued queries in order
//! - Synchronous reads and statements on the caller's thread
//! - Objects mapped to and from rows through derived descriptor tables,
//!   filtered by group tags
//! - A bundled SQLite backend, and pluggable drivers for networked servers
//!
//! # Quick Start
//!
//! ```ignore
//! use simpledb::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(DatabaseObject, Debug, Default, PartialEq)]
//! #[database(constructor)]
//! struct Hero {
//!     #[database(field)]
//!     id: i64,
//!     #[database(column = "hero_name", groups(1))]
//!     name: String,
//! }
//!
//! let mut registry = Registry::with_standard_builders();
//! registry.register_object::<Hero>();
//!
//! let manager = DatabaseManager::connect(DatabaseInfo::file("data", "heroes"), Arc::new(registry))?;
//! manager.execute_statement(&Query::raw(
//!     "CREATE TABLE IF NOT EXISTS heroes (id INTEGER, hero_name TEXT)",
//! ))?;
//!
//! // Queue an insert of every member in groups 0 and 1.
//! let hero = Hero { id: 1, name: "Deadpond".into() };
//! let mut insert = Query::new("INSERT", "heroes");
//! insert.add_values(&manager.mapper(), &hero, &[0, 1])?;
//! manager.enqueue(insert.on_success(|_| tracing::info!("hero stored")))?;
//!
//! // Read it back on this thread.
//! let found: Option<Hero> = manager.table("heroes").object(&hero, "SELECT", &[0])?;
//! ```
//!
//! The derive expands to paths in `simpledb_core`, so crates deriving
//! `DatabaseObject` depend on `simpledb-core` as well.

pub mod manager;
pub mod registry;
pub mod table;
pub mod worker;

pub use manager::{DatabaseManager, ManagerBuilder};
pub use registry::{DefaultFailureHandler, Registry};
pub use table::{QuerySource, Table};
pub use worker::Dispatcher;

// Core types
pub use simpledb_core::error::{
    ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind,
};
pub use simpledb_core::{
    BaseType, ColumnRef, Connection, ConverterRegistry, DatabaseInfo, DatabaseObject, Driver,
    Error, FieldInfo, FromValue, MappingErrorKind, ObjectMapper, ObjectSchema, Result, Row,
    SchemaRegistry, Value, get_column, get_column_packed,
};

pub use simpledb_macros::DatabaseObject;

// Query construction
pub use simpledb_query::{
    BuilderRegistry, Query, QueryFailure, assignment_list, assignment_list_default, builders,
    placeholder_list, query, value_list,
};

// Bundled file backend
pub use simpledb_sqlite::{SqliteConfig, SqliteConnection, SqliteDriver};

/// The types most applications need.
pub mod prelude {
    pub use crate::{
        DatabaseInfo, DatabaseManager, DatabaseObject, Error, Query, QueryFailure, Registry,
        Result, Row, Table, Value,
    };
}
