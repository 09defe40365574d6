//! SQLite driver for SimpleDB.
//!
//! This crate provides the file-based backend: a SQLite connection over the
//! C API (statically linked through `libsqlite3-sys`) implementing the
//! `Connection` trait from simpledb-core, and a [`SqliteDriver`] that opens it
//! for `DatabaseInfo::File` targets.
//!
//! # Example
//!
//! ```rust,no_run
//! use simpledb_core::{Connection, Value};
//! use simpledb_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//! conn.execute("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")])?;
//! let rows = conn.query("SELECT * FROM users", &[])?;
//! assert_eq!(rows.len(), 1);
//! # Ok::<(), simpledb_core::Error>(())
//! ```
//!
//! # Type Mapping
//!
//! | Rust Type | SQLite Type |
//! |-----------|-------------|
//! | `bool` | INTEGER (0/1) |
//! | `i8`, `i16`, `i32`, `i64`, `u8` | INTEGER |
//! | `f64` | REAL |
//! | `String` | TEXT |
//! | `Vec<u8>` | BLOB |
//! | `Option<T>` | NULL or T |
//!
//! # Thread Safety
//!
//! `SqliteConnection` is both `Send` and `Sync`, using internal mutex
//! synchronization to protect the underlying SQLite handle.

// FFI bindings require unsafe code
#![allow(unsafe_code)]

pub mod connection;
pub mod driver;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use driver::SqliteDriver;

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
