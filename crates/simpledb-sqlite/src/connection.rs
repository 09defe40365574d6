//! SQLite connection implementation.
//!
//! This module provides safe wrappers around SQLite's C API and implements
//! the `Connection` trait from simpledb-core. All access to the raw handle
//! goes through one mutex, so statements on a shared connection never
//! interleave.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers

use crate::ffi;
use crate::types;
use simpledb_core::{
    Connection, Error, Result, Row, Value,
    error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind},
    row::ColumnInfo,
};
use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        // The handle is shared with the dispatch thread.
        let mut flags = ffi::SQLITE_OPEN_FULLMUTEX;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    #[must_use]
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    #[must_use]
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Raw handle, null once closed.
struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is opened in serialized mode and every use goes
// through the Mutex in SqliteConnection.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// This is a thread-safe wrapper around a SQLite database handle.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Connect,
                "Invalid path: contains null byte",
            ))
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db was allocated by open_v2 and must be released
                unsafe {
                    let msg = ffi::last_error(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };
            return Err(Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Connect,
                format!("Failed to open database '{}': {}", config.path, msg),
            )));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms.min(c_int::MAX as u32) as c_int);
            }
        }

        tracing::debug!(path = %config.path, "sqlite database opened");

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database, creating it if needed.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Lock the handle, failing once the connection is closed.
    fn handle(&self) -> Result<MutexGuard<'_, SqliteInner>> {
        let inner = self.inner.lock().map_err(|_| {
            Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Closed,
                "Connection lock poisoned",
            ))
        })?;
        if inner.db.is_null() {
            return Err(Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Closed,
                "Connection is closed",
            )));
        }
        Ok(inner)
    }

    /// Execute one or more `;`-separated statements without parameters.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.handle()?;
        let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;

        let mut errmsg: *mut c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg was allocated by sqlite3_exec and is freed once
                unsafe {
                    let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                    msg
                }
            };
            return Err(query_error(error_code_to_kind(rc), sql, msg));
        }

        Ok(())
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        let inner = self.handle()?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(inner.db) })
    }

    /// Prepare and execute a query, returning all rows.
    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.handle()?;
        let Some(stmt) = Statement::prepare(inner.db, sql, params)? else {
            return Ok(Vec::new());
        };

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: i is in range
            let name = unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(stmt.raw) } {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(col_count as usize);
                    for i in 0..col_count {
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        values.push(unsafe { types::read_column(stmt.raw, i) });
                    }
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }

        tracing::trace!(sql, rows = rows.len(), "sqlite query finished");
        Ok(rows)
    }

    /// Prepare and execute a statement, returning rows affected.
    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let inner = self.handle()?;
        let Some(stmt) = Statement::prepare(inner.db, sql, params)? else {
            return Ok(0);
        };

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let changes = unsafe { ffi::sqlite3_changes(inner.db) };
                tracing::trace!(sql, changes, "sqlite statement finished");
                Ok(u64::try_from(changes).unwrap_or(0))
            }
            _ => Err(step_error(inner.db, sql)),
        }
    }

    fn close_sync(&self) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| {
            Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Close,
                "Connection lock poisoned",
            ))
        })?;
        if inner.db.is_null() {
            return Ok(());
        }
        // SAFETY: db is valid and no statement outlives the lock
        let rc = unsafe { ffi::sqlite3_close_v2(inner.db) };
        inner.db = ptr::null_mut();
        if rc != ffi::SQLITE_OK {
            return Err(Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Close,
                format!("Failed to close database: {}", ffi::error_string(rc)),
            )));
        }
        tracing::debug!(path = %self.path, "sqlite database closed");
        Ok(())
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if !inner.db.is_null() {
                // SAFETY: db is valid
                unsafe {
                    ffi::sqlite3_close_v2(inner.db);
                }
                inner.db = ptr::null_mut();
            }
        }
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query_sync(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.execute_sync(sql, params)
    }

    fn close(&self) -> Result<()> {
        self.close_sync()
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A prepared statement with its parameters bound, finalized on drop.
struct Statement {
    raw: *mut ffi::sqlite3_stmt,
}

impl Statement {
    /// Prepare `sql` on `db` and bind `params`. `None` for SQL without a
    /// statement (empty or only comments).
    ///
    /// `sql` must hold a single statement. Text after it may only be
    /// whitespace, semicolons or comments.
    fn prepare(db: *mut ffi::sqlite3, sql: &str, params: &[Value]) -> Result<Option<Self>> {
        let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;
        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut raw,
                &mut tail,
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(step_error(db, sql));
        }
        if raw.is_null() {
            return Ok(None);
        }
        let stmt = Self { raw };

        let rest = if tail.is_null() {
            ""
        } else {
            // SAFETY: tail points into c_sql, which is NUL-terminated and alive
            unsafe { CStr::from_ptr(tail) }.to_str().unwrap_or_default()
        };
        if !rest.trim().is_empty() && !matches!(Self::prepare(db, rest, &[]), Ok(None)) {
            return Err(query_error(
                QueryErrorKind::Syntax,
                sql,
                "query contains more than one statement".to_string(),
            ));
        }

        for (i, param) in params.iter().enumerate() {
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(stmt.raw, (i + 1) as c_int, param) };
            if rc != ffi::SQLITE_OK {
                return Err(bind_error(db, sql, i + 1));
            }
        }
        Ok(Some(stmt))
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: raw came from a successful prepare and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

// Helper functions

fn query_error(kind: QueryErrorKind, sql: &str, message: String) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message,
        source: None,
    })
}

fn nul_in_sql(sql: &str) -> Error {
    query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte".to_string())
}

fn bind_error(db: *mut ffi::sqlite3, sql: &str, param_index: usize) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { ffi::last_error(db) };
    query_error(
        QueryErrorKind::Database,
        sql,
        format!("Failed to bind parameter {}: {}", param_index, msg),
    )
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (ffi::last_error(db), ffi::sqlite3_errcode(db)) };
    let kind = match error_code_to_kind(code) {
        QueryErrorKind::Database if msg.contains("syntax error") => QueryErrorKind::Syntax,
        QueryErrorKind::Database if msg.starts_with("no such") => QueryErrorKind::NotFound,
        kind => kind,
    };
    query_error(kind, sql, msg)
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    // Extended codes carry the primary code in the low byte.
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        _ => QueryErrorKind::Database,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
        conn.ping().unwrap();
    }

    #[test]
    fn test_execute_raw() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice')")
            .unwrap();
        assert_eq!(conn.last_insert_rowid().unwrap(), 1);
    }

    #[test]
    fn test_query_sync() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice'), ('Bob')")
            .unwrap();

        let rows = conn.query("SELECT * FROM test ORDER BY id", &[]).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].get_named::<i32>("id").unwrap(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[1].get_named::<i32>("id").unwrap(), 2);
        assert_eq!(rows[1].get_named::<String>("name").unwrap(), "Bob");
    }

    #[test]
    fn test_parameterized_statement() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();

        let changed = conn
            .execute(
                "INSERT INTO test (name, age) VALUES (?, ?)",
                &[Value::Text("O'Neil".to_string()), Value::Int(30)],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let rows = conn
            .query(
                "SELECT * FROM test WHERE name = ?",
                &[Value::Text("O'Neil".to_string())],
            )
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<i32>("age").unwrap(), 30);
    }

    #[test]
    fn test_null_handling() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute("INSERT INTO test (name) VALUES (?)", &[Value::Null])
            .unwrap();

        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<Option<String>>("name").unwrap(), None);
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_type_conversions() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE types (b BOOLEAN, i INTEGER, big INTEGER, f REAL, t TEXT, bl BLOB)")
            .unwrap();

        conn.execute(
            "INSERT INTO types VALUES (?, ?, ?, ?, ?, ?)",
            &[
                Value::Bool(true),
                Value::TinyInt(-7),
                Value::BigInt(i64::MAX),
                Value::Double(3.14),
                Value::Text("hello".to_string()),
                Value::Bytes(vec![1, 2, 3]),
            ],
        )
        .unwrap();

        let rows = conn.query("SELECT * FROM types", &[]).unwrap();
        let row = &rows[0];

        // SQLite stores booleans as integers
        assert_eq!(row.get_by_name("b"), Some(&Value::Int(1)));
        assert!(row.get_named::<bool>("b").unwrap());
        assert_eq!(row.get_named::<i8>("i").unwrap(), -7);
        assert_eq!(row.get_by_name("big"), Some(&Value::BigInt(i64::MAX)));
        assert!((row.get_named::<f64>("f").unwrap() - 3.14).abs() < 0.001);
        assert_eq!(row.get_named::<String>("t").unwrap(), "hello");
        assert_eq!(row.get_named::<Vec<u8>>("bl").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_error_kinds() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

        match conn.query("SELECT * FROM missing", &[]) {
            Err(Error::Query(e)) => {
                assert_eq!(e.kind, QueryErrorKind::NotFound);
                assert_eq!(e.sql.as_deref(), Some("SELECT * FROM missing"));
            }
            other => panic!("expected query error, got {other:?}"),
        }

        match conn.execute("SELEC 1", &[]) {
            Err(Error::Query(e)) => assert_eq!(e.kind, QueryErrorKind::Syntax),
            other => panic!("expected syntax error, got {other:?}"),
        }

        conn.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
        match conn.execute("INSERT INTO t VALUES (1)", &[]) {
            Err(Error::Query(e)) => assert_eq!(e.kind, QueryErrorKind::Constraint),
            other => panic!("expected constraint error, got {other:?}"),
        }
    }

    #[test]
    fn test_single_statement_only() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE t (id INTEGER)").unwrap();

        match conn.execute("INSERT INTO t VALUES (1); DELETE FROM t", &[]) {
            Err(Error::Query(e)) => {
                assert_eq!(e.kind, QueryErrorKind::Syntax);
                assert_eq!(e.sql.as_deref(), Some("INSERT INTO t VALUES (1); DELETE FROM t"));
            }
            other => panic!("expected query error, got {other:?}"),
        }
        assert!(conn.query("SELECT 1; SELECT 2", &[]).is_err());
        assert!(conn.query("SELECT * FROM t", &[]).unwrap().is_empty());

        assert_eq!(conn.execute("INSERT INTO t VALUES (2);  \n", &[]).unwrap(), 1);
        assert_eq!(conn.query("SELECT id FROM t; -- trailing note", &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_sql() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert!(conn.query("", &[]).unwrap().is_empty());
        assert_eq!(conn.execute("  ", &[]).unwrap(), 0);
    }

    #[test]
    fn test_close_is_final() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(conn.ping().unwrap_err().is_connection_error());
    }

    #[test]
    fn test_open_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.sqlite").to_string_lossy().to_string();

        let config = SqliteConfig::file(path.clone()).flags(OpenFlags::create_read_write());
        let conn = SqliteConnection::open(&config).unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER)").unwrap();
        drop(conn);

        let config = SqliteConfig::file(path).flags(OpenFlags::read_only());
        let conn = SqliteConnection::open(&config).unwrap();

        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert_eq!(rows.len(), 0);
        assert!(conn.execute_raw("INSERT INTO test VALUES (1)").is_err());
    }

    #[test]
    fn test_open_missing_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sqlite").to_string_lossy().to_string();
        let config = SqliteConfig::file(path).flags(OpenFlags::read_write());
        match SqliteConnection::open(&config) {
            Err(Error::Connection(e)) => assert_eq!(e.kind, ConnectionErrorKind::Connect),
            other => panic!("expected connect error, got {other:?}"),
        }
    }
}
