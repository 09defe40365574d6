//! Connection lifecycle: open, ping, queue work, close.

use crate::registry::Registry;
use crate::table::Table;
use crate::worker::Dispatcher;
use simpledb_core::error::{ConnectionError, ConnectionErrorKind};
use simpledb_core::{Connection, DatabaseInfo, Driver, Error, ObjectMapper, Result, Row};
use simpledb_query::{Query, run_query, run_statement};
use simpledb_sqlite::SqliteDriver;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Configures the drivers a [`DatabaseManager`] connects with.
///
/// File targets use [`SqliteDriver`] unless another file driver is set.
/// Network targets need a driver supplied with
/// [`ManagerBuilder::network_driver`].
///
/// # Example
///
/// ```no_run
/// use simpledb::{DatabaseInfo, DatabaseManager, Registry};
/// use simpledb_sqlite::SqliteDriver;
/// use std::sync::Arc;
///
/// let registry = Arc::new(Registry::with_standard_builders());
/// let manager = DatabaseManager::builder(registry)
///     .file_driver(SqliteDriver::new().busy_timeout(1_000))
///     .connect(DatabaseInfo::file("data", "app"))?;
/// # Ok::<(), simpledb::Error>(())
/// ```
pub struct ManagerBuilder {
    registry: Arc<Registry>,
    file_driver: Box<dyn Driver>,
    network_driver: Option<Box<dyn Driver>>,
}

impl ManagerBuilder {
    fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            file_driver: Box::new(SqliteDriver::new()),
            network_driver: None,
        }
    }

    /// Driver used for [`DatabaseInfo::File`] targets.
    #[must_use]
    pub fn file_driver(mut self, driver: impl Driver + 'static) -> Self {
        self.file_driver = Box::new(driver);
        self
    }

    /// Driver used for [`DatabaseInfo::Network`] targets.
    #[must_use]
    pub fn network_driver(mut self, driver: impl Driver + 'static) -> Self {
        self.network_driver = Some(Box::new(driver));
        self
    }

    /// Open the target, ping it and start the dispatch worker.
    pub fn connect(self, info: DatabaseInfo) -> Result<DatabaseManager> {
        let driver = match &info {
            DatabaseInfo::File { .. } => {
                if let Some(path) = info.file_path() {
                    ensure_file(&path)?;
                }
                &*self.file_driver
            }
            DatabaseInfo::Network { .. } => self.network_driver.as_deref().ok_or_else(|| {
                Error::Connection(ConnectionError::new(
                    ConnectionErrorKind::NoDriver,
                    format!("no driver installed for {}", info.describe()),
                ))
            })?,
        };

        let connection: Arc<dyn Connection> = Arc::from(driver.open(&info).map_err(|e| {
            if e.is_connection_error() {
                e
            } else {
                Error::Connection(
                    ConnectionError::new(
                        ConnectionErrorKind::Connect,
                        format!("{} driver failed to open {}", driver.name(), info.describe()),
                    )
                    .with_source(e),
                )
            }
        })?);

        if let Err(e) = connection.ping() {
            if let Err(close_err) = connection.close() {
                tracing::warn!(error = %close_err, "closing unreachable connection failed");
            }
            return Err(Error::Connection(
                ConnectionError::new(
                    ConnectionErrorKind::Ping,
                    format!("liveness check failed for {}", info.describe()),
                )
                .with_source(e),
            ));
        }

        let dispatcher = Dispatcher::start(Arc::clone(&connection), Arc::clone(&self.registry))?;
        tracing::info!(target_db = %info.describe(), driver = driver.name(), "database connected");

        Ok(DatabaseManager {
            info,
            connection,
            registry: self.registry,
            dispatcher,
            closed: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("file_driver", &self.file_driver.name())
            .field("network_driver", &self.network_driver.as_ref().map(|d| d.name()))
            .finish()
    }
}

/// Owns the single backend connection and its dispatch worker.
///
/// Queued queries ([`DatabaseManager::enqueue`]) run in order on the worker
/// thread; [`DatabaseManager::execute_query`] and
/// [`DatabaseManager::execute_statement`] run on the caller's thread and
/// return their result directly.
pub struct DatabaseManager {
    info: DatabaseInfo,
    connection: Arc<dyn Connection>,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    closed: AtomicBool,
}

impl DatabaseManager {
    /// Connect with the default drivers.
    ///
    /// Only file targets can be opened this way; use
    /// [`DatabaseManager::builder`] to supply a network driver.
    pub fn connect(info: DatabaseInfo, registry: Arc<Registry>) -> Result<Self> {
        Self::builder(registry).connect(info)
    }

    pub fn builder(registry: Arc<Registry>) -> ManagerBuilder {
        ManagerBuilder::new(registry)
    }

    pub fn info(&self) -> &DatabaseInfo {
        &self.info
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A mapper over the registry's schemas and converters.
    pub fn mapper(&self) -> ObjectMapper<'_> {
        self.registry.mapper()
    }

    /// Whether the dispatch worker still accepts queries.
    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Queue `query` for the dispatch worker.
    pub fn enqueue(&self, query: Query) -> Result<()> {
        self.dispatcher.enqueue(query)
    }

    /// Queue every query in order.
    pub fn enqueue_all<I>(&self, queries: I) -> Result<()>
    where
        I: IntoIterator<Item = Query>,
    {
        self.dispatcher.enqueue_all(queries)
    }

    /// Render and run a row-producing query on the caller's thread.
    pub fn execute_query(&self, query: &Query) -> Result<Vec<Row>> {
        run_query(&*self.connection, self.registry.builders(), query)
    }

    /// Render and run a statement on the caller's thread, returning the
    /// number of affected rows.
    pub fn execute_statement(&self, query: &Query) -> Result<u64> {
        run_statement(&*self.connection, self.registry.builders(), query)
    }

    /// Whether `SELECT * FROM <name>` runs successfully.
    pub fn has_table(&self, name: &str) -> bool {
        let sql = format!("SELECT * FROM {}", name);
        match self.connection.query(&sql, &[]) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(table = name, error = %e, "table lookup failed");
                false
            }
        }
    }

    /// Read helpers bound to `name`.
    pub fn table(&self, name: impl Into<String>) -> Table<'_> {
        Table::new(self, name)
    }

    /// Stop the dispatch worker, then release the connection.
    ///
    /// The manager stays stopped even if releasing fails. Closing again is
    /// a no-op.
    pub fn close(&self) -> Result<()> {
        self.dispatcher.shutdown();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.connection.close().map_err(|e| {
            if e.is_connection_error() {
                e
            } else {
                Error::Connection(
                    ConnectionError::new(
                        ConnectionErrorKind::Close,
                        format!("closing {} failed", self.info.describe()),
                    )
                    .with_source(e),
                )
            }
        })?;
        tracing::info!(target_db = %self.info.describe(), "database closed");
        Ok(())
    }
}

impl fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("target", &self.info.describe())
            .field("dispatcher", &self.dispatcher)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

fn ensure_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    tracing::debug!(path = %path.display(), "database file created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simpledb_core::Value;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Scripted {
        fail_ping: bool,
        closes: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl Connection for Scripted {
        fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            self.seen.lock().unwrap().push(sql.to_string());
            if self.fail_ping && sql == "SELECT 1" {
                return Err(Error::Custom("server gone".into()));
            }
            Ok(Vec::new())
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
            Ok(1)
        }

        fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Hands out one shared `Scripted` per open.
    struct ScriptedDriver {
        conn: Arc<Scripted>,
    }

    struct Shared(Arc<Scripted>);

    impl Connection for Shared {
        fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            self.0.query(sql, params)
        }

        fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
            self.0.execute(sql, params)
        }

        fn close(&self) -> Result<()> {
            self.0.close()
        }
    }

    impl Driver for ScriptedDriver {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn open(&self, _info: &DatabaseInfo) -> Result<Box<dyn Connection>> {
            Ok(Box::new(Shared(Arc::clone(&self.conn))))
        }
    }

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::with_standard_builders())
    }

    #[test]
    fn network_target_without_driver_fails() {
        let err = DatabaseManager::connect(DatabaseInfo::network_anonymous("localhost/app"), registry())
            .unwrap_err();
        match err {
            Error::Connection(e) => assert_eq!(e.kind, ConnectionErrorKind::NoDriver),
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[test]
    fn network_target_uses_installed_driver() {
        let conn = Arc::new(Scripted::default());
        let manager = DatabaseManager::builder(registry())
            .network_driver(ScriptedDriver { conn: Arc::clone(&conn) })
            .connect(DatabaseInfo::network("localhost:3306/app", "u", "p"))
            .unwrap();

        assert!(manager.is_running());
        assert_eq!(conn.seen.lock().unwrap().as_slice(), ["SELECT 1"]);
        assert!(manager.has_table("users"));
        assert_eq!(conn.seen.lock().unwrap().last().unwrap(), "SELECT * FROM users");
    }

    #[test]
    fn failed_ping_is_a_connection_error() {
        let conn = Arc::new(Scripted {
            fail_ping: true,
            ..Scripted::default()
        });
        let err = DatabaseManager::builder(registry())
            .network_driver(ScriptedDriver { conn: Arc::clone(&conn) })
            .connect(DatabaseInfo::network_anonymous("db/app"))
            .unwrap_err();
        match err {
            Error::Connection(e) => assert_eq!(e.kind, ConnectionErrorKind::Ping),
            other => panic!("expected ping failure, got {other:?}"),
        }
        assert_eq!(conn.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_is_idempotent_and_stops_the_worker() {
        let conn = Arc::new(Scripted::default());
        let manager = DatabaseManager::builder(registry())
            .network_driver(ScriptedDriver { conn: Arc::clone(&conn) })
            .connect(DatabaseInfo::network_anonymous("db/app"))
            .unwrap();

        manager.close().unwrap();
        manager.close().unwrap();
        assert!(!manager.is_running());
        assert_eq!(conn.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(manager.enqueue(Query::raw("SELECT 1")), Err(Error::NotRunning)));
    }

    #[test]
    fn file_target_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let info = DatabaseInfo::file(dir.path().join("nested").join("deeper"), "app");
        let path = info.file_path().unwrap();
        assert!(!path.exists());

        let manager = DatabaseManager::connect(info, registry()).unwrap();
        assert!(path.exists());
        assert!(format!("{manager:?}").contains("app.sqlite"));
        manager.close().unwrap();
    }
}
