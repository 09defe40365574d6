//! `Driver` implementation for file targets.

use crate::connection::{SqliteConfig, SqliteConnection};
use simpledb_core::error::{ConnectionError, ConnectionErrorKind};
use simpledb_core::{Connection, DatabaseInfo, Driver, Error, Result};

/// Opens [`SqliteConnection`]s for [`DatabaseInfo::File`] targets.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    busy_timeout_ms: u32,
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self {
            busy_timeout_ms: SqliteConfig::default().busy_timeout_ms,
        }
    }
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open(&self, info: &DatabaseInfo) -> Result<Box<dyn Connection>> {
        let Some(path) = info.file_path() else {
            return Err(Error::Connection(ConnectionError::new(
                ConnectionErrorKind::NoDriver,
                format!("sqlite cannot open {}", info.describe()),
            )));
        };
        let config =
            SqliteConfig::file(path.to_string_lossy().into_owned()).busy_timeout(self.busy_timeout_ms);
        Ok(Box::new(SqliteConnection::open(&config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let info = DatabaseInfo::file(dir.path(), "app");
        let conn = SqliteDriver::new().open(&info).unwrap();
        conn.ping().unwrap();
        assert!(dir.path().join("app.sqlite").exists());
    }

    #[test]
    fn rejects_network_target() {
        let info = DatabaseInfo::network_anonymous("localhost:3306/app");
        match SqliteDriver::new().open(&info) {
            Err(Error::Connection(e)) => assert_eq!(e.kind, ConnectionErrorKind::NoDriver),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("network target opened by sqlite driver"),
        }
    }
}
