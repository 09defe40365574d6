//! Database connection traits and connection targets.
//!
//! - [`Connection`] - a live backend connection executing SQL text
//! - [`Driver`] - opens connections for a [`DatabaseInfo`] target
//! - [`DatabaseInfo`] - where to connect: a networked server or a local file

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The SQL run by [`Connection::ping`] to check a fresh connection.
pub const PING_SQL: &str = "SELECT 1";

/// A live database connection.
///
/// Connections are shared between the dispatch worker and callers on the
/// synchronous path, so implementations must be `Send + Sync` and must
/// serialize statement execution internally: two statements never run
/// interleaved on the same underlying handle.
pub trait Connection: Send + Sync {
    /// Execute a row-producing statement.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement, returning the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Check that the connection answers a trivial query.
    fn ping(&self) -> Result<()> {
        self.query(PING_SQL, &[]).map(|_| ())
    }

    /// Release the underlying handle. Further calls fail.
    fn close(&self) -> Result<()>;
}

/// Opens connections for a connection target.
pub trait Driver: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    fn open(&self, info: &DatabaseInfo) -> Result<Box<dyn Connection>>;
}

/// Extension used for file databases when none is configured.
pub const DEFAULT_FILE_EXTENSION: &str = "sqlite";

fn default_extension() -> String {
    DEFAULT_FILE_EXTENSION.to_string()
}

/// Connection target.
///
/// Serializable so applications can keep it in their configuration files:
///
/// ```json
/// { "backend": "file", "directory": "data", "file_name": "app" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DatabaseInfo {
    /// A networked relational server reached through a pluggable driver.
    Network {
        /// Host, port and database, e.g. `localhost:3306/app`
        url: String,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    /// A local file database at `<directory>/<file_name>.<extension>`.
    File {
        directory: PathBuf,
        file_name: String,
        #[serde(default = "default_extension")]
        extension: String,
    },
}

impl DatabaseInfo {
    /// Target a networked server with credentials.
    pub fn network(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        DatabaseInfo::Network {
            url: url.into(),
            user: Some(user.into()),
            password: Some(password.into()),
        }
    }

    /// Target a networked server without credentials.
    pub fn network_anonymous(url: impl Into<String>) -> Self {
        DatabaseInfo::Network {
            url: url.into(),
            user: None,
            password: None,
        }
    }

    /// Target a file database with the default extension.
    pub fn file(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        DatabaseInfo::File {
            directory: directory.into(),
            file_name: file_name.into(),
            extension: default_extension(),
        }
    }

    /// Set the file extension of a file target. No effect on network targets.
    #[must_use]
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        if let DatabaseInfo::File { extension, .. } = &mut self {
            *extension = ext.into();
        }
        self
    }

    /// Load a target from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, DatabaseInfo::File { .. })
    }

    /// Path of the backing file for file targets.
    pub fn file_path(&self) -> Option<PathBuf> {
        match self {
            DatabaseInfo::File {
                directory,
                file_name,
                extension,
            } => {
                let name = if extension.is_empty() {
                    file_name.clone()
                } else {
                    format!("{}.{}", file_name, extension)
                };
                Some(directory.join(name))
            }
            DatabaseInfo::Network { .. } => None,
        }
    }

    /// Human-readable target description for logs. Never includes the password.
    pub fn describe(&self) -> String {
        match self {
            DatabaseInfo::Network { url, user, .. } => match user {
                Some(user) => format!("network://{}@{}", user, url),
                None => format!("network://{}", url),
            },
            DatabaseInfo::File { .. } => self
                .file_path()
                .map(|p| format!("file://{}", p.display()))
                .unwrap_or_default(),
        }
    }
}
