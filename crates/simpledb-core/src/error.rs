//! Error types for SimpleDB operations.

use std::fmt;

/// The primary error type for all SimpleDB operations.
#[derive(Debug)]
pub enum Error {
    /// Opening, validating or closing the backend connection failed
    Connection(ConnectionError),
    /// Query execution errors reported by the driver
    Query(QueryError),
    /// No builder registered for a command name
    UnknownCommand(String),
    /// Text to value translation failed
    Conversion(ConversionError),
    /// Object mapping errors (schema, field type, constructor)
    Mapping(MappingError),
    /// A row value could not be coerced or packed as requested
    Type(TypeError),
    /// Constructing an object from its row constructor failed
    QueryObject(QueryObjectError),
    /// The dispatch worker has been stopped
    NotRunning,
    /// I/O errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// The liveness check failed after opening
    Ping,
    /// No driver available for the target
    NoDriver,
    /// Releasing the connection failed
    Close,
    /// Connection was already closed
    Closed,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Database is busy or locked
    Busy,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct ConversionError {
    /// Name of the target type
    pub target: &'static str,
    /// The text that failed to parse
    pub input: String,
    pub message: String,
}

#[derive(Debug)]
pub struct MappingError {
    pub kind: MappingErrorKind,
    /// Type being mapped
    pub type_name: &'static str,
    /// Member involved, if any
    pub member: Option<&'static str>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingErrorKind {
    /// The type has no registered object schema
    SchemaMismatch,
    /// A mapped member has a type without converter or outside the base set
    UnsupportedFieldType,
    /// No designated zero-argument constructor
    MissingConstructor,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct QueryObjectError {
    pub type_name: &'static str,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Get the mapping error kind, if this is a mapping error.
    pub fn mapping_kind(&self) -> Option<MappingErrorKind> {
        match self {
            Error::Mapping(m) => Some(m.kind),
            _ => None,
        }
    }

    pub(crate) fn mapping(
        kind: MappingErrorKind,
        type_name: &'static str,
        member: Option<&'static str>,
        message: impl Into<String>,
    ) -> Self {
        Error::Mapping(MappingError {
            kind,
            type_name,
            member,
            message: message.into(),
        })
    }

    pub(crate) fn query_object(type_name: &'static str, message: impl Into<String>) -> Self {
        Error::QueryObject(QueryObjectError {
            type_name,
            message: message.into(),
            source: None,
        })
    }
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => match &e.sql {
                Some(sql) => write!(f, "Query error: {} (sql: {})", e.message, sql),
                None => write!(f, "Query error: {}", e.message),
            },
            Error::UnknownCommand(name) => {
                write!(f, "No query builder registered for command: {}", name)
            }
            Error::Conversion(e) => write!(f, "Conversion error: {}", e),
            Error::Mapping(e) => write!(f, "Mapping error: {}", e),
            Error::Type(e) => match &e.column {
                Some(col) => write!(
                    f,
                    "Type error in column '{}': expected {}, found {}",
                    col, e.expected, e.actual
                ),
                None => write!(f, "Type error: expected {}, found {}", e.expected, e.actual),
            },
            Error::QueryObject(e) => write!(f, "Query object error: {}", e),
            Error::NotRunning => write!(f, "Worker not running"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::QueryObject(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot convert '{}' to {}: {}",
            self.input, self.target, self.message
        )
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.member {
            Some(member) => write!(f, "{}.{}: {}", self.type_name, member, self.message),
            None => write!(f, "{}: {}", self.type_name, self.message),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for QueryObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conversion(err)
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::Mapping(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<QueryObjectError> for Error {
    fn from(err: QueryObjectError) -> Self {
        Error::QueryObject(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for SimpleDB operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn sql_helper() {
        let err = Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some("SELEC 1".to_string()),
            message: "near \"SELEC\": syntax error".to_string(),
            source: None,
        });
        assert_eq!(err.sql(), Some("SELEC 1"));
        assert!(err.to_string().contains("SELEC 1"));
        assert!(!err.is_connection_error());
    }

    #[test]
    fn mapping_kind_and_display() {
        let err = Error::mapping(
            MappingErrorKind::UnsupportedFieldType,
            "User",
            Some("tags"),
            "no converter registered for Vec<String>",
        );
        assert_eq!(
            err.mapping_kind(),
            Some(MappingErrorKind::UnsupportedFieldType)
        );
        assert_eq!(
            err.to_string(),
            "Mapping error: User.tags: no converter registered for Vec<String>"
        );
    }

    #[test]
    fn query_object_source_chain() {
        let io = std::io::Error::other("constructor exploded");
        let err = Error::QueryObject(QueryObjectError {
            type_name: "User",
            message: "Construct throw an error: constructor exploded".to_string(),
            source: Some(Box::new(io)),
        });
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("constructor exploded"));
    }

    #[test]
    fn connection_errors() {
        let err: Error = ConnectionError::new(ConnectionErrorKind::Ping, "ping failed").into();
        assert!(err.is_connection_error());
        assert_eq!(err.to_string(), "Connection error: ping failed");
        assert_eq!(Error::NotRunning.to_string(), "Worker not running");
    }
}
