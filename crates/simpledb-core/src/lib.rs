//! Core types and traits for SimpleDB.
//!
//! This crate provides the foundational pieces shared by every other crate:
//!
//! - `Error`, the one error type of the workspace
//! - `Value` and `Row` for dynamically typed result data
//! - `Connection` and `Driver` traits plus `DatabaseInfo` targets
//! - `ConverterRegistry` for value/text conversion
//! - `ObjectSchema`, `SchemaRegistry` and `ObjectMapper` for static object mapping

pub mod connection;
pub mod convert;
pub mod error;
pub mod field;
pub mod mapper;
pub mod row;
pub mod schema;
pub mod types;
pub mod value;

pub use connection::{Connection, DatabaseInfo, Driver};
pub use convert::ConverterRegistry;
pub use error::{Error, MappingErrorKind, Result};
pub use field::{FieldInfo, MemberKind};
pub use mapper::{ObjectMapper, get_column, get_column_packed};
pub use row::{ColumnRef, FromValue, Row};
pub use schema::{DatabaseObject, ObjectSchema, SchemaRegistry};
pub use types::BaseType;
pub use value::Value;
