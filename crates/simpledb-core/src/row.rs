//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// This struct is wrapped in `Arc` so all rows from the same query share
/// the same column information.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get the name of a column by index.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Addresses a column either by name or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Name(String),
    Index(usize),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Name(name) => write!(f, "{}", name),
            ColumnRef::Index(i) => write!(f, "#{}", i),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        ColumnRef::Name(name)
    }
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

/// A single row returned from a database query.
///
/// Rows provide both index-based and name-based access to column values.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a value by name or position.
    pub fn get_ref(&self, column: &ColumnRef) -> Option<&Value> {
        match column {
            ColumnRef::Name(name) => self.get_by_name(name),
            ColumnRef::Index(i) => self.get(*i),
        }
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Get a typed value by column name, requiring a value of the right kind.
    ///
    /// A missing column or a value that is not an instance of `T` is a
    /// type error here; use [`FromValue::from_value`] directly for the
    /// lenient per-row behavior.
    #[allow(clippy::result_large_err)]
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: T::TYPE_NAME,
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
            })
        })?;
        match T::from_value(value) {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(Error::Type(TypeError {
                expected: T::TYPE_NAME,
                actual: value.type_name().to_string(),
                column: Some(name.to_string()),
            })),
            Err(Error::Type(mut te)) => {
                te.column = Some(name.to_string());
                Err(Error::Type(te))
            }
            Err(e) => Err(e),
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Checked cast from a dynamic [`Value`] to a native type.
///
/// `Ok(None)` means the value is not an instance of the target kind
/// (including NULL for non-`Option` targets). `Err` means the value has the
/// right kind but cannot be coerced, e.g. an integer that overflows the
/// requested width.
pub trait FromValue: Sized {
    /// Rust-side name used in error messages.
    const TYPE_NAME: &'static str;

    #[allow(clippy::result_large_err)]
    fn from_value(value: &Value) -> Result<Option<Self>>;
}

fn out_of_range(expected: &'static str, v: i64) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("value {} out of range", v),
        column: None,
    })
}

macro_rules! impl_from_value_int {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_value(value: &Value) -> Result<Option<Self>> {
                    match value.as_i64() {
                        Some(v) => <$ty>::try_from(v)
                            .map(Some)
                            .map_err(|_| out_of_range($name, v)),
                        None => Ok(None),
                    }
                }
            }
        )*
    };
}

impl_from_value_int!(i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", u8 => "u8");

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Bool(v) => Ok(Some(*v)),
            // Backends without a boolean storage class hand back 0/1.
            v if v.is_integer() => match v.as_i64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                Some(other) => Err(out_of_range("bool", other)),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: &Value) -> Result<Option<Self>> {
        Ok(match value {
            Value::Double(v) => Some(*v),
            v if v.is_integer() => v.as_f64(),
            _ => None,
        })
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: &Value) -> Result<Option<Self>> {
        Ok(value.as_str().map(str::to_string))
    }
}

impl FromValue for Vec<u8> {
    const TYPE_NAME: &'static str = "Vec<u8>";

    fn from_value(value: &Value) -> Result<Option<Self>> {
        Ok(value.as_bytes().map(<[u8]>::to_vec))
    }
}

/// NULL is an instance of every `Option<T>`.
impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(Some(None)),
            v => T::from_value(v).map(|inner| inner.map(Some)),
        }
    }
}
