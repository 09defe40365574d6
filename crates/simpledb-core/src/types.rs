//! The base types the object mapper can assign natively.

use crate::value::Value;

/// A member type the full-object read path can assign from a row value
/// without going through text conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Byte,
    Text,
}

impl BaseType {
    /// The Rust type this base type stands for.
    pub const fn rust_name(&self) -> &'static str {
        match self {
            BaseType::Bool => "bool",
            BaseType::TinyInt => "i8",
            BaseType::SmallInt => "i16",
            BaseType::Int => "i32",
            BaseType::BigInt => "i64",
            BaseType::Byte => "u8",
            BaseType::Text => "String",
        }
    }

    /// Whether a row value of this kind could be assigned to the type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            BaseType::Bool => matches!(value, Value::Bool(_)) || value.is_integer(),
            BaseType::Text => matches!(value, Value::Text(_)),
            _ => value.is_integer(),
        }
    }
}
