//! Member descriptors for database objects.
//!
//! Each mappable type carries a static table of [`FieldInfo`] entries, one per
//! mapped member, in declaration order. Entries are normally generated by
//! `#[derive(DatabaseObject)]` but can be written by hand.

use crate::error::{Error, Result, TypeError};
use crate::row::FromValue;
use crate::types::BaseType;
use crate::value::Value;
use std::any::Any;
use std::fmt;

/// Reads the current value of a member as a type-erased box.
pub type Getter<M> = fn(&M) -> Box<dyn Any + Send>;

/// Assigns a row value to a member without text conversion.
pub type Setter<M> = fn(&mut M, &Value) -> Result<()>;

/// The group tag a member carries when none are declared.
pub const DEFAULT_GROUPS: &[i32] = &[0];

/// What kind of member an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A struct field; readable and, for base types, assignable.
    Field,
    /// A zero-argument method; readable only.
    Accessor,
}

/// Metadata about one mapped member of a database object.
pub struct FieldInfo<M: 'static> {
    /// Rust member name
    pub name: &'static str,
    /// Database column name (defaults to the member name)
    pub column_name: &'static str,
    /// Group tags controlling which mapping operations include the member
    pub groups: &'static [i32],
    pub kind: MemberKind,
    /// Declared Rust type, for error messages
    pub type_name: &'static str,
    /// Set when the declared type is in the natively assignable base set
    pub base_type: Option<BaseType>,
    pub get: Getter<M>,
    /// Present only for fields whose type is a base type
    pub set: Option<Setter<M>>,
}

impl<M> FieldInfo<M> {
    /// Create a field entry with default column name and groups.
    pub const fn new(name: &'static str, type_name: &'static str, get: Getter<M>) -> Self {
        Self {
            name,
            column_name: name,
            groups: DEFAULT_GROUPS,
            kind: MemberKind::Field,
            type_name,
            base_type: None,
            get,
            set: None,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set the group tags. An empty list keeps the default `[0]`.
    pub const fn groups(mut self, groups: &'static [i32]) -> Self {
        if !groups.is_empty() {
            self.groups = groups;
        }
        self
    }

    /// Mark this entry as a zero-argument accessor method.
    pub const fn accessor(mut self) -> Self {
        self.kind = MemberKind::Accessor;
        self
    }

    /// Mark the declared type as a base type with a native setter.
    pub const fn assignable(mut self, base: BaseType, set: Setter<M>) -> Self {
        self.base_type = Some(base);
        self.set = Some(set);
        self
    }

    /// Whether this member participates under the given group filter.
    pub fn in_groups(&self, filter: &[i32]) -> bool {
        groups_intersect(self.groups, filter)
    }

    pub fn is_field(&self) -> bool {
        self.kind == MemberKind::Field
    }
}

impl<M> fmt::Debug for FieldInfo<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("column_name", &self.column_name)
            .field("groups", &self.groups)
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .field("base_type", &self.base_type)
            .finish_non_exhaustive()
    }
}

/// Group filter semantics: an empty filter means `{0}`, and a member matches
/// when any of its tags is in the filter.
pub fn groups_intersect(member: &[i32], filter: &[i32]) -> bool {
    let member = if member.is_empty() {
        DEFAULT_GROUPS
    } else {
        member
    };
    let filter = if filter.is_empty() {
        DEFAULT_GROUPS
    } else {
        filter
    };
    member.iter().any(|tag| filter.contains(tag))
}

/// Assign `value` into `slot`, requiring a value of the slot's native kind.
///
/// Generated setters call this; a value of a different kind (or NULL for a
/// non-`Option` slot) is a type error naming the column.
pub fn assign<T: FromValue>(slot: &mut T, value: &Value, column: &str) -> Result<()> {
    match T::from_value(value) {
        Ok(Some(v)) => {
            *slot = v;
            Ok(())
        }
        Ok(None) => Err(Error::Type(TypeError {
            expected: T::TYPE_NAME,
            actual: value.type_name().to_string(),
            column: Some(column.to_string()),
        })),
        Err(Error::Type(mut te)) => {
            te.column = Some(column.to_string());
            Err(Error::Type(te))
        }
        Err(e) => Err(e),
    }
}

/// Box a member value for the type-erased getter.
pub fn erase<T: Any + Send>(value: T) -> Box<dyn Any + Send> {
    Box::new(value)
}
