//! Row to object mapping.
//!
//! The write path turns an object's members into ordered `(column, text)`
//! pairs through the converter registry. The read paths go the other way:
//!
//! - [`get_column`] / [`get_column_packed`] pull one column out of every row,
//!   silently skipping rows whose value is not of the requested kind;
//! - [`ObjectMapper::get_database_objects`] builds each object through its
//!   zero-argument constructor and assigns base-type fields natively;
//! - [`ObjectMapper::get_from_result_set`] calls the ordered-argument row
//!   constructor with arguments parsed from column text.

use crate::convert::ConverterRegistry;
use crate::error::{Error, MappingErrorKind, Result, TypeError};
use crate::row::{ColumnRef, FromValue, Row};
use crate::schema::{ObjectSchema, SchemaRegistry};
use std::fmt;

/// Extract one column from every row as `T`.
///
/// Rows where the column is missing, NULL, or holds a value of another kind
/// are skipped. A value of the right kind that cannot be coerced (for
/// example an integer overflowing `T`) fails the whole call with a type error.
pub fn get_column<T: FromValue>(rows: &[Row], column: impl Into<ColumnRef>) -> Result<Vec<T>> {
    let column = column.into();
    let mut out = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if let Some(v) = cast_cell::<T>(row, &column, index)? {
            out.push(v);
        }
    }
    Ok(out)
}

/// Like [`get_column`], but passes each extracted value through `pack`.
///
/// A packing error fails the call with a type error.
pub fn get_column_packed<T, S, E, P>(
    rows: &[Row],
    column: impl Into<ColumnRef>,
    mut pack: P,
) -> Result<Vec<S>>
where
    T: FromValue,
    E: fmt::Display,
    P: FnMut(T) -> std::result::Result<S, E>,
{
    let column = column.into();
    let mut out = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let Some(v) = cast_cell::<T>(row, &column, index)? else {
            continue;
        };
        let packed = pack(v).map_err(|e| {
            Error::Type(TypeError {
                expected: std::any::type_name::<S>(),
                actual: format!("packing {} failed: {}", T::TYPE_NAME, e),
                column: Some(column.to_string()),
            })
        })?;
        out.push(packed);
    }
    Ok(out)
}

fn cast_cell<T: FromValue>(row: &Row, column: &ColumnRef, index: usize) -> Result<Option<T>> {
    let Some(value) = row.get_ref(column) else {
        tracing::trace!(%column, row = index, "column missing, row skipped");
        return Ok(None);
    };
    match T::from_value(value) {
        Ok(Some(v)) => Ok(Some(v)),
        Ok(None) => {
            tracing::trace!(
                %column,
                row = index,
                found = value.type_name(),
                expected = T::TYPE_NAME,
                "value not an instance of requested type, row skipped"
            );
            Ok(None)
        }
        Err(Error::Type(mut te)) => {
            te.column = Some(column.to_string());
            Err(Error::Type(te))
        }
        Err(e) => Err(Error::Type(TypeError {
            expected: T::TYPE_NAME,
            actual: e.to_string(),
            column: Some(column.to_string()),
        })),
    }
}

/// Maps database objects using the registered schemas and converters.
#[derive(Debug, Clone, Copy)]
pub struct ObjectMapper<'a> {
    schemas: &'a SchemaRegistry,
    converters: &'a ConverterRegistry,
}

impl<'a> ObjectMapper<'a> {
    pub fn new(schemas: &'a SchemaRegistry, converters: &'a ConverterRegistry) -> Self {
        Self {
            schemas,
            converters,
        }
    }

    pub fn schemas(&self) -> &'a SchemaRegistry {
        self.schemas
    }

    pub fn converters(&self) -> &'a ConverterRegistry {
        self.converters
    }

    /// Render the members of `obj` selected by `groups` as `(column, text)`
    /// pairs in declaration order.
    pub fn extract_values<T: 'static>(
        &self,
        obj: &T,
        groups: &[i32],
    ) -> Result<Vec<(String, String)>> {
        let schema = self.schemas.get::<T>()?;
        let mut pairs = Vec::new();
        for member in schema.members_in(groups) {
            let value = (member.get)(obj);
            let text = self.converters.to_text_dyn(&*value).map_err(|e| match e {
                Error::Mapping(mut m) if m.kind == MappingErrorKind::UnsupportedFieldType => {
                    m.type_name = schema.type_name;
                    m.member = Some(member.name);
                    m.message = format!("no converter registered for {}", member.type_name);
                    Error::Mapping(m)
                }
                other => other,
            })?;
            pairs.push((member.column_name.to_string(), text));
        }
        Ok(pairs)
    }

    /// Build one object per row through the designated zero-argument
    /// constructor, assigning the fields selected by `groups`.
    pub fn get_database_objects<T: 'static>(&self, rows: &[Row], groups: &[i32]) -> Result<Vec<T>> {
        let schema = self.schemas.get::<T>()?;
        let ctor = Self::checked_constructor(schema)?;
        rows.iter()
            .map(|row| Self::fill(schema, ctor, row, groups))
            .collect()
    }

    /// Build an object from the first row, or `None` if there are no rows.
    pub fn get_database_object<T: 'static>(&self, rows: &[Row], groups: &[i32]) -> Result<Option<T>> {
        let schema = self.schemas.get::<T>()?;
        let ctor = Self::checked_constructor(schema)?;
        rows.first()
            .map(|row| Self::fill(schema, ctor, row, groups))
            .transpose()
    }

    fn checked_constructor<T>(schema: &ObjectSchema<T>) -> Result<fn() -> T> {
        let ctor = schema.constructor.ok_or_else(|| {
            Error::mapping(
                MappingErrorKind::MissingConstructor,
                schema.type_name,
                None,
                "no designated zero-argument constructor",
            )
        })?;
        // Every field must be assignable, regardless of the group filter.
        if let Some(field) = schema
            .fields
            .iter()
            .find(|f| f.is_field() && f.set.is_none())
        {
            return Err(Error::mapping(
                MappingErrorKind::UnsupportedFieldType,
                schema.type_name,
                Some(field.name),
                format!("can not read field of type {} as value type", field.type_name),
            ));
        }
        Ok(ctor)
    }

    fn fill<T>(schema: &ObjectSchema<T>, ctor: fn() -> T, row: &Row, groups: &[i32]) -> Result<T> {
        let mut obj = ctor();
        for field in schema.members_in(groups).filter(|f| f.is_field()) {
            let Some(set) = field.set else {
                continue;
            };
            let value = row.get_by_name(field.column_name).ok_or_else(|| {
                Error::Type(TypeError {
                    expected: field.type_name,
                    actual: "missing column".to_string(),
                    column: Some(field.column_name.to_string()),
                })
            })?;
            // NULL is left to the setter, which accepts it only for `Option`s.
            if let Some(base) = field.base_type {
                if !value.is_null() && !base.accepts(value) {
                    return Err(Error::Type(TypeError {
                        expected: base.rust_name(),
                        actual: value.type_name().to_string(),
                        column: Some(field.column_name.to_string()),
                    }));
                }
            }
            set(&mut obj, value)?;
        }
        Ok(obj)
    }

    /// Build one object per row through the ordered-argument row constructor,
    /// parsing each argument from its column's text.
    pub fn get_from_result_set<T: 'static>(&self, rows: &[Row]) -> Result<Vec<T>> {
        let schema = self.schemas.get::<T>()?;
        let rc = schema.row_constructor.as_ref().ok_or_else(|| {
            Error::query_object(
                schema.type_name,
                format!("No suitable constructor found for class: {}", schema.type_name),
            )
        })?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut texts = Vec::with_capacity(rc.columns.len());
            for column in rc.columns {
                let value = row.get_by_name(column).ok_or_else(|| {
                    Error::query_object(
                        schema.type_name,
                        format!("Could not get field: {} from result set!", column),
                    )
                })?;
                texts.push(value.to_text());
            }
            out.push((rc.build)(&texts, self.converters)?);
        }
        Ok(out)
    }
}
