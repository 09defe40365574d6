//! Object schemas and the per-type schema registry.
//!
//! An [`ObjectSchema`] is the static descriptor table of a database object:
//! its mapped members plus the entry points the mapper uses to build new
//! instances. Schemas are registered in a [`SchemaRegistry`] and looked up by
//! type identity, so mapping a type that was never registered is a
//! `SchemaMismatch` rather than a compile error.

use crate::convert::ConverterRegistry;
use crate::error::{Error, MappingErrorKind, QueryObjectError, Result};
use crate::field::FieldInfo;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Builds an object from ordered column texts (NULL as `None`).
pub type RowBuildFn<M> = fn(&[Option<String>], &ConverterRegistry) -> Result<M>;

/// An ordered-argument constructor together with the columns feeding it.
pub struct RowConstructor<M: 'static> {
    /// Column names, one per constructor parameter, in parameter order
    pub columns: &'static [&'static str],
    pub build: RowBuildFn<M>,
}

/// Static descriptor table of a database object.
pub struct ObjectSchema<M: 'static> {
    pub type_name: &'static str,
    /// Mapped members in declaration order
    pub fields: &'static [FieldInfo<M>],
    /// Designated zero-argument constructor
    pub constructor: Option<fn() -> M>,
    pub row_constructor: Option<RowConstructor<M>>,
}

impl<M> ObjectSchema<M> {
    pub const fn new(type_name: &'static str, fields: &'static [FieldInfo<M>]) -> Self {
        Self {
            type_name,
            fields,
            constructor: None,
            row_constructor: None,
        }
    }

    pub const fn constructor(mut self, ctor: fn() -> M) -> Self {
        self.constructor = Some(ctor);
        self
    }

    pub const fn row_constructor(
        mut self,
        columns: &'static [&'static str],
        build: RowBuildFn<M>,
    ) -> Self {
        self.row_constructor = Some(RowConstructor { columns, build });
        self
    }

    /// Members participating under the given group filter.
    pub fn members_in<'a>(&'a self, groups: &'a [i32]) -> impl Iterator<Item = &'a FieldInfo<M>> {
        self.fields.iter().filter(move |f| f.in_groups(groups))
    }

    /// Look up a member by its Rust name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo<M>> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl<M> fmt::Debug for ObjectSchema<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSchema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .field("constructor", &self.constructor.is_some())
            .field(
                "row_constructor",
                &self.row_constructor.as_ref().map(|r| r.columns),
            )
            .finish()
    }
}

/// A type with a static descriptor table.
///
/// Typically derived with `#[derive(DatabaseObject)]`.
pub trait DatabaseObject: Sized + Send + 'static {
    fn schema() -> &'static ObjectSchema<Self>;
}

/// Descriptor tables of all database-mappable types, keyed by type identity.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<TypeId, &'static (dyn Any + Send + Sync)>,
    names: HashMap<TypeId, &'static str>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names.values().collect();
        names.sort_unstable();
        f.debug_struct("SchemaRegistry").field("types", &names).finish()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the schema of a derived type.
    pub fn register<T: DatabaseObject>(&mut self) {
        self.register_schema(T::schema());
    }

    /// Register a hand-written schema.
    pub fn register_schema<T: Send + 'static>(&mut self, schema: &'static ObjectSchema<T>) {
        let id = TypeId::of::<T>();
        self.schemas.insert(id, schema);
        self.names.insert(id, schema.type_name);
        tracing::trace!(type_name = schema.type_name, "registered object schema");
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.schemas.contains_key(&TypeId::of::<T>())
    }

    /// Fetch the schema of `T`, failing with `SchemaMismatch` when `T` was
    /// never registered.
    pub fn get<T: 'static>(&self) -> Result<&'static ObjectSchema<T>> {
        let schema: &'static (dyn Any + Send + Sync) =
            *self.schemas.get(&TypeId::of::<T>()).ok_or_else(|| {
                Error::mapping(
                    MappingErrorKind::SchemaMismatch,
                    std::any::type_name::<T>(),
                    None,
                    "type is not registered as a database object",
                )
            })?;
        let any: &'static dyn Any = schema;
        any.downcast_ref::<ObjectSchema<T>>().ok_or_else(|| {
            Error::mapping(
                MappingErrorKind::SchemaMismatch,
                std::any::type_name::<T>(),
                None,
                "registered schema describes a different type",
            )
        })
    }
}

/// A function usable as an ordered-argument row constructor.
///
/// Implemented for any `Fn(A, B, ...) -> Out` with up to eight parameters,
/// where every parameter type has a converter and a `Default` used for NULL
/// columns.
pub trait ConstructorFn<Args, Out> {
    const ARITY: usize;

    fn invoke(
        &self,
        values: &[Option<String>],
        registry: &ConverterRegistry,
        type_name: &'static str,
    ) -> Result<Out>;
}

fn parse_arg<T: Any + Default>(
    values: &[Option<String>],
    index: usize,
    registry: &ConverterRegistry,
    type_name: &'static str,
) -> Result<T> {
    match values.get(index) {
        Some(Some(text)) => registry.from_text::<T>(text).map_err(|e| {
            Error::QueryObject(QueryObjectError {
                type_name,
                message: format!(
                    "Could not convert argument {} to {}",
                    index,
                    std::any::type_name::<T>()
                ),
                source: Some(Box::new(e)),
            })
        }),
        Some(None) => Ok(T::default()),
        None => Err(Error::query_object(
            type_name,
            format!("Illegal arguments passed to constructor: missing argument {}", index),
        )),
    }
}

macro_rules! impl_constructor_fn {
    ($arity:literal; $($arg:ident => $idx:tt),*) => {
        impl<Func, Out, $($arg),*> ConstructorFn<($($arg,)*), Out> for Func
        where
            Func: Fn($($arg),*) -> Out,
            $($arg: Any + Default,)*
        {
            const ARITY: usize = $arity;

            fn invoke(
                &self,
                values: &[Option<String>],
                registry: &ConverterRegistry,
                type_name: &'static str,
            ) -> Result<Out> {
                Ok((self)($(parse_arg::<$arg>(values, $idx, registry, type_name)?),*))
            }
        }
    };
}

impl_constructor_fn!(1; A => 0);
impl_constructor_fn!(2; A => 0, B => 1);
impl_constructor_fn!(3; A => 0, B => 1, C => 2);
impl_constructor_fn!(4; A => 0, B => 1, C => 2, D => 3);
impl_constructor_fn!(5; A => 0, B => 1, C => 2, D => 3, E => 4);
impl_constructor_fn!(6; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
impl_constructor_fn!(7; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);
impl_constructor_fn!(8; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7);

fn check_arity(type_name: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(Error::query_object(
            type_name,
            format!(
                "Illegal arguments passed to constructor: expected {} columns, got {}",
                expected, got
            ),
        ))
    }
}

/// Call an infallible row constructor with arguments parsed from text.
pub fn invoke_row_constructor<M, Args, F>(
    ctor: F,
    values: &[Option<String>],
    registry: &ConverterRegistry,
    type_name: &'static str,
) -> Result<M>
where
    F: ConstructorFn<Args, M>,
{
    check_arity(type_name, <F as ConstructorFn<Args, M>>::ARITY, values.len())?;
    ctor.invoke(values, registry, type_name)
}

/// Call a row constructor returning `Result<M, E>`; an error from the
/// constructor body becomes a `QueryObjectFailure` wrapping it.
pub fn invoke_fallible_row_constructor<M, E, Args, F>(
    ctor: F,
    values: &[Option<String>],
    registry: &ConverterRegistry,
    type_name: &'static str,
) -> Result<M>
where
    F: ConstructorFn<Args, std::result::Result<M, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    check_arity(
        type_name,
        <F as ConstructorFn<Args, std::result::Result<M, E>>>::ARITY,
        values.len(),
    )?;
    ctor.invoke(values, registry, type_name)?.map_err(|e| {
        Error::QueryObject(QueryObjectError {
            type_name,
            message: format!("Construct throw an error: {}", e),
            source: Some(Box::new(e)),
        })
    })
}
