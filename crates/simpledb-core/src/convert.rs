//! Text conversion registry.
//!
//! Maps a Rust type (by [`TypeId`]) to a pair of functions that render a
//! value as column text and parse column text back into a value. The write
//! path of the object mapper and the row-constructor read path both go
//! through this registry.

use crate::error::{ConversionError, Error, MappingErrorKind, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

type ToTextFn = Arc<dyn Fn(&dyn Any) -> Result<String> + Send + Sync>;
type FromTextFn = Arc<dyn Fn(&str) -> Result<Box<dyn Any + Send>> + Send + Sync>;

#[derive(Clone)]
struct Converter {
    type_name: &'static str,
    to_text: ToTextFn,
    from_text: FromTextFn,
}

/// Registry of (to-text, from-text) converter pairs keyed by type.
///
/// `ConverterRegistry::new()` comes with converters for `i8`, `i16`, `i32`,
/// `i64`, `u8`, `bool`, `String` and [`Uuid`] (hyphenated text). Registering
/// a type again replaces its converter.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<TypeId, Converter>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.converters.values().map(|c| c.type_name).collect();
        names.sort_unstable();
        f.debug_struct("ConverterRegistry")
            .field("types", &names)
            .finish()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Create a registry holding the built-in converters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_parsed::<i8>();
        registry.register_parsed::<i16>();
        registry.register_parsed::<i32>();
        registry.register_parsed::<i64>();
        registry.register_parsed::<u8>();
        registry.register(|v: &bool| v.to_string(), parse_bool);
        registry.register(|v: &String| v.clone(), |s| Ok(s.to_string()));
        registry.register(|v: &Uuid| v.to_string(), parse_uuid);
        registry
    }

    /// Create a registry with no converters at all.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Add or replace the converter pair for `T`.
    pub fn register<T, F, P>(&mut self, to_text: F, from_text: P)
    where
        T: Any + Send,
        F: Fn(&T) -> String + Send + Sync + 'static,
        P: Fn(&str) -> Result<T> + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let to_text: ToTextFn = Arc::new(move |value: &dyn Any| {
            value
                .downcast_ref::<T>()
                .map(&to_text)
                .ok_or_else(|| {
                    Error::Conversion(ConversionError {
                        target: type_name,
                        input: String::new(),
                        message: "value has the wrong runtime type for this converter"
                            .to_string(),
                    })
                })
        });
        let from_text: FromTextFn =
            Arc::new(move |text: &str| from_text(text).map(|v| Box::new(v) as Box<dyn Any + Send>));
        self.converters.insert(
            TypeId::of::<T>(),
            Converter {
                type_name,
                to_text,
                from_text,
            },
        );
        tracing::trace!(type_name, "registered converter");
    }

    /// Register `T` using its `Display` and `FromStr` implementations.
    pub fn register_parsed<T>(&mut self)
    where
        T: Any + Send + fmt::Display + FromStr,
        T::Err: fmt::Display,
    {
        self.register(|v: &T| v.to_string(), parse_with::<T>);
    }

    /// Check whether a converter exists for `T`.
    pub fn contains<T: Any>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<T>())
    }

    /// Check whether a converter exists for the given type id.
    pub fn contains_type(&self, type_id: TypeId) -> bool {
        self.converters.contains_key(&type_id)
    }

    /// Render a value of a statically known type as text.
    pub fn to_text<T: Any>(&self, value: &T) -> Result<String> {
        self.to_text_as(TypeId::of::<T>(), std::any::type_name::<T>(), value)
    }

    /// Render a type-erased value using the converter of its runtime type.
    pub fn to_text_dyn(&self, value: &dyn Any) -> Result<String> {
        self.to_text_as(value.type_id(), "<dynamic>", value)
    }

    /// Render `value` with the converter registered for `type_id`.
    ///
    /// Fails with a conversion error if `value` is not actually of that type.
    pub fn to_text_as(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        value: &dyn Any,
    ) -> Result<String> {
        let converter = self.lookup(type_id, type_name)?;
        (converter.to_text)(value)
    }

    /// Parse text into a value of type `T`.
    pub fn from_text<T: Any>(&self, text: &str) -> Result<T> {
        let type_name = std::any::type_name::<T>();
        let boxed = self.from_text_dyn(TypeId::of::<T>(), type_name, text)?;
        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            Error::Conversion(ConversionError {
                target: type_name,
                input: text.to_string(),
                message: "converter produced a value of a different type".to_string(),
            })
        })
    }

    /// Parse text with the converter registered for `type_id`.
    pub fn from_text_dyn(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        text: &str,
    ) -> Result<Box<dyn Any + Send>> {
        let converter = self.lookup(type_id, type_name)?;
        (converter.from_text)(text)
    }

    fn lookup(&self, type_id: TypeId, type_name: &'static str) -> Result<&Converter> {
        self.converters.get(&type_id).ok_or_else(|| {
            Error::mapping(
                MappingErrorKind::UnsupportedFieldType,
                type_name,
                None,
                "no converter registered for this type",
            )
        })
    }
}

fn parse_with<T>(text: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    text.parse::<T>().map_err(|e| {
        Error::Conversion(ConversionError {
            target: std::any::type_name::<T>(),
            input: text.to_string(),
            message: e.to_string(),
        })
    })
}

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).map_err(|e| {
        Error::Conversion(ConversionError {
            target: "uuid::Uuid",
            input: text.to_string(),
            message: e.to_string(),
        })
    })
}

/// Accepts `true`/`false` in any case plus `1`/`0`.
fn parse_bool(text: &str) -> Result<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Ok(false)
    } else {
        Err(Error::Conversion(ConversionError {
            target: "bool",
            input: text.to_string(),
            message: "expected true, false, 1 or 0".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Any + PartialEq + fmt::Debug>(registry: &ConverterRegistry, value: T) {
        let text = registry.to_text(&value).unwrap();
        let back: T = registry.from_text(&text).unwrap();
        assert_eq!(back, value, "round trip through {text:?}");
    }

    #[test]
    fn builtin_round_trips_at_boundaries() {
        let r = ConverterRegistry::new();
        for v in [i8::MIN, -1, 0, i8::MAX] {
            round_trip(&r, v);
        }
        for v in [i16::MIN, 0, i16::MAX] {
            round_trip(&r, v);
        }
        for v in [i32::MIN, 0, i32::MAX] {
            round_trip(&r, v);
        }
        for v in [i64::MIN, 0, i64::MAX] {
            round_trip(&r, v);
        }
        for v in [u8::MIN, 0x7f, u8::MAX] {
            round_trip(&r, v);
        }
        round_trip(&r, true);
        round_trip(&r, false);
        round_trip(&r, String::new());
        round_trip(&r, "it's a value".to_string());
    }

    #[test]
    fn malformed_text_is_conversion_failure() {
        let r = ConverterRegistry::new();
        assert!(matches!(
            r.from_text::<i32>("twelve"),
            Err(Error::Conversion(_))
        ));
        assert!(matches!(r.from_text::<i8>("128"), Err(Error::Conversion(_))));
        assert!(matches!(r.from_text::<bool>("yes"), Err(Error::Conversion(_))));
        assert!(r.from_text::<bool>("TRUE").unwrap());
        assert!(!r.from_text::<bool>("0").unwrap());
    }

    #[test]
    fn wrong_runtime_type_is_rejected() {
        let r = ConverterRegistry::new();
        let err = r
            .to_text_as(TypeId::of::<i32>(), "i32", &"not an int".to_string())
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }

    #[test]
    fn missing_converter_is_unsupported_type() {
        let r = ConverterRegistry::new();
        let err = r.to_text(&1.5f64).unwrap_err();
        assert_eq!(
            err.mapping_kind(),
            Some(MappingErrorKind::UnsupportedFieldType)
        );
        assert!(!ConverterRegistry::empty().contains::<i32>());
    }

    #[test]
    fn custom_converter_replaces_and_extends() {
        #[derive(Debug, PartialEq)]
        struct Celsius(i32);

        let mut r = ConverterRegistry::new();
        r.register(
            |c: &Celsius| format!("{}C", c.0),
            |s| {
                s.trim_end_matches('C')
                    .parse()
                    .map(Celsius)
                    .map_err(|e: std::num::ParseIntError| Error::Custom(e.to_string()))
            },
        );
        assert_eq!(r.to_text(&Celsius(21)).unwrap(), "21C");
        round_trip(&r, Celsius(-4));

        r.register(|v: &i32| format!("#{v}"), |s| Ok(s.trim_start_matches('#').parse().unwrap_or(0)));
        assert_eq!(r.to_text(&5i32).unwrap(), "#5");
    }

    #[test]
    fn uuid_round_trips_through_dynamic_lookup() {
        let r = ConverterRegistry::new();
        let id = Uuid::from_u128(0x67e5_5044_10b1_426f_9247_bb68_0e5f_e0c8);

        let text = r.to_text_dyn(&id as &dyn Any).unwrap();
        assert_eq!(text, "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(r.from_text::<Uuid>(&text).unwrap(), id);
        assert_eq!(
            r.from_text::<Uuid>("67E55044-10B1-426F-9247-BB680E5FE0C8").unwrap(),
            id
        );

        match r.from_text::<Uuid>("not-a-uuid") {
            Err(Error::Conversion(e)) => {
                assert_eq!(e.target, "uuid::Uuid");
                assert_eq!(e.input, "not-a-uuid");
            }
            other => panic!("expected conversion error, got {other:?}"),
        }
    }

    #[test]
    fn dynamic_lookup_uses_runtime_type() {
        let r = ConverterRegistry::new();
        let boxed: Box<dyn Any + Send> = Box::new(77i64);
        assert_eq!(r.to_text_dyn(&*boxed).unwrap(), "77");
    }
}
