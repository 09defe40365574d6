//! Parsing logic for the DatabaseObject derive macro.
//!
//! This module extracts struct-level and field-level `#[database(...)]`
//! attributes from the derive input to build the `ObjectDef` used for code
//! generation.

use proc_macro2::Span;
use quote::ToTokens;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitInt, LitStr,
    Path, PathArguments, Result, Token, Type,
};

/// Parsed definition of a struct with `#[derive(DatabaseObject)]`.
#[derive(Debug)]
pub struct ObjectDef {
    pub name: Ident,
    /// Mapped fields in declaration order. Unmarked fields are absent.
    pub fields: Vec<FieldDef>,
    /// Accessor members, after the fields, in attribute order.
    pub accessors: Vec<AccessorDef>,
    pub constructor: Option<ConstructorAttr>,
    pub row_constructor: Option<RowConstructorAttr>,
}

/// A mapped struct field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    pub column_name: String,
    pub groups: Vec<i32>,
    pub ty: Type,
}

/// `#[database(accessor(method = "m", column = "c", groups(..)))]`
#[derive(Debug)]
pub struct AccessorDef {
    pub method: Ident,
    pub column_name: String,
    pub groups: Vec<i32>,
}

/// The designated zero-argument constructor.
#[derive(Debug)]
pub enum ConstructorAttr {
    /// Bare `constructor`: `Default::default`.
    Default,
    /// `constructor = "path"`; a single identifier names an associated function.
    Path(Path),
}

/// `#[database(row_constructor(method = "new", columns("a", "b"), fallible))]`
#[derive(Debug)]
pub struct RowConstructorAttr {
    pub method: Ident,
    pub columns: Vec<String>,
    pub fallible: bool,
}

/// Parse the derive input into an `ObjectDef`.
pub fn parse_object(input: &DeriveInput) -> Result<ObjectDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "DatabaseObject cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "DatabaseObject can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "DatabaseObject can only be derived for structs, not unions",
            ));
        }
    };

    let attrs = parse_struct_attrs(&input.attrs)?;

    Ok(ObjectDef {
        name,
        fields,
        accessors: attrs.accessors,
        constructor: attrs.constructor,
        row_constructor: attrs.row_constructor,
    })
}

#[derive(Default)]
struct StructAttrs {
    accessors: Vec<AccessorDef>,
    constructor: Option<ConstructorAttr>,
    row_constructor: Option<RowConstructorAttr>,
}

/// Parse struct-level `#[database(...)]` attributes.
///
/// Supported keys:
/// - `constructor` / `constructor = "fn"`
/// - `accessor(method = "m", column = "c", groups(1, 2))`, repeatable
/// - `row_constructor(method = "new", columns("a", "b"), fallible)`
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut result = StructAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("database") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("constructor") {
                if result.constructor.is_some() {
                    return Err(meta.error("duplicate database attribute: constructor"));
                }
                result.constructor = Some(if meta.input.peek(Token![=]) {
                    let lit: LitStr = meta.value()?.parse()?;
                    ConstructorAttr::Path(lit.parse()?)
                } else {
                    ConstructorAttr::Default
                });
            } else if meta.path.is_ident("accessor") {
                result.accessors.push(parse_accessor(&meta)?);
            } else if meta.path.is_ident("row_constructor") {
                if result.row_constructor.is_some() {
                    return Err(meta.error("duplicate database attribute: row_constructor"));
                }
                result.row_constructor = Some(parse_row_constructor(&meta)?);
            } else {
                return Err(meta.error(format!(
                    "unknown database struct attribute `{}`",
                    meta.path.to_token_stream()
                )));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn parse_accessor(meta: &ParseNestedMeta<'_>) -> Result<AccessorDef> {
    let mut method: Option<Ident> = None;
    let mut column: Option<String> = None;
    let mut groups = Vec::new();

    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("method") {
            let lit: LitStr = nested.value()?.parse()?;
            method = Some(lit.parse()?);
        } else if nested.path.is_ident("column") {
            let lit: LitStr = nested.value()?.parse()?;
            column = Some(lit.value());
        } else if nested.path.is_ident("groups") {
            groups = parse_groups(&nested)?;
        } else {
            return Err(nested.error("expected `method`, `column` or `groups`"));
        }
        Ok(())
    })?;

    let method = method.ok_or_else(|| meta.error("accessor requires `method = \"...\"`"))?;
    let column_name = column.unwrap_or_else(|| method.to_string());
    Ok(AccessorDef {
        method,
        column_name,
        groups,
    })
}

fn parse_row_constructor(meta: &ParseNestedMeta<'_>) -> Result<RowConstructorAttr> {
    let mut method: Option<Ident> = None;
    let mut columns: Option<Vec<String>> = None;
    let mut fallible = false;

    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("method") {
            let lit: LitStr = nested.value()?.parse()?;
            method = Some(lit.parse()?);
        } else if nested.path.is_ident("columns") {
            let content;
            syn::parenthesized!(content in nested.input);
            let lits = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
            columns = Some(lits.iter().map(LitStr::value).collect());
        } else if nested.path.is_ident("fallible") {
            fallible = true;
        } else {
            return Err(nested.error("expected `method`, `columns` or `fallible`"));
        }
        Ok(())
    })?;

    let columns = columns.ok_or_else(|| meta.error("row_constructor requires `columns(...)`"))?;
    if columns.is_empty() || columns.len() > 8 {
        return Err(meta.error("row_constructor takes between 1 and 8 columns"));
    }
    Ok(RowConstructorAttr {
        method: method.unwrap_or_else(|| Ident::new("new", Span::call_site())),
        columns,
        fallible,
    })
}

/// Parse `groups(1, 2, ...)`.
fn parse_groups(meta: &ParseNestedMeta<'_>) -> Result<Vec<i32>> {
    let content;
    syn::parenthesized!(content in meta.input);
    let lits = Punctuated::<LitInt, Token![,]>::parse_terminated(&content)?;
    lits.iter().map(LitInt::base10_parse::<i32>).collect()
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => {
            let mut out = Vec::new();
            for field in &named.named {
                if let Some(def) = parse_field(field)? {
                    out.push(def);
                }
            }
            Ok(out)
        }
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "DatabaseObject requires a struct with named fields, not a tuple struct",
        )),
        // A unit struct maps nothing but may still carry accessors.
        Fields::Unit => Ok(Vec::new()),
    }
}

/// Parse a single field. Fields without a `#[database]` marker are not mapped.
fn parse_field(field: &Field) -> Result<Option<FieldDef>> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut mapped = false;
    let mut column: Option<String> = None;
    let mut groups = Vec::new();

    for attr in &field.attrs {
        if !attr.path().is_ident("database") {
            continue;
        }
        mapped = true;

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("field") {
                Ok(())
            } else if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                column = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("groups") {
                groups = parse_groups(&meta)?;
                Ok(())
            } else {
                Err(meta.error(format!(
                    "unknown database field attribute `{}`",
                    meta.path.to_token_stream()
                )))
            }
        })?;
    }

    if !mapped {
        return Ok(None);
    }

    let column_name = column.unwrap_or_else(|| {
        let raw = name.to_string();
        raw.strip_prefix("r#").map(str::to_string).unwrap_or(raw)
    });

    Ok(Some(FieldDef {
        name,
        column_name,
        groups,
        ty: field.ty.clone(),
    }))
}

/// The base-type variant name for a field type, looking through `Option<T>`.
pub fn base_type_variant(ty: &Type) -> Option<&'static str> {
    let segment = last_segment(ty)?;
    if segment.ident == "Option" {
        let PathArguments::AngleBracketed(args) = &segment.arguments else {
            return None;
        };
        return match args.args.first() {
            Some(GenericArgument::Type(inner)) => plain_base_type(inner),
            _ => None,
        };
    }
    plain_base_type(ty)
}

fn plain_base_type(ty: &Type) -> Option<&'static str> {
    let segment = last_segment(ty)?;
    if !segment.arguments.is_empty() {
        return None;
    }
    match segment.ident.to_string().as_str() {
        "bool" => Some("Bool"),
        "i8" => Some("TinyInt"),
        "i16" => Some("SmallInt"),
        "i32" => Some("Int"),
        "i64" => Some("BigInt"),
        "u8" => Some("Byte"),
        "String" => Some("Text"),
        _ => None,
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => type_path.path.segments.last(),
        _ => None,
    }
}

/// Compact type text for error messages, e.g. `Option<i32>`.
pub fn type_text(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}
