//! Procedural macros for SimpleDB.
//!
//! `simpledb-macros` is the **compile-time codegen layer**. It turns a Rust
//! struct into a static object schema: one `FieldInfo` per mapped member with
//! type-erased getters, native setters for base-type fields, and the
//! designated constructors. The mapper in `simpledb-core` reads that table
//! instead of inspecting objects at runtime.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};

mod parse;

use parse::{ConstructorAttr, ObjectDef, parse_object};

/// Derive macro for the `DatabaseObject` trait.
///
/// # Attributes
///
/// Field level (a field is mapped only if it carries one of these):
/// - `#[database(field)]` - map under the field name and default group `0`
/// - `#[database(column = "name")]` - override the column name
/// - `#[database(groups(1, 2))]` - set the group tags
///
/// Struct level:
/// - `#[database(constructor)]` - `Default::default` is the zero-argument constructor
/// - `#[database(constructor = "empty")]` - `Self::empty` (or any path) is
/// - `#[database(accessor(method = "label", column = "c", groups(..)))]` -
///   read-only member backed by `fn label(&self) -> T`
/// - `#[database(row_constructor(method = "new", columns("a", "b"), fallible))]` -
///   ordered-argument constructor; `fallible` when it returns `Result<Self, E>`
///
/// # Example
///
/// ```ignore
/// use simpledb::DatabaseObject;
///
/// #[derive(Default, DatabaseObject)]
/// #[database(constructor)]
/// #[database(row_constructor(columns("id", "user_name")))]
/// struct User {
///     #[database(field)]
///     id: i32,
///     #[database(column = "user_name", groups(0, 1))]
///     name: String,
///     session: Option<Token>,
/// }
/// ```
#[proc_macro_derive(DatabaseObject, attributes(database))]
pub fn derive_database_object(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let object = match parse_object(&input) {
        Ok(o) => o,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_object_impl(&object).into()
}

/// Generate the DatabaseObject implementation from the parsed definition.
fn generate_object_impl(object: &ObjectDef) -> TokenStream2 {
    let name = &object.name;
    let type_name = name.to_string();
    let field_infos = generate_field_infos(object);
    let constructor = generate_constructor(object);
    let (row_builder, row_constructor) = generate_row_constructor(object);

    quote! {
        impl simpledb_core::DatabaseObject for #name {
            fn schema() -> &'static simpledb_core::ObjectSchema<Self> {
                static FIELDS: &[simpledb_core::FieldInfo<#name>] = &[
                    #(#field_infos),*
                ];

                #row_builder

                static SCHEMA: simpledb_core::ObjectSchema<#name> =
                    simpledb_core::ObjectSchema::new(#type_name, FIELDS)
                        #constructor
                        #row_constructor;

                &SCHEMA
            }
        }
    }
}

/// Field entries, then accessor entries.
fn generate_field_infos(object: &ObjectDef) -> Vec<TokenStream2> {
    let name = &object.name;
    let mut entries = Vec::new();

    for field in &object.fields {
        let ident = &field.name;
        let member_name = ident.to_string().trim_start_matches("r#").to_string();
        let column = &field.column_name;
        let groups = &field.groups;
        let type_text = parse::type_text(&field.ty);

        let assignable = parse::base_type_variant(&field.ty).map(|variant| {
            let variant = format_ident!("{}", variant);
            quote! {
                .assignable(
                    simpledb_core::BaseType::#variant,
                    |obj: &mut #name, value: &simpledb_core::Value| {
                        simpledb_core::field::assign(&mut obj.#ident, value, #column)
                    },
                )
            }
        });

        entries.push(quote! {
            simpledb_core::FieldInfo::new(#member_name, #type_text, |obj: &#name| {
                simpledb_core::field::erase(::core::clone::Clone::clone(&obj.#ident))
            })
            .column(#column)
            .groups(&[#(#groups),*])
            #assignable
        });
    }

    for accessor in &object.accessors {
        let method = &accessor.method;
        let method_name = method.to_string();
        let type_text = format!("{}()", method_name);
        let column = &accessor.column_name;
        let groups = &accessor.groups;

        entries.push(quote! {
            simpledb_core::FieldInfo::new(#method_name, #type_text, |obj: &#name| {
                simpledb_core::field::erase(obj.#method())
            })
            .column(#column)
            .groups(&[#(#groups),*])
            .accessor()
        });
    }

    entries
}

fn generate_constructor(object: &ObjectDef) -> TokenStream2 {
    let name = &object.name;
    match &object.constructor {
        None => quote! {},
        Some(ConstructorAttr::Default) => quote! {
            .constructor(<#name as ::core::default::Default>::default)
        },
        Some(ConstructorAttr::Path(path)) => {
            if let Some(ident) = path.get_ident() {
                quote! { .constructor(#name::#ident) }
            } else {
                quote! { .constructor(#path) }
            }
        }
    }
}

/// The row builder fn item and the `.row_constructor(..)` call using it.
fn generate_row_constructor(object: &ObjectDef) -> (TokenStream2, TokenStream2) {
    let Some(rc) = &object.row_constructor else {
        return (quote! {}, quote! {});
    };
    let name = &object.name;
    let type_name = name.to_string();
    let method = &rc.method;
    let columns = &rc.columns;
    let invoke = if rc.fallible {
        quote! { simpledb_core::schema::invoke_fallible_row_constructor }
    } else {
        quote! { simpledb_core::schema::invoke_row_constructor }
    };

    let builder = quote! {
        fn build_from_row(
            values: &[::core::option::Option<::std::string::String>],
            converters: &simpledb_core::ConverterRegistry,
        ) -> simpledb_core::Result<#name> {
            #invoke(#name::#method, values, converters, #type_name)
        }
    };
    let call = quote! {
        .row_constructor(&[#(#columns),*], build_from_row)
    };
    (builder, call)
}
