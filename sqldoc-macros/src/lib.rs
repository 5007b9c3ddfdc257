//! Procedural macros for the sqldoc project.
//!
//! This crate provides compile-time code generation for sqldoc, currently the
//! `Document` derive.

#[allow(unused_extern_crates)]
extern crate self as sqldoc_macros;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr};

/// Derives `sqldoc::document::Document`.
///
/// The table name defaults to the type's identifier, unmodified. Override it with
/// `#[document(table = "people")]`.
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Document)]
/// #[document(table = "PersonCs")]
/// struct Person {
///     name: String,
/// }
/// ```
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    let mut table = ident.to_string();

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("document")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = meta.value()?.parse::<LitStr>()?.value();
                Ok(())
            } else {
                Err(meta.error("unsupported document attribute, expected `table`"))
            }
        })?;
    }

    if table.is_empty() {
        return Err(syn::Error::new_spanned(ident, "document table name must not be empty"));
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::sqldoc::document::Document for #ident #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table
            }
        }
    })
}
