/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
#![forbid(unsafe_code)]

//! Transit Macro Library
//!
//! Procedural macros for the Transit message bus.
//!
//! # Message Macro
//!
//! The [`transit_message`] macro turns a struct or enum into a bus message:
//!
//! ```ignore
//! #[transit_message]
//! pub struct PingMessage {
//!     pub correlation_id: Uuid,
//! }
//!
//! #[transit_message(urn = "urn:message:billing:InvoiceIssued")]
//! pub struct InvoiceIssued {
//!     pub number: u64,
//! }
//! ```

use proc_macro::TokenStream;

use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr};

fn has_derive(input: &DeriveInput, trait_name: &str) -> bool {
    input.attrs.iter().any(|attr| {
        if attr.path().is_ident("derive") {
            let mut found = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.segments.last().is_some_and(|segment| segment.ident == trait_name) {
                    found = true;
                }
                Ok(())
            });
            found
        } else {
            false
        }
    })
}

/// Options parsed from `#[transit_message(...)]`.
#[derive(Default)]
struct MessageConfig {
    /// Explicit message-type URN.
    urn: Option<LitStr>,
}

/// Derives the traits a bus message needs and implements `BusMessage`.
///
/// This expands to:
/// - `#[derive(Clone, Debug, Serialize, Deserialize)]`, skipping any already present
/// - `impl BusMessage` with `MESSAGE_TYPE` set to
///   `urn:message:<module path>:<TypeName>`, or to the `urn` given in the attribute
///
/// The URN is what receivers dispatch on, so set it explicitly for messages shared
/// with other crates or processes whose module paths differ.
///
/// Generic messages are rejected: every message type needs one fixed URN.
#[proc_macro_attribute]
pub fn transit_message(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut config = MessageConfig::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("urn") {
            config.urn = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported transit_message option; expected `urn = \"...\"`"))
        }
    });
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as DeriveInput);
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(&input.generics, "transit messages cannot be generic")
            .to_compile_error()
            .into();
    }

    let derives = {
        let mut traits = Vec::new();
        if !has_derive(&input, "Clone") {
            traits.push(quote!(Clone));
        }
        if !has_derive(&input, "Debug") {
            traits.push(quote!(Debug));
        }
        let mut serde_added = false;
        if !has_derive(&input, "Serialize") {
            traits.push(quote!(::transit::serde::Serialize));
            serde_added = true;
        }
        if !has_derive(&input, "Deserialize") {
            traits.push(quote!(::transit::serde::Deserialize));
            serde_added = true;
        }
        let serde_crate = if serde_added {
            quote!(#[serde(crate = "::transit::serde")])
        } else {
            quote!()
        };
        if traits.is_empty() {
            quote!()
        } else {
            quote! {
                #[derive(#(#traits),*)]
                #serde_crate
            }
        }
    };

    let message_type = config.urn.map_or_else(
        || quote!(concat!("urn:message:", module_path!(), ":", stringify!(#name))),
        |urn| quote!(#urn),
    );

    let expanded = quote! {
        #derives
        #input

        impl ::transit::prelude::BusMessage for #name {
            const MESSAGE_TYPE: &'static str = #message_type;
        }
    };

    TokenStream::from(expanded)
}
