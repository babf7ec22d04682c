#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Derive
//!
//! Procedural macros shared by the Hearth infrastructure crates.
//!
//! The only macro today is [`macro@hearth_error`], which turns a plain enum into the
//! error type every crate in the workspace exposes.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for defining crate error enums.
///
/// # Features
///
/// * **Automatic Derives**: adds `#[derive(Debug, thiserror::Error)]` unless already present.
/// * **Context Support**: generates a companion `<Name>Ext` trait with `.context(...)` for
///   `Result<T, Name>`, and for `Result<T, Source>` when a variant wraps a source error.
/// * **Source Conversions**: implements `From<Source>` for variants with a `source` field
///   (or a field marked `#[source]`/`#[from]`), so `?` works on upstream errors.
/// * **Internal Fallback**: implements `From<&'static str>` and `From<String>` when an
///   `Internal { message, context }` variant exists.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants only.
/// 2. A `context` field, when present, must be `Option<Cow<'static, str>>`.
/// 3. Variants that wrap a source error must also carry a `context` field.
///
/// # Example
///
/// ```rust,ignore
/// use hearth_derive::hearth_error;
/// use std::borrow::Cow;
///
/// #[hearth_error]
/// pub enum StoreError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &str) -> Result<String, StoreError> {
///     std::fs::read_to_string(path).context("Reading store snapshot")
/// }
/// ```
#[proc_macro_attribute]
pub fn hearth_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand(input).into()
}
