//! Derive macros for automata state machines
//!
//! This crate provides procedural macros that remove the boilerplate around
//! the two pieces of glue every machine needs.
//!
//! # Available Macros
//!
//! - `#[derive(Command)]` - Generates the 1:1 `Command` interpretation into an event enum
//! - `#[derive(Context)]` - Generates `with_*` builders and `is_complete()` for accumulators
//!
//! # Example
//!
//! ```ignore
//! use automata_macros::{Command, Context};
//!
//! #[derive(Clone, Debug)]
//! enum PinEvent {
//!     Digit(u8),
//!     Back,
//!     Reset,
//! }
//!
//! #[derive(Command)]
//! #[command(event = PinEvent)]
//! enum Keypad {
//!     Digit(u8),
//!     #[command(rename = Back)]
//!     Delete,
//!     Reset,
//! }
//!
//! #[derive(Context, Clone, Default)]
//! struct Fetched {
//!     balance: Option<u128>,
//!     price: Option<f64>,
//! }
//!
//! assert!(Fetched::default().with_balance(1).with_price(2.0).is_complete());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, Path, PathArguments, Type, parse_macro_input};

/// Derive macro for command types
///
/// Implements `automata_core::Command` by mapping every variant to the event
/// variant of the same name, moving its fields across unchanged.
///
/// # Attributes
///
/// - `#[command(event = Path)]` on the type (required) - the event enum
/// - `#[command(event = Self)]` on the type - the type is its own event (identity)
/// - `#[command(rename = Variant)]` on a variant - map to a differently named event variant
///
/// # Errors
///
/// Produces a compile error (not a runtime panic) if:
/// - `#[command(event = ...)]` is missing
/// - Applied to a struct or union without `event = Self`
/// - An attribute key is not recognised
///
/// # Example
///
/// ```ignore
/// #[derive(Command)]
/// #[command(event = SessionEvent)]
/// enum SessionCommand {
///     Start,
///     #[command(rename = Lock)]
///     Background,
///     Unlock { from_lock: bool },
/// }
///
/// assert!(matches!(SessionCommand::Background.interpret(), SessionEvent::Lock));
/// ```
#[proc_macro_derive(Command, attributes(command))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_command(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// `events::Remote<T>` as `events::Remote::<T>`, so variants can be appended
/// in expression position.
fn expression_path(event: &Path) -> Path {
    let mut path = event.clone();
    for segment in &mut path.segments {
        if let PathArguments::AngleBracketed(arguments) = &mut segment.arguments {
            arguments.colon2_token.get_or_insert_with(Default::default);
        }
    }
    path
}

fn expand_command(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Some(event) = command_event(&input.attrs)? else {
        return Err(syn::Error::new_spanned(
            name,
            "#[derive(Command)] requires #[command(event = EventType)]",
        ));
    };

    if event.is_ident("Self") {
        return Ok(quote! {
            impl #impl_generics ::automata_core::command::Command for #name #ty_generics #where_clause {
                type Event = Self;

                fn interpret(self) -> Self {
                    self
                }
            }
        });
    }

    let Data::Enum(data_enum) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "#[derive(Command)] maps variants, so it can only be used on enums (or with `event = Self`)",
        ));
    };

    let constructor = expression_path(&event);
    let mut arms = Vec::with_capacity(data_enum.variants.len());
    for variant in &data_enum.variants {
        let source = &variant.ident;
        let target = variant_rename(&variant.attrs)?.unwrap_or_else(|| source.clone());

        let arm = match &variant.fields {
            Fields::Unit => quote! {
                Self::#source => #constructor::#target
            },
            Fields::Unnamed(fields) => {
                let bindings: Vec<Ident> = (0..fields.unnamed.len())
                    .map(|index| format_ident!("field_{}", index))
                    .collect();
                quote! {
                    Self::#source(#(#bindings),*) => #constructor::#target(#(#bindings),*)
                }
            },
            Fields::Named(fields) => {
                let bindings: Vec<&Ident> = fields
                    .named
                    .iter()
                    .filter_map(|field| field.ident.as_ref())
                    .collect();
                quote! {
                    Self::#source { #(#bindings),* } => #constructor::#target { #(#bindings),* }
                }
            },
        };
        arms.push(arm);
    }

    Ok(quote! {
        impl #impl_generics ::automata_core::command::Command for #name #ty_generics #where_clause {
            type Event = #event;

            fn interpret(self) -> #event {
                match self {
                    #(#arms,)*
                }
            }
        }
    })
}

/// `event = Path` from the container's `#[command(...)]` attributes
fn command_event(attrs: &[Attribute]) -> syn::Result<Option<Path>> {
    let mut event = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("command")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("event") {
                event = Some(meta.value()?.parse::<Path>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported #[command] key on a type, expected `event`"))
            }
        })?;
    }
    Ok(event)
}

/// `rename = Variant` from a variant's `#[command(...)]` attributes
fn variant_rename(attrs: &[Attribute]) -> syn::Result<Option<Ident>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("command")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                rename = Some(meta.value()?.parse::<Ident>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported #[command] key on a variant, expected `rename`"))
            }
        })?;
    }
    Ok(rename)
}

/// Derive macro for partial-result accumulators
///
/// Generates, for a struct with named fields:
/// - `with_<field>(self, value) -> Self` for every field; `Option<T>` fields
///   take a `T` and store `Some(value)`, so re-applying a value is idempotent
/// - `is_complete(&self) -> bool`, true once every `Option` field is `Some`
///
/// # Attributes
///
/// - `#[context(optional)]` on an `Option` field - leave it out of `is_complete()`
///
/// # Example
///
/// ```ignore
/// #[derive(Context, Clone, Debug, Default, PartialEq)]
/// struct AccountContext {
///     wallet: Option<Wallet>,
///     balance: Option<u128>,
///     #[context(optional)]
///     note: Option<String>,
/// }
///
/// let ctx = AccountContext::default().with_balance(5);
/// assert!(!ctx.is_complete());
/// assert_eq!(ctx.clone().with_balance(5), ctx);
/// ```
#[proc_macro_derive(Context, attributes(context))]
pub fn derive_context(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_context(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_context(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "#[derive(Context)] requires a struct with named fields",
                ));
            },
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "#[derive(Context)] can only be used on structs",
            ));
        },
    };

    let mut setters = Vec::with_capacity(fields.len());
    let mut required = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let setter = format_ident!("with_{}", ident);
        let doc = format!("Return a copy with `{ident}` set");

        if let Some(inner) = option_inner(&field.ty) {
            setters.push(quote! {
                #[doc = #doc]
                #[must_use]
                pub fn #setter(self, #ident: #inner) -> Self {
                    Self { #ident: ::core::option::Option::Some(#ident), ..self }
                }
            });
            if !is_optional(&field.attrs)? {
                required.push(quote! { self.#ident.is_some() });
            }
        } else {
            let ty = &field.ty;
            setters.push(quote! {
                #[doc = #doc]
                #[must_use]
                pub fn #setter(self, #ident: #ty) -> Self {
                    Self { #ident, ..self }
                }
            });
        }
    }

    let complete = if required.is_empty() {
        quote! { true }
    } else {
        quote! { #(#required)&&* }
    };

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#setters)*

            /// Whether every required partial result has arrived
            #[must_use]
            pub const fn is_complete(&self) -> bool {
                #complete
            }
        }
    })
}

/// `T` when `ty` is written as `Option<T>`
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    match arguments.args.first() {
        Some(GenericArgument::Type(inner)) if arguments.args.len() == 1 => Some(inner),
        _ => None,
    }
}

/// Whether the field carries `#[context(optional)]`
fn is_optional(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut optional = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("context")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("optional") {
                optional = true;
                Ok(())
            } else {
                Err(syn::Error::new(
                    Span::call_site(),
                    "unsupported #[context] key, expected `optional`",
                ))
            }
        })?;
    }
    Ok(optional)
}
