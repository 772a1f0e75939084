//! `#[tap_test]` for esp32-cam-node.
//!
//! Registers a function as an `esp32_cam_node::testing::TapCase` so the
//! `device-tests` binary picks it up on host, QEMU or the board.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::{Parse, Parser};
use syn::{parse_macro_input, Expr, ExprLit, ItemFn, Lit, Meta, ReturnType};

/// Mark a function as a TAP test.
///
/// The function may return nothing (a panic fails it) or a `Result` whose
/// error converts into `Box<dyn Error + Send + Sync>`.
///
/// - `#[tap_test]`
/// - `#[tap_test(should_panic)]`
/// - `#[tap_test(should_panic = "text the message must contain")]`
#[proc_macro_attribute]
pub fn tap_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let expect = match parse_expect(attr.into()) {
        Ok(expect) => expect,
        Err(e) => return e.to_compile_error().into(),
    };

    if !input.sig.inputs.is_empty() {
        return syn::Error::new_spanned(&input.sig.inputs, "tap_test functions take no arguments")
            .to_compile_error()
            .into();
    }

    let name = &input.sig.ident;
    let name_str = name.to_string();
    let wrapper = format_ident!("__tap_case_{}", name);

    let call = match &input.sig.output {
        ReturnType::Default => quote! { #name(); },
        ReturnType::Type(_, _) => quote! { #name()?; },
    };

    let expanded = quote! {
        #input

        #[doc(hidden)]
        fn #wrapper() -> ::esp32_cam_node::testing::TestResult {
            #call
            Ok(())
        }

        ::esp32_cam_node::testing::inventory::submit! {
            ::esp32_cam_node::testing::TapCase {
                name: #name_str,
                module: module_path!(),
                expect: #expect,
                body: #wrapper,
            }
        }
    };

    expanded.into()
}

fn parse_expect(attr: TokenStream2) -> syn::Result<TokenStream2> {
    let pass = quote! { ::esp32_cam_node::testing::Expect::Pass };
    if attr.is_empty() {
        return Ok(pass);
    }

    let meta = Meta::parse.parse2(attr)?;
    if !meta.path().is_ident("should_panic") {
        return Err(syn::Error::new_spanned(
            meta.path(),
            "unknown tap_test option, expected should_panic",
        ));
    }

    match meta {
        Meta::Path(_) => Ok(quote! { ::esp32_cam_node::testing::Expect::Panic(None) }),
        Meta::NameValue(nv) => match nv.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(text),
                ..
            }) => Ok(quote! { ::esp32_cam_node::testing::Expect::Panic(Some(#text)) }),
            other => Err(syn::Error::new_spanned(
                other,
                "should_panic expects a string literal",
            )),
        },
        Meta::List(list) => Err(syn::Error::new_spanned(
            list,
            "use should_panic or should_panic = \"message\"",
        )),
    }
}
