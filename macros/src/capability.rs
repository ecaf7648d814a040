use syn::parse::{Parse, ParseStream};

use super::*;

mod kw {
    syn::custom_keyword!(scoped);
}

/// Implement `Capability` and `Environment` for a type.
pub fn expand(item: &syn::DeriveInput) -> Result<proc_macro2::TokenStream> {
    if let Some(param) = item.generics.params.first() {
        bail!(param, "capabilities cannot be generic")
    }

    let flag = if scoped(&item.attrs)? {
        quote! { ::effect_memo::Yes }
    } else {
        quote! { ::effect_memo::No }
    };

    let ty = &item.ident;
    Ok(quote! {
        impl ::effect_memo::Capability for #ty {
            type Scoped = #flag;
        }

        impl ::effect_memo::Environment for #ty {
            type Scoped = #flag;
        }
    })
}

/// Whether a `#[capability(scoped = ..)]` attribute marks the type as scoped.
///
/// The last attribute wins.
fn scoped(attrs: &[syn::Attribute]) -> Result<bool> {
    let mut scoped = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("capability")) {
        scoped = attr.parse_args::<Options>()?.scoped.value;
    }
    Ok(scoped)
}

/// The contents of a `#[capability(..)]` attribute.
struct Options {
    scoped: syn::LitBool,
}

impl Parse for Options {
    fn parse(input: ParseStream) -> Result<Self> {
        if !input.peek(kw::scoped) {
            return Err(input.error(
                "effect-memo: expected `scoped = true` or `scoped = false`",
            ));
        }

        input.parse::<kw::scoped>()?;
        input.parse::<syn::Token![=]>()?;
        let scoped = input.parse()?;
        if input.peek(syn::Token![,]) {
            input.parse::<syn::Token![,]>()?;
        }
        Ok(Self { scoped })
    }
}
