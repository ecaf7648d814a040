extern crate proc_macro;

macro_rules! bail {
    ($item:expr, $fmt:literal $($tts:tt)*) => {
        return Err(Error::new_spanned(
            &$item,
            format!(concat!("effect-memo: ", $fmt) $($tts)*)
        ))
    }
}

mod capability;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Error, Result};

/// Make a type usable as a capability of an effect's environment.
///
/// ```ignore
/// #[derive(Clone, Capability)]
/// struct Clock {
///     offset: i64,
/// }
/// ```
///
/// A capability that holds resources which must be released at the end of a
/// caller's scope is marked as scoped. Effects that require it can't be
/// memoized:
///
/// ```ignore
/// #[derive(Clone, Capability)]
/// #[capability(scoped = true)]
/// struct Connection(Pool);
/// ```
#[proc_macro_derive(Capability, attributes(capability))]
pub fn capability(stream: TokenStream) -> TokenStream {
    let item = syn::parse_macro_input!(stream as syn::DeriveInput);
    capability::expand(&item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
