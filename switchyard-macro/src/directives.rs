use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;

/// `#[routes]` strips every routing directive from the methods it compiles,
/// so a directive that expands on its own sits outside such an impl.
pub fn outside_routes(directive: &str, item: TokenStream) -> TokenStream {
    let message = format!("#[{directive}] has no effect outside a #[routes] impl block");
    let error = syn::Error::new(Span::call_site(), message).to_compile_error();
    let item = TokenStream2::from(item);
    TokenStream::from(quote! {
        #error
        #item
    })
}
