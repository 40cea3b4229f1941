use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Type};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = generate_injectable_impl(&input).unwrap_or_else(|err| err.to_compile_error());
    TokenStream::from(expanded)
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let construct = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                let field_injections = fields.named.iter().map(|field| {
                    let field_name = &field.ident;
                    let field_type = extract_injectable_type(&field.ty);
                    let resolve = resolve_method(&field_type);
                    quote! { #field_name: container.#resolve::<#field_type>()? }
                });
                quote! { Self { #(#field_injections),* } }
            }
            Fields::Unit => quote! { Self },
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "#[derive(Injectable)] only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::switchyard::Injectable for #struct_name #ty_generics #where_clause {
            fn inject(
                container: &::switchyard::Container
            ) -> ::switchyard::Result<Self> {
                let _ = container;
                Ok(#construct)
            }
        }
    })
}

/// `dyn Trait` fields resolve through the trait mapping, everything else by type.
pub(crate) fn resolve_method(field_type: &Type) -> TokenStream2 {
    match field_type {
        Type::TraitObject(_) => quote!(resolve_trait),
        _ => quote!(resolve),
    }
}

/// Extract the inner type from Arc<T> or Arc<dyn Trait>
pub(crate) fn extract_injectable_type(ty: &Type) -> Type {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Arc" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner_type)) = args.args.first() {
                        return inner_type.clone();
                    }
                }
            }
        }
    }

    ty.clone()
}
