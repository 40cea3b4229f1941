use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use switchyard_meta::directive::DirectiveArgs;
use switchyard_meta::extract::{extract_controller, is_method_directive, is_param_directive};
use syn::{parse::Parse, parse::ParseStream, parse_macro_input, FnArg, ImplItem, ItemImpl, ItemStruct};

struct ControllerArgs {
    path: String,
    name: Option<String>,
}

impl Parse for ControllerArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let args: DirectiveArgs = input.parse()?;
        Ok(ControllerArgs {
            path: args.text("path").unwrap_or_else(|| "/".to_string()),
            name: args.named_text("name").filter(|n| !n.is_empty()),
        })
    }
}

pub fn controller_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ControllerArgs);
    let input = parse_macro_input!(item as ItemStruct);
    let expanded = generate_controller_impl(&args, &input);
    TokenStream::from(expanded)
}

fn generate_controller_impl(args: &ControllerArgs, input: &ItemStruct) -> TokenStream2 {
    let struct_name = &input.ident;
    let base_path = &args.path;
    let controller_name = args
        .name
        .clone()
        .unwrap_or_else(|| struct_name.to_string());
    let injectable_impl = match generate_injectable_for_controller(input) {
        Ok(tokens) => tokens,
        Err(err) => return err.to_compile_error(),
    };
    quote! {
        #input
        #injectable_impl
        impl ::switchyard::controller::ControllerInfo for #struct_name {
            const NAME: &'static str = #controller_name;
            const BASE_PATH: &'static str = #base_path;
        }
    }
}

fn generate_injectable_for_controller(input: &ItemStruct) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let construct = match &input.fields {
        syn::Fields::Named(fields) => {
            let field_injections = fields.named.iter().map(|field| {
                let field_name = &field.ident;
                let field_type = crate::injectable::extract_injectable_type(&field.ty);
                let resolve = crate::injectable::resolve_method(&field_type);
                quote! { #field_name: container.#resolve::<#field_type>()? }
            });
            quote! { Self { #(#field_injections),* } }
        }
        syn::Fields::Unit => quote! { Self },
        syn::Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[controller] supports structs with named fields or unit structs",
            ))
        }
    };
    Ok(quote! {
        impl ::switchyard::Injectable for #struct_name {
            fn inject(container: &::switchyard::Container) -> ::switchyard::Result<Self> {
                let _ = container;
                Ok(#construct)
            }
        }
    })
}

pub fn routes_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    let expanded = generate_routes_impl(input).unwrap_or_else(|err| err.to_compile_error());
    TokenStream::from(expanded)
}

fn self_type_name(input: &ItemImpl) -> syn::Result<String> {
    match &*input.self_ty {
        syn::Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .ok_or_else(|| syn::Error::new_spanned(&input.self_ty, "expected a named type")),
        other => Err(syn::Error::new_spanned(
            other,
            "#[routes] must be applied to an inherent impl of a named controller",
        )),
    }
}

fn generate_routes_impl(input: ItemImpl) -> syn::Result<TokenStream2> {
    let controller = self_type_name(&input)?;
    let extraction = extract_controller(&controller, "", &input);

    let rules_json = serde_json::to_string(&extraction.rules)
        .map_err(|e| syn::Error::new_spanned(&input.self_ty, e.to_string()))?;

    let mut clean_items: Vec<ImplItem> = Vec::new();
    for item in input.items.iter() {
        if let ImplItem::Fn(method) = item {
            let mut clean_method = method.clone();
            clean_method.attrs.retain(|attr| !is_method_directive(attr));
            for input in clean_method.sig.inputs.iter_mut() {
                if let FnArg::Typed(pat_type) = input {
                    pat_type.attrs.retain(|attr| !is_param_directive(attr));
                }
            }
            clean_items.push(ImplItem::Fn(clean_method));
        } else {
            clean_items.push(item.clone());
        }
    }

    let handler_entries = extraction.rules.iter().filter_map(|rule| {
        let method = input.items.iter().find_map(|item| match item {
            ImplItem::Fn(m) if m.sig.ident == rule.method_name() => Some(m),
            _ => None,
        })?;
        Some(handler_entry(method))
    });

    let skipped = extraction.skipped.iter().map(|s| {
        let method = &s.method;
        let reason = s.reason.to_string();
        quote! { (#method, #reason) }
    });

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let attrs = &input.attrs;

    Ok(quote! {
        #(#attrs)*
        impl #impl_generics #self_ty #where_clause {
            #(#clean_items)*
        }

        impl #impl_generics ::switchyard::controller::Controller for #self_ty #where_clause {
            fn route_rules() -> ::std::vec::Vec<::switchyard::RouteRule> {
                ::switchyard::controller::decode_rules(
                    #rules_json,
                    <Self as ::switchyard::controller::ControllerInfo>::NAME,
                    <Self as ::switchyard::controller::ControllerInfo>::BASE_PATH,
                )
            }

            fn handlers() -> ::std::vec::Vec<::switchyard::controller::HandlerEntry<Self>> {
                ::std::vec![#(#handler_entries),*]
            }

            fn skipped_methods() -> ::std::vec::Vec<(&'static str, &'static str)> {
                ::std::vec![#(#skipped),*]
            }
        }
    })
}

/// Typed glue that pulls each bound argument out of `Arguments` and calls the method.
fn handler_entry(method: &syn::ImplItemFn) -> TokenStream2 {
    let fn_name = &method.sig.ident;
    let method_name = fn_name.to_string();
    let has_receiver = method
        .sig
        .inputs
        .iter()
        .any(|input| matches!(input, FnArg::Receiver(_)));

    let typed: Vec<_> = method
        .sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Typed(pat_type) => Some(&pat_type.ty),
            FnArg::Receiver(_) => None,
        })
        .collect();
    let temps: Vec<_> = (0..typed.len()).map(|i| format_ident!("__arg{}", i)).collect();
    let indices = 0..typed.len();

    let target = if has_receiver {
        quote! { __ctrl.#fn_name }
    } else {
        quote! { Self::#fn_name }
    };
    let call = if method.sig.asyncness.is_some() {
        quote! { #target(#(#temps),*).await }
    } else {
        quote! { #target(#(#temps),*) }
    };

    quote! {
        ::switchyard::controller::HandlerEntry::new(
            #method_name,
            |__ctrl: ::std::sync::Arc<Self>,
             __args: ::switchyard::binder::Arguments|
             -> ::switchyard::controller::HandlerFuture {
                ::std::boxed::Box::pin(async move {
                    #[allow(unused_mut, unused_variables)]
                    let mut __args = __args;
                    #(let #temps: #typed = __args.take(#indices)?;)*
                    let __ret = #call;
                    let _ = &__ctrl;
                    ::switchyard::http::IntoHandlerResult::into_handler_result(__ret)
                })
            },
        )
    }
}
