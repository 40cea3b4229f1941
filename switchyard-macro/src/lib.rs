//! Attribute macros for Switchyard controllers.
//!
//! `#[controller]` and `#[routes]` do the work. The verb and policy
//! directives are markers read by `#[routes]` and removed from the emitted
//! impl; parameter directives (`#[path_variable]`, `#[request_param]`, ...)
//! are inert attributes handled the same way.

use proc_macro::TokenStream;

mod controller;
mod directives;
mod injectable;

/// Implements `Injectable` by resolving every `Arc<T>` field from the
/// container. `Arc<dyn Trait>` fields go through the container's trait
/// bindings.
///
/// ```ignore
/// #[derive(Injectable)]
/// pub struct OrderService {
///     store: Arc<dyn OrderStore>,
/// }
/// ```
#[proc_macro_derive(Injectable)]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Declares a controller: its name, its path prefix and how it is built
/// from the container.
///
/// `name` defaults to the struct name and `path` to `/`.
///
/// ```ignore
/// #[controller(path = "/orders", name = "Orders")]
/// pub struct OrderController {
///     orders: Arc<OrderService>,
/// }
/// ```
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::controller_attribute(attr, item)
}

/// Compiles the routing directives of a controller impl block.
///
/// Every public method carrying a verb directive becomes a route rule and a
/// typed handler. Methods whose directives fail to parse are left out and
/// reported by the registry at start-up.
///
/// ```ignore
/// #[routes]
/// impl OrderController {
///     #[get("/{id}")]
///     pub async fn show(&self, #[path_variable(default = -1)] id: i64) -> Json<Order> {
///         // ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn routes(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::routes_attribute(attr, item)
}

#[proc_macro_attribute]
pub fn get(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("get", item)
}

#[proc_macro_attribute]
pub fn post(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("post", item)
}

#[proc_macro_attribute]
pub fn put(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("put", item)
}

#[proc_macro_attribute]
pub fn patch(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("patch", item)
}

#[proc_macro_attribute]
pub fn delete(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("delete", item)
}

/// Answers GET and POST.
#[proc_macro_attribute]
pub fn request_mapping(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("request_mapping", item)
}

/// Fixed window quota: `#[rate_limit(total = 10, duration = "1m", limit_by_ip = true)]`.
#[proc_macro_attribute]
pub fn rate_limit(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("rate_limit", item)
}

/// Requires a bearer token checked against named settings: `#[jwt_auth("admin")]`.
#[proc_macro_attribute]
pub fn jwt_auth(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("jwt_auth", item)
}

/// Request data rules: `#[validate(rules = ["name@Required"], failfast = true)]`.
#[proc_macro_attribute]
pub fn validate(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("validate", item)
}

/// Opaque string carried on the route rule for collaborators.
#[proc_macro_attribute]
pub fn extra(_attr: TokenStream, item: TokenStream) -> TokenStream {
    directives::outside_routes("extra", item)
}
