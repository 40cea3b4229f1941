//! Reads routing directives off a controller `impl` block.
//!
//! The same extractor backs the `#[routes]` attribute macro and the
//! source-scanning route compiler, so both produce identical [`RouteRule`]s
//! for the same controller.

use std::str::FromStr;

use quote::ToTokens;
use syn::{
    Attribute, FnArg, GenericArgument, ImplItem, ImplItemFn, ItemImpl, Pat, PathArguments, Type,
    Visibility,
};

use crate::directive::{DirectiveArgs, DirectiveValue};
use crate::duration::parse_duration;
use crate::error::MetaError;
use crate::path::join_mapping;
use crate::rule::{
    ARG_NAME_PLACEHOLDER, ArgumentBinding, HandlerArg, HttpMethod, RateLimitPolicy, RouteRule,
    SanitizeMode, ScalarType, ValidationPolicy,
};

/// Verb directives in the order they take precedence on a single method.
const VERB_DIRECTIVES: [(&str, HttpMethod); 6] = [
    ("get", HttpMethod::Get),
    ("post", HttpMethod::Post),
    ("put", HttpMethod::Put),
    ("patch", HttpMethod::Patch),
    ("delete", HttpMethod::Delete),
    ("request_mapping", HttpMethod::All),
];

const POLICY_DIRECTIVES: [&str; 4] = ["rate_limit", "jwt_auth", "validate", "extra"];

const PARAM_DIRECTIVES: [&str; 8] = [
    "header",
    "client_ip",
    "request_body",
    "uploaded_file",
    "path_variable",
    "jwt_claim",
    "request_param",
    "map_bind",
];

/// Arguments of a `#[controller(...)]` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerDecl {
    pub name: String,
    pub path: String,
}

/// A method that carried a verb directive but could not be turned into a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMethod {
    pub method: String,
    pub reason: MetaError,
}

/// Outcome of extracting one controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub rules: Vec<RouteRule>,
    pub skipped: Vec<SkippedMethod>,
}

/// Last path segment of an attribute, so `#[get]` and `#[switchyard::get]` match alike.
pub fn directive_name(attr: &Attribute) -> Option<String> {
    attr.path().segments.last().map(|s| s.ident.to_string())
}

pub fn is_method_directive(attr: &Attribute) -> bool {
    directive_name(attr).is_some_and(|name| {
        VERB_DIRECTIVES.iter().any(|(verb, _)| *verb == name)
            || POLICY_DIRECTIVES.contains(&name.as_str())
    })
}

pub fn is_param_directive(attr: &Attribute) -> bool {
    directive_name(attr).is_some_and(|name| PARAM_DIRECTIVES.contains(&name.as_str()))
}

/// Finds a `#[controller]` declaration among struct attributes.
///
/// The controller name defaults to the struct name and the path to `/`.
pub fn controller_decl(
    attrs: &[Attribute],
    struct_name: &str,
) -> Option<Result<ControllerDecl, MetaError>> {
    let attr = attrs
        .iter()
        .find(|attr| directive_name(attr).as_deref() == Some("controller"))?;
    Some(DirectiveArgs::from_attribute(attr, "controller").map(|args| ControllerDecl {
        name: args
            .named_text("name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| struct_name.to_string()),
        path: args.text("path").unwrap_or_else(|| "/".to_string()),
    }))
}

/// Extracts one rule per public, verb-annotated method of `item`.
pub fn extract_controller(controller: &str, prefix: &str, item: &ItemImpl) -> Extraction {
    let mut extraction = Extraction::default();
    for impl_item in &item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        match extract_method(controller, prefix, method) {
            Ok(Some(rule)) => extraction.rules.push(rule),
            Ok(None) => {}
            Err(reason) => extraction.skipped.push(SkippedMethod {
                method: method.sig.ident.to_string(),
                reason,
            }),
        }
    }
    extraction
}

/// Extracts the rule of a single method.
///
/// Returns `Ok(None)` for methods that are not public or carry no verb
/// directive.
pub fn extract_method(
    controller: &str,
    prefix: &str,
    method: &ImplItemFn,
) -> Result<Option<RouteRule>, MetaError> {
    if !matches!(method.vis, Visibility::Public(_)) {
        return Ok(None);
    }
    let Some((http_method, mapping)) = verb_mapping(&method.attrs)? else {
        return Ok(None);
    };

    let method_name = method.sig.ident.to_string();
    let mut rule = RouteRule {
        handler_id: RouteRule::handler_id(controller, &method_name),
        http_method,
        path_pattern: join_mapping(prefix, &mapping),
        argument_bindings: Vec::new(),
        rate_limit_policy: None,
        auth_policy: None,
        validation_rules: None,
        extra_metadata: Vec::new(),
    };

    for attr in &method.attrs {
        match directive_name(attr).as_deref() {
            Some("rate_limit") => rule.rate_limit_policy = Some(rate_limit_policy(attr)?),
            Some("jwt_auth") => {
                let args = DirectiveArgs::from_attribute(attr, "jwt_auth")?;
                rule.auth_policy = Some(
                    args.text("key")
                        .filter(|k| !k.is_empty())
                        .unwrap_or_else(|| "default".to_string()),
                );
            }
            Some("validate") => rule.validation_rules = Some(validation_policy(attr)?),
            Some("extra") => {
                let args = DirectiveArgs::from_attribute(attr, "extra")?;
                if let Some(value) = args.text("value") {
                    rule.extra_metadata.push(value);
                }
            }
            _ => {}
        }
    }

    let mut position = 0;
    for input in &method.sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let name = match &*pat_type.pat {
            Pat::Ident(ident) => ident.ident.to_string(),
            Pat::Wild(_) => format!("arg{position}"),
            _ => return Err(MetaError::UnsupportedPattern(position)),
        };
        rule.argument_bindings
            .push(handler_arg(name, &pat_type.ty, &pat_type.attrs)?);
        position += 1;
    }

    Ok(Some(rule))
}

fn verb_mapping(attrs: &[Attribute]) -> Result<Option<(HttpMethod, String)>, MetaError> {
    for (directive, verb) in VERB_DIRECTIVES {
        let Some(attr) = attrs
            .iter()
            .find(|attr| directive_name(attr).as_deref() == Some(directive))
        else {
            continue;
        };
        let args = DirectiveArgs::from_attribute(attr, directive)?;
        let mapping = args.text("path").unwrap_or_default();
        let verb = match args.named_text("method") {
            Some(m) if verb == HttpMethod::All => HttpMethod::from_str(&m)
                .map_err(|_| MetaError::malformed(directive, format!("unknown method `{m}`")))?,
            _ => verb,
        };
        return Ok(Some((verb, mapping)));
    }
    Ok(None)
}

fn rate_limit_policy(attr: &Attribute) -> Result<RateLimitPolicy, MetaError> {
    let args = DirectiveArgs::from_attribute(attr, "rate_limit")?;
    let total = match args.get("total") {
        Some(DirectiveValue::Int(n)) => u32::try_from(*n)
            .map_err(|_| MetaError::malformed("rate_limit", "total out of range"))?,
        Some(_) => return Err(MetaError::malformed("rate_limit", "total must be an integer")),
        None => 0,
    };
    let window_seconds = match args.get("duration") {
        Some(DirectiveValue::Int(n)) => u64::try_from(*n)
            .map_err(|_| MetaError::InvalidDuration(n.to_string()))?,
        Some(DirectiveValue::Str(s)) => {
            parse_duration(s).ok_or_else(|| MetaError::InvalidDuration(s.clone()))?
        }
        Some(_) => return Err(MetaError::malformed("rate_limit", "invalid duration")),
        None => 0,
    };
    Ok(RateLimitPolicy {
        total,
        window_seconds,
        limit_by_client_ip: args.flag("limit_by_ip").unwrap_or(false),
    })
}

fn validation_policy(attr: &Attribute) -> Result<ValidationPolicy, MetaError> {
    let args = DirectiveArgs::from_attribute(attr, "validate")?;
    let split = |s: &str| {
        s.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect::<Vec<_>>()
    };
    let mut rules = args.positional.as_deref().map(split).unwrap_or_default();
    match args.get("rules") {
        Some(DirectiveValue::List(items)) => rules.extend(items.iter().cloned()),
        Some(DirectiveValue::Str(s)) => rules.extend(split(s)),
        Some(_) => return Err(MetaError::malformed("validate", "rules must be strings")),
        None => {}
    }
    Ok(ValidationPolicy {
        rules,
        failfast: args.flag("failfast").unwrap_or(false),
    })
}

/// Shape of a parameter type once references, `Option` and `Arc` are peeled off.
struct TypeShape {
    ident: Option<String>,
    nullable: bool,
}

fn type_shape(ty: &Type) -> TypeShape {
    match ty {
        Type::Reference(reference) => type_shape(&reference.elem),
        Type::Paren(paren) => type_shape(&paren.elem),
        Type::Slice(_) | Type::Array(_) => TypeShape {
            ident: Some("Vec".to_string()),
            nullable: false,
        },
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return TypeShape { ident: None, nullable: false };
            };
            let ident = segment.ident.to_string();
            let inner = match &segment.arguments {
                PathArguments::AngleBracketed(args) => args.args.iter().find_map(|a| match a {
                    GenericArgument::Type(t) => Some(t),
                    _ => None,
                }),
                _ => None,
            };
            match (ident.as_str(), inner) {
                ("Option", Some(inner)) => TypeShape {
                    nullable: true,
                    ..type_shape(inner)
                },
                ("Arc" | "Box", Some(inner)) => type_shape(inner),
                _ => TypeShape {
                    ident: Some(ident),
                    nullable: false,
                },
            }
        }
        _ => TypeShape { ident: None, nullable: false },
    }
}

fn handler_arg(name: String, ty: &Type, attrs: &[Attribute]) -> Result<HandlerArg, MetaError> {
    let shape = type_shape(ty);
    let type_hint = ty.to_token_stream().to_string().replace(' ', "");
    let scalar = shape.ident.as_deref().and_then(ScalarType::from_type_ident);

    let binding = match shape.ident.as_deref() {
        Some("Request") => ArgumentBinding::RawRequest,
        Some("Token") => ArgumentBinding::RawToken,
        _ => param_binding(&name, attrs)?,
    };

    Ok(HandlerArg {
        name,
        type_hint,
        nullable: shape.nullable,
        scalar,
        binding,
    })
}

fn param_binding(param: &str, attrs: &[Attribute]) -> Result<ArgumentBinding, MetaError> {
    let mut found: Option<ArgumentBinding> = None;
    for attr in attrs.iter().filter(|a| is_param_directive(a)) {
        if found.is_some() {
            return Err(MetaError::ConflictingBindings {
                param: param.to_string(),
            });
        }
        let directive = directive_name(attr).unwrap_or_default();
        let args = DirectiveArgs::from_attribute(attr, &directive)?;
        let name = || {
            args.text("name")
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| ARG_NAME_PLACEHOLDER.to_string())
        };
        let default = || args.named_text("default");

        found = Some(match directive.as_str() {
            "header" => ArgumentBinding::Header { name: name() },
            "client_ip" => ArgumentBinding::ClientIp,
            "request_body" => ArgumentBinding::RawBody,
            "uploaded_file" => ArgumentBinding::UploadedFile {
                key: args
                    .text("key")
                    .filter(|k| !k.is_empty())
                    .unwrap_or_else(|| ARG_NAME_PLACEHOLDER.to_string()),
            },
            "path_variable" => ArgumentBinding::PathVariable {
                name: name(),
                default: default(),
            },
            "jwt_claim" => ArgumentBinding::TokenClaim {
                name: name(),
                default: default(),
            },
            "request_param" => {
                let sanitize = match args.named_text("security") {
                    Some(mode) => SanitizeMode::from_str(&mode).map_err(|_| {
                        MetaError::malformed("request_param", format!("unknown security mode `{mode}`"))
                    })?,
                    None => SanitizeMode::default(),
                };
                ArgumentBinding::QueryOrFormParam {
                    name: name(),
                    default: default(),
                    sanitize,
                    decimal: args.flag("decimal").unwrap_or(false),
                }
            }
            _ => {
                let rules = match (&args.positional, args.get("rules")) {
                    (_, Some(DirectiveValue::List(items))) => items.clone(),
                    (Some(s), _) => s
                        .split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(String::from)
                        .collect(),
                    _ => Vec::new(),
                };
                ArgumentBinding::BoundMap { rules }
            }
        });
    }
    Ok(found.unwrap_or(ArgumentBinding::None))
}
