//! Turns a matched route's argument bindings into handler arguments.

pub mod arguments;
pub mod cast;
pub mod sanitize;

use std::sync::Arc;

use serde_json::Value;
use switchyard_meta::{ArgumentBinding, HandlerArg, RouteRule, SanitizeMode, ScalarType};

pub use arguments::{ArgValue, Arguments, FromArgument};

use crate::error::{DispatchError, HandlerConfigurationError};
use crate::http::Request;

/// Resolves every binding of a rule against one request, in declared order.
pub struct ArgumentBinder;

impl ArgumentBinder {
    pub fn bind(rule: &RouteRule, request: &Arc<Request>) -> Result<Arguments, DispatchError> {
        let values = rule
            .argument_bindings
            .iter()
            .enumerate()
            .map(|(index, arg)| Self::resolve(rule, index, arg, request))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arguments::new(rule.handler_id.clone(), values))
    }

    fn resolve(
        rule: &RouteRule,
        index: usize,
        arg: &HandlerArg,
        request: &Arc<Request>,
    ) -> Result<ArgValue, DispatchError> {
        let unsupported = || -> DispatchError {
            HandlerConfigurationError::UnsupportedArgumentType {
                handler: rule.handler_id.clone(),
                index,
                name: arg.name.clone(),
                type_hint: arg.type_hint.clone(),
            }
            .into()
        };
        let missing_or = |value: ArgValue| {
            if arg.nullable {
                ArgValue::Null
            } else {
                value
            }
        };

        let value = match &arg.binding {
            ArgumentBinding::RawRequest => ArgValue::Request(Arc::clone(request)),
            ArgumentBinding::RawToken => request
                .token()
                .cloned()
                .map_or(ArgValue::Null, ArgValue::Token),
            ArgumentBinding::ClientIp => ArgValue::Str(request.client_ip()),
            ArgumentBinding::Header { name } => match request.header(arg.lookup_name(name)) {
                Some(value) => ArgValue::Str(value.to_string()),
                None => missing_or(ArgValue::Str(String::new())),
            },
            ArgumentBinding::RawBody => ArgValue::Bytes(request.body().clone()),
            ArgumentBinding::UploadedFile { key } => request
                .uploaded_file(arg.lookup_name(key))
                .cloned()
                .map_or(ArgValue::Null, ArgValue::File),
            ArgumentBinding::PathVariable { name, default } => {
                let raw = request.path_variable(arg.lookup_name(name));
                if raw.is_none() && default.is_none() && arg.nullable {
                    ArgValue::Null
                } else {
                    coerce_scalar(arg.scalar, raw, default.as_deref()).ok_or_else(unsupported)?
                }
            }
            ArgumentBinding::TokenClaim { name, default } => {
                let name = arg.lookup_name(name);
                match request.token() {
                    None if arg.nullable => ArgValue::Null,
                    token => match arg.scalar {
                        Some(ScalarType::Array) => ArgValue::Array(
                            token.map(|t| t.array_claim(name)).unwrap_or_default(),
                        ),
                        scalar => {
                            let raw = token
                                .and_then(|t| t.claim(name))
                                .filter(|v| !v.is_null())
                                .map(cast::value_to_string);
                            coerce_scalar(scalar, raw.as_deref(), default.as_deref())
                                .ok_or_else(unsupported)?
                        }
                    },
                }
            }
            ArgumentBinding::QueryOrFormParam {
                name,
                default,
                sanitize,
                decimal,
            } => {
                let name = arg.lookup_name(name);
                let raw = request.param(name);
                match arg.scalar {
                    _ if raw.is_none() && default.is_none() && arg.nullable => ArgValue::Null,
                    Some(ScalarType::Array) => ArgValue::Array(param_array(request, name)),
                    Some(ScalarType::String) => {
                        let text = raw.or(default.as_deref()).unwrap_or_default();
                        let text = sanitize::apply(*sanitize, text);
                        if *decimal {
                            ArgValue::Str(sanitize::decimal2(&sanitize::apply(
                                SanitizeMode::StripTags,
                                &text,
                            )))
                        } else {
                            ArgValue::Str(text)
                        }
                    }
                    scalar => {
                        coerce_scalar(scalar, raw, default.as_deref()).ok_or_else(unsupported)?
                    }
                }
            }
            ArgumentBinding::BoundMap { rules } => ArgValue::Map(request.map(rules)),
            ArgumentBinding::None if arg.nullable => ArgValue::Null,
            ArgumentBinding::None => {
                return Err(HandlerConfigurationError::UnboundArgument {
                    handler: rule.handler_id.clone(),
                    index,
                    name: arg.name.clone(),
                }
                .into());
            }
        };
        Ok(value)
    }
}

/// Coerces a raw string into the scalar shape, using the default and then
/// the type's sentinel when the raw value is absent or unparsable.
fn coerce_scalar(scalar: Option<ScalarType>, raw: Option<&str>, default: Option<&str>) -> Option<ArgValue> {
    let value = match scalar? {
        ScalarType::Int => {
            let fallback = default.and_then(cast::to_int).unwrap_or(cast::INT_SENTINEL);
            ArgValue::Int(raw.and_then(cast::to_int).unwrap_or(fallback))
        }
        ScalarType::Float => {
            let fallback = default
                .and_then(cast::to_float)
                .unwrap_or(cast::FLOAT_SENTINEL);
            ArgValue::Float(raw.and_then(cast::to_float).unwrap_or(fallback))
        }
        ScalarType::Bool => {
            let fallback = default.and_then(cast::to_bool).unwrap_or(false);
            ArgValue::Bool(raw.and_then(cast::to_bool).unwrap_or(fallback))
        }
        ScalarType::String => ArgValue::Str(raw.or(default).unwrap_or_default().to_string()),
        ScalarType::Array => return None,
    };
    Some(value)
}

/// A JSON array sent as one value, or every value sent under the name.
fn param_array(request: &Request, name: &str) -> Vec<Value> {
    let values = request.param_values(name);
    if let [single] = values.as_slice() {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(single) {
            return items;
        }
    }
    values
        .into_iter()
        .map(|v| Value::String(v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_meta::{ARG_NAME_PLACEHOLDER, HttpMethod};

    fn rule(args: Vec<HandlerArg>) -> RouteRule {
        RouteRule {
            handler_id: "Users@show".into(),
            http_method: HttpMethod::Get,
            path_pattern: "/users/{id}".into(),
            argument_bindings: args,
            rate_limit_policy: None,
            auth_policy: None,
            validation_rules: None,
            extra_metadata: vec![],
        }
    }

    fn arg(name: &str, scalar: Option<ScalarType>, nullable: bool, binding: ArgumentBinding) -> HandlerArg {
        HandlerArg {
            name: name.into(),
            type_hint: "test".into(),
            nullable,
            scalar,
            binding,
        }
    }

    fn request_with_vars(uri: &str, vars: &[(&str, &str)]) -> Arc<Request> {
        let mut req = Request::builder().uri(uri).build();
        let rule = Arc::new(rule(vec![]));
        req.set_route(
            rule,
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        Arc::new(req)
    }

    #[test]
    fn test_path_variable_default_applies() {
        let rule = rule(vec![arg(
            "id",
            Some(ScalarType::Int),
            false,
            ArgumentBinding::PathVariable {
                name: "id".into(),
                default: Some("-1".into()),
            },
        )]);
        let req = request_with_vars("/users", &[]);
        let mut args = ArgumentBinder::bind(&rule, &req).unwrap();
        assert_eq!(args.take::<i64>(0).unwrap(), -1);

        let req = request_with_vars("/users/9", &[("id", "9")]);
        let mut args = ArgumentBinder::bind(&rule, &req).unwrap();
        assert_eq!(args.take::<i64>(0).unwrap(), 9);
    }

    #[test]
    fn test_sentinels_without_default() {
        let rule = rule(vec![
            arg(
                "n",
                Some(ScalarType::Int),
                false,
                ArgumentBinding::PathVariable { name: ARG_NAME_PLACEHOLDER.into(), default: None },
            ),
            arg(
                "f",
                Some(ScalarType::Float),
                false,
                ArgumentBinding::PathVariable { name: ARG_NAME_PLACEHOLDER.into(), default: None },
            ),
            arg(
                "o",
                Some(ScalarType::Int),
                true,
                ArgumentBinding::PathVariable { name: ARG_NAME_PLACEHOLDER.into(), default: None },
            ),
        ]);
        let mut args = ArgumentBinder::bind(&rule, &request_with_vars("/", &[])).unwrap();
        assert_eq!(args.take::<i64>(0).unwrap(), i64::MIN);
        assert_eq!(args.take::<f64>(1).unwrap(), f64::MIN_POSITIVE);
        assert_eq!(args.take::<Option<i64>>(2).unwrap(), None);
    }

    #[test]
    fn test_request_param_sanitize_and_decimal() {
        let rule = rule(vec![
            arg(
                "name",
                Some(ScalarType::String),
                false,
                ArgumentBinding::QueryOrFormParam {
                    name: ARG_NAME_PLACEHOLDER.into(),
                    default: None,
                    sanitize: SanitizeMode::StripTags,
                    decimal: false,
                },
            ),
            arg(
                "amount",
                Some(ScalarType::String),
                false,
                ArgumentBinding::QueryOrFormParam {
                    name: "amt".into(),
                    default: Some("0".into()),
                    sanitize: SanitizeMode::StripTags,
                    decimal: true,
                },
            ),
            arg(
                "ids",
                Some(ScalarType::Array),
                false,
                ArgumentBinding::QueryOrFormParam {
                    name: ARG_NAME_PLACEHOLDER.into(),
                    default: None,
                    sanitize: SanitizeMode::StripTags,
                    decimal: false,
                },
            ),
        ]);
        let req = Arc::new(
            Request::builder()
                .uri("/?name=%3Cb%3Eada%3C%2Fb%3E&amt=19.999&ids[]=1&ids[]=2")
                .build(),
        );
        let mut args = ArgumentBinder::bind(&rule, &req).unwrap();
        assert_eq!(args.take::<String>(0).unwrap(), "ada");
        assert_eq!(args.take::<String>(1).unwrap(), "19.99");
        assert_eq!(args.take::<Vec<Value>>(2).unwrap(), vec![json!("1"), json!("2")]);
    }

    #[test]
    fn test_unbound_argument_fails() {
        let rule = rule(vec![arg("svc", None, false, ArgumentBinding::None)]);
        let err = ArgumentBinder::bind(&rule, &request_with_vars("/", &[])).unwrap_err();
        assert_eq!(err.to_string(), "fail to inject arg0 [svc] for handler Users@show");

        let rule = super::tests::rule(vec![arg("svc", None, true, ArgumentBinding::None)]);
        let mut args = ArgumentBinder::bind(&rule, &request_with_vars("/", &[])).unwrap();
        assert_eq!(args.take::<Option<String>>(0).unwrap(), None);
    }

    #[test]
    fn test_unsupported_path_variable_type() {
        let rule = rule(vec![arg(
            "tags",
            Some(ScalarType::Array),
            false,
            ArgumentBinding::PathVariable { name: "tags".into(), default: None },
        )]);
        assert!(matches!(
            ArgumentBinder::bind(&rule, &request_with_vars("/", &[])),
            Err(DispatchError::Configuration(
                HandlerConfigurationError::UnsupportedArgumentType { .. }
            ))
        ));
    }

    #[test]
    fn test_header_client_ip_and_body() {
        let rule = rule(vec![
            arg("user_agent", Some(ScalarType::String), false, ArgumentBinding::Header { name: "User-Agent".into() }),
            arg("ip", Some(ScalarType::String), false, ArgumentBinding::ClientIp),
            arg("body", Some(ScalarType::String), false, ArgumentBinding::RawBody),
            arg("req", None, false, ArgumentBinding::RawRequest),
        ]);
        let req = Arc::new(
            Request::builder()
                .method("POST")
                .header("User-Agent", "curl")
                .header("X-Real-IP", "192.0.2.1")
                .body("raw")
                .build(),
        );
        let mut args = ArgumentBinder::bind(&rule, &req).unwrap();
        assert_eq!(args.take::<String>(0).unwrap(), "curl");
        assert_eq!(args.take::<String>(1).unwrap(), "192.0.2.1");
        assert_eq!(args.take::<String>(2).unwrap(), "raw");
        assert_eq!(args.take::<Arc<Request>>(3).unwrap().method(), "POST");
    }
}
