use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::path::join_mapping;

/// Lookup name substituted with the parameter's own name when a directive
/// leaves its name empty.
pub const ARG_NAME_PLACEHOLDER: &str = "{argName}";

/// HTTP verb a route answers to.
///
/// `All` is the verb of a generic request mapping and accepts both `GET` and
/// `POST`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    All,
}

impl HttpMethod {
    /// Whether a request with the given verb may hit a route declared with `self`.
    pub fn accepts(&self, verb: &str) -> bool {
        match self {
            HttpMethod::All => {
                verb.eq_ignore_ascii_case("GET") || verb.eq_ignore_ascii_case("POST")
            }
            declared => verb.eq_ignore_ascii_case(declared.as_ref()),
        }
    }

    /// Verbs advertised in an `Allow` header for this route.
    pub fn allowed_verbs(&self) -> &'static [&'static str] {
        match self {
            HttpMethod::Get => &["GET"],
            HttpMethod::Post => &["POST"],
            HttpMethod::Put => &["PUT"],
            HttpMethod::Patch => &["PATCH"],
            HttpMethod::Delete => &["DELETE"],
            HttpMethod::All => &["GET", "POST"],
        }
    }
}

impl AsRef<str> for HttpMethod {
    fn as_ref(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::All => "ALL",
        }
    }
}

/// Scalar shape a binding coerces its raw value into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScalarType {
    Int,
    Float,
    Bool,
    String,
    Array,
}

impl ScalarType {
    /// Maps the last segment of a Rust type name onto a scalar shape.
    pub fn from_type_ident(ident: &str) -> Option<Self> {
        match ident {
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" => Some(ScalarType::Int),
            "f32" | "f64" => Some(ScalarType::Float),
            "bool" => Some(ScalarType::Bool),
            "String" | "str" => Some(ScalarType::String),
            "Vec" => Some(ScalarType::Array),
            _ => None,
        }
    }
}

/// Sanitization applied to string request parameters.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SanitizeMode {
    None,
    #[default]
    StripTags,
    HtmlPurify,
}

/// Where a handler argument takes its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentBinding {
    RawRequest,
    RawToken,
    ClientIp,
    Header {
        name: String,
    },
    RawBody,
    UploadedFile {
        key: String,
    },
    PathVariable {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    TokenClaim {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    QueryOrFormParam {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        #[serde(default)]
        sanitize: SanitizeMode,
        #[serde(default)]
        decimal: bool,
    },
    BoundMap {
        #[serde(default)]
        rules: Vec<String>,
    },
    None,
}

/// One handler parameter with its declared type and binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerArg {
    pub name: String,
    pub type_hint: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<ScalarType>,
    pub binding: ArgumentBinding,
}

impl HandlerArg {
    /// Resolves a directive name, falling back to the parameter's own name.
    pub fn lookup_name<'a>(&'a self, name: &'a str) -> &'a str {
        if name.is_empty() || name == ARG_NAME_PLACEHOLDER {
            &self.name
        } else {
            name
        }
    }
}

/// Fixed window quota attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub total: u32,
    pub window_seconds: u64,
    #[serde(default)]
    pub limit_by_client_ip: bool,
}

impl RateLimitPolicy {
    /// A policy with a zero quota or zero window never limits anything.
    pub fn is_effective(&self) -> bool {
        self.total > 0 && self.window_seconds > 0
    }
}

/// Validation rules applied to the request data before the handler runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub rules: Vec<String>,
    #[serde(default)]
    pub failfast: bool,
}

/// Compiled routing metadata for one controller method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    pub handler_id: String,
    pub http_method: HttpMethod,
    pub path_pattern: String,
    #[serde(default)]
    pub argument_bindings: Vec<HandlerArg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_policy: Option<RateLimitPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<ValidationPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_metadata: Vec<String>,
}

impl RouteRule {
    /// A rule with no arguments and no policies.
    pub fn new(handler_id: impl Into<String>, http_method: HttpMethod, path_pattern: &str) -> Self {
        Self {
            handler_id: handler_id.into(),
            http_method,
            path_pattern: join_mapping("/", path_pattern),
            argument_bindings: Vec::new(),
            rate_limit_policy: None,
            auth_policy: None,
            validation_rules: None,
            extra_metadata: Vec::new(),
        }
    }

    pub fn handler_id(controller: &str, method: &str) -> String {
        format!("{controller}@{method}")
    }

    /// Controller half of the handler id.
    pub fn controller_name(&self) -> &str {
        self.handler_id
            .split_once('@')
            .map_or(self.handler_id.as_str(), |(controller, _)| controller)
    }

    /// Method half of the handler id.
    pub fn method_name(&self) -> &str {
        self.handler_id
            .split_once('@')
            .map_or("", |(_, method)| method)
    }

    /// Moves the rule under a controller name and path prefix.
    pub fn rebase(mut self, controller: &str, prefix: &str) -> Self {
        let method = self.method_name().to_string();
        self.handler_id = Self::handler_id(controller, &method);
        self.path_pattern = join_mapping(prefix, &self.path_pattern);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_all_accepts_get_and_post_only() {
        assert!(HttpMethod::All.accepts("GET"));
        assert!(HttpMethod::All.accepts("post"));
        assert!(!HttpMethod::All.accepts("PUT"));
        assert!(HttpMethod::Patch.accepts("PATCH"));
        assert!(!HttpMethod::Get.accepts("POST"));
    }

    #[test]
    fn test_method_strings() {
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!(HttpMethod::from_str("patch").unwrap(), HttpMethod::Patch);
        assert_eq!(
            serde_json::to_string(&HttpMethod::All).unwrap(),
            "\"ALL\""
        );
    }

    #[test]
    fn test_rebase_rewrites_controller_and_path() {
        let rule = RouteRule {
            handler_id: "UserController@show".into(),
            http_method: HttpMethod::Get,
            path_pattern: "/{id}".into(),
            argument_bindings: vec![],
            rate_limit_policy: None,
            auth_policy: None,
            validation_rules: None,
            extra_metadata: vec![],
        };
        let rule = rule.rebase("Users", "/api/users/");
        assert_eq!(rule.handler_id, "Users@show");
        assert_eq!(rule.controller_name(), "Users");
        assert_eq!(rule.method_name(), "show");
        assert_eq!(rule.path_pattern, "/api/users/{id}");
    }

    #[test]
    fn test_binding_serializes_with_kind_tag() {
        let binding = ArgumentBinding::PathVariable {
            name: "id".into(),
            default: Some("-1".into()),
        };
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["kind"], "path_variable");
        assert_eq!(json["default"], "-1");

        let back: ArgumentBinding =
            serde_json::from_str(r#"{"kind":"query_or_form_param","name":"q"}"#).unwrap();
        assert_eq!(
            back,
            ArgumentBinding::QueryOrFormParam {
                name: "q".into(),
                default: None,
                sanitize: SanitizeMode::StripTags,
                decimal: false,
            }
        );
    }

    #[test]
    fn test_lookup_name_placeholder() {
        let arg = HandlerArg {
            name: "user_id".into(),
            type_hint: "i64".into(),
            nullable: false,
            scalar: Some(ScalarType::Int),
            binding: ArgumentBinding::None,
        };
        assert_eq!(arg.lookup_name(ARG_NAME_PLACEHOLDER), "user_id");
        assert_eq!(arg.lookup_name(""), "user_id");
        assert_eq!(arg.lookup_name("uid"), "uid");
    }
}
