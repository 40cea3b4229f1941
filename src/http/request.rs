use std::borrow::Cow;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use serde_json::{Map, Value};
use switchyard_meta::RouteRule;
use switchyard_meta::path::normalize_path;
use uuid::Uuid;

use crate::binder::cast;
use crate::http::{Token, UploadedFile};

/// An incoming request as seen by the dispatcher.
///
/// Query and form parameters keep every pair in arrival order; single-value
/// lookups return the last occurrence.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query_string: String,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    uploaded_files: Vec<UploadedFile>,
    token: Option<Token>,
    peer_addr: Option<IpAddr>,
    request_id: Uuid,
    started_at: Instant,
    route: Option<Arc<RouteRule>>,
    path_variables: HashMap<String, String>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Path with the query string appended when `with_query` is set.
    pub fn request_url(&self, with_query: bool) -> String {
        if with_query && !self.query_string.is_empty() {
            format!("{}?{}", self.path, self.query_string)
        } else {
            self.path.clone()
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        last_value(&self.query, name)
    }

    pub fn form(&self, name: &str) -> Option<&str> {
        last_value(&self.form, name)
    }

    /// Form value, falling back to the query string.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form(name).or_else(|| self.query(name))
    }

    /// Every value sent for `name` or `name[]`, form values after query values.
    pub fn param_values(&self, name: &str) -> Vec<&str> {
        let list_key = format!("{name}[]");
        self.query
            .iter()
            .chain(self.form.iter())
            .filter(|(k, _)| k == name || *k == list_key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn form_pairs(&self) -> &[(String, String)] {
        &self.form
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The body decoded as a JSON object, if it is one.
    pub fn json_body(&self) -> Option<Map<String, Value>> {
        match serde_json::from_slice::<Value>(&self.body).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Request data as a map: query for GET, the JSON body for JSON requests,
    /// otherwise query merged with form.
    ///
    /// Non-empty `rules` project the map onto the named keys, each optionally
    /// coerced with a `:int`, `:float`, `:bool` or `:string` suffix.
    pub fn map(&self, rules: &[String]) -> Map<String, Value> {
        let source = if self.method == Method::GET {
            pairs_to_map(&self.query)
        } else if self.is_json() {
            self.json_body().unwrap_or_default()
        } else {
            let mut merged = pairs_to_map(&self.query);
            merged.extend(pairs_to_map(&self.form));
            merged
        };
        if rules.is_empty() {
            return source;
        }
        project(&source, rules)
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.uploaded_files
    }

    pub fn uploaded_file(&self, key: &str) -> Option<&UploadedFile> {
        self.uploaded_files.iter().find(|f| f.form_field == key)
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn peer_addr(&self) -> Option<IpAddr> {
        self.peer_addr
    }

    /// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
    pub fn client_ip(&self) -> String {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
                return first.to_string();
            }
        }
        if let Some(real) = self.header("x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()) {
            return real.to_string();
        }
        self.peer_addr.map(|ip| ip.to_string()).unwrap_or_default()
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Rule of the matched route, once matching has run.
    pub fn route(&self) -> Option<&RouteRule> {
        self.route.as_deref()
    }

    pub fn path_variable(&self, name: &str) -> Option<&str> {
        self.path_variables.get(name).map(String::as_str)
    }

    pub fn path_variables(&self) -> &HashMap<String, String> {
        &self.path_variables
    }

    pub(crate) fn set_route(&mut self, rule: Arc<RouteRule>, variables: HashMap<String, String>) {
        self.route = Some(rule);
        self.path_variables = variables;
    }
}

fn last_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn pairs_to_map(pairs: &[(String, String)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        if let Some(list_key) = key.strip_suffix("[]") {
            let entry = map
                .entry(list_key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                items.push(Value::String(value.clone()));
            }
        } else {
            map.insert(key.clone(), Value::String(value.clone()));
        }
    }
    map
}

fn project(source: &Map<String, Value>, rules: &[String]) -> Map<String, Value> {
    let mut projected = Map::new();
    for rule in rules {
        let (name, kind) = rule
            .split_once(':')
            .map_or((rule.as_str(), ""), |(n, k)| (n, k));
        let name = name.trim();
        let Some(value) = source.get(name) else {
            continue;
        };
        let coerced = match kind.trim().to_ascii_lowercase().as_str() {
            "int" => cast::value_to_int(value).map_or(Value::Null, Value::from),
            "float" => cast::value_to_float(value).map_or(Value::Null, Value::from),
            "bool" => cast::value_to_bool(value).map_or(Value::Null, Value::from),
            "string" => Value::String(cast::value_to_string(value)),
            _ => value.clone(),
        };
        projected.insert(name.to_string(), coerced);
    }
    projected
}

/// Assembles a [`Request`]; used by the HTTP adapter and by tests.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
    form: Option<Vec<(String, String)>>,
    uploaded_files: Vec<UploadedFile>,
    peer_addr: Option<IpAddr>,
}

impl RequestBuilder {
    pub fn method(mut self, method: &str) -> Self {
        self.method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok();
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_string();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!(name, "Dropping malformed request header"),
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching content type.
    pub fn json(self, value: &Value) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), "application/json")
            .body(value.to_string())
    }

    pub fn form_field(mut self, name: &str, value: &str) -> Self {
        self.form
            .get_or_insert_with(Vec::new)
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn file(mut self, file: UploadedFile) -> Self {
        self.uploaded_files.push(file);
        self
    }

    pub fn peer_addr(mut self, addr: IpAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        let (raw_path, query_string) = match self.uri.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (self.uri.clone(), String::new()),
        };
        let query = parse_pairs(query_string.as_bytes());

        let is_form_body = self
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| {
                ct.to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            });
        let form = match self.form {
            Some(form) => form,
            None if is_form_body => parse_pairs(&self.body),
            None => Vec::new(),
        };

        let token = self
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(Token::from_authorization);

        Request {
            method: self.method.unwrap_or(Method::GET),
            path: normalize_path(&raw_path),
            query_string,
            query,
            form,
            headers: self.headers,
            body: self.body,
            uploaded_files: self.uploaded_files,
            token,
            peer_addr: self.peer_addr,
            request_id: Uuid::new_v4(),
            started_at: Instant::now(),
            route: None,
            path_variables: HashMap::new(),
        }
    }
}

fn parse_pairs(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_parses_uri_and_normalizes_path() {
        let req = Request::builder()
            .method("get")
            .uri("/users//42/?page=2&tag=a&tag=b")
            .build();
        assert_eq!(req.method(), &Method::GET);
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query("tag"), Some("b"));
        assert_eq!(req.param_values("tag"), vec!["a", "b"]);
        assert_eq!(req.request_url(true), "/users/42?page=2&tag=a&tag=b");
    }

    #[test]
    fn test_form_body_is_parsed() {
        let req = Request::builder()
            .method("POST")
            .uri("/login?name=q")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("name=ada+lovelace&age=36")
            .build();
        assert_eq!(req.form("name"), Some("ada lovelace"));
        assert_eq!(req.param("name"), Some("ada lovelace"));
        assert_eq!(req.param("age"), Some("36"));
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: IpAddr = "10.0.0.9".parse().unwrap();
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .header("X-Real-IP", "198.51.100.2")
            .peer_addr(peer)
            .build();
        assert_eq!(req.client_ip(), "203.0.113.7");

        let req = Request::builder()
            .header("X-Real-IP", "198.51.100.2")
            .peer_addr(peer)
            .build();
        assert_eq!(req.client_ip(), "198.51.100.2");

        let req = Request::builder().peer_addr(peer).build();
        assert_eq!(req.client_ip(), "10.0.0.9");
    }

    #[test]
    fn test_map_sources() {
        let get = Request::builder().uri("/?a=1&b=x").build();
        assert_eq!(get.map(&[]), json!({"a": "1", "b": "x"}).as_object().cloned().unwrap());

        let post = Request::builder()
            .method("POST")
            .uri("/?a=1")
            .json(&json!({"name": "ada", "age": "36"}))
            .build();
        let projected = post.map(&["age:int".to_string(), "missing".to_string()]);
        assert_eq!(Value::Object(projected), json!({"age": 36}));

        let form = Request::builder()
            .method("POST")
            .uri("/?a=1&b=q")
            .form_field("b", "f")
            .form_field("ids[]", "1")
            .form_field("ids[]", "2")
            .build();
        assert_eq!(
            Value::Object(form.map(&[])),
            json!({"a": "1", "b": "f", "ids": ["1", "2"]})
        );
    }

    #[test]
    fn test_authorization_header_yields_token() {
        let raw = crate::http::token::tests::sign(json!({"iss": "acme"}), "k");
        let req = Request::builder()
            .header("Authorization", &format!("Bearer {raw}"))
            .build();
        assert_eq!(req.token().and_then(Token::issuer), Some("acme"));
    }
}
