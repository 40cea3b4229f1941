use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::binder::cast;

/// A bearer token parsed from the request, not yet verified.
///
/// Parsing only decodes the claims; signature, issuer and expiry checks are
/// the job of a [`TokenVerifier`](crate::security::TokenVerifier).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    raw: String,
    algorithm: Algorithm,
    claims: Map<String, Value>,
}

impl Token {
    /// Decodes a compact JWT without checking its signature.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Map<String, Value>>(
            raw,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .ok()?;

        Some(Self {
            raw: raw.to_string(),
            algorithm: data.header.alg,
            claims: data.claims,
        })
    }

    /// Reads the token from an `Authorization: Bearer ...` header value.
    pub fn from_authorization(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, token) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Self::parse(token)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claim("iss").and_then(Value::as_str)
    }

    /// `exp` as a unix timestamp.
    pub fn expires_at(&self) -> Option<i64> {
        self.claim("exp").and_then(cast::value_to_int)
    }

    pub fn int_claim(&self, name: &str, default: i64) -> i64 {
        self.claim(name)
            .and_then(cast::value_to_int)
            .unwrap_or(default)
    }

    pub fn float_claim(&self, name: &str, default: f64) -> f64 {
        self.claim(name)
            .and_then(cast::value_to_float)
            .unwrap_or(default)
    }

    pub fn bool_claim(&self, name: &str, default: bool) -> bool {
        self.claim(name)
            .and_then(cast::value_to_bool)
            .unwrap_or(default)
    }

    pub fn string_claim(&self, name: &str, default: &str) -> String {
        match self.claim(name) {
            Some(Value::Null) | None => default.to_string(),
            Some(value) => cast::value_to_string(value),
        }
    }

    pub fn array_claim(&self, name: &str) -> Vec<Value> {
        match self.claim(name) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }
}
