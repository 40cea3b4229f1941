use std::collections::HashMap;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use switchyard_meta::duration::parse_duration;

/// Named token settings an auth policy refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtSettings {
    pub key: String,
    pub issuer: String,
    #[serde(default)]
    pub secret: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub refresh_token_ttl: u64,
}

impl JwtSettings {
    pub fn new(key: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            issuer: issuer.into(),
            secret: None,
            ttl: 0,
            refresh_token_ttl: 0,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Accepts `"@Duration:1h"`, `"1h"` or plain seconds; invalid input leaves the ttl unchanged.
    pub fn with_ttl(mut self, ttl: &str) -> Self {
        if let Some(secs) = parse_setting_duration(ttl) {
            self.ttl = secs;
        }
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: &str) -> Self {
        if let Some(secs) = parse_setting_duration(ttl) {
            self.refresh_token_ttl = secs;
        }
        self
    }

    /// Signs `claims` with this issuer, `iat` and (when a ttl is set) `exp`.
    pub fn issue(&self, mut claims: Map<String, Value>) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now().timestamp();
        claims.insert("iss".into(), Value::String(self.issuer.clone()));
        claims.insert("iat".into(), Value::from(now));
        if self.ttl > 0 {
            claims.insert("exp".into(), Value::from(now + self.ttl as i64));
        }
        let secret = self.secret.as_deref().unwrap_or_default();
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }
}

fn parse_setting_duration(input: &str) -> Option<u64> {
    let input = input.trim();
    let input = input
        .strip_prefix("@Duration:")
        .or_else(|| input.strip_prefix("@duration:"))
        .unwrap_or(input);
    parse_duration(input)
}

/// Token settings by key.
#[derive(Debug, Clone, Default)]
pub struct JwtRegistry {
    settings: HashMap<String, JwtSettings>,
}

impl JwtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, settings: JwtSettings) -> &mut Self {
        self.settings.insert(settings.key.clone(), settings);
        self
    }

    pub fn get(&self, key: &str) -> Option<&JwtSettings> {
        self.settings.get(key)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_formats() {
        let settings = JwtSettings::new("default", "acme")
            .with_ttl("@Duration:2h")
            .with_refresh_token_ttl("7d");
        assert_eq!(settings.ttl, 7_200);
        assert_eq!(settings.refresh_token_ttl, 604_800);
        assert_eq!(settings.clone().with_ttl("bogus").ttl, 7_200);
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = JwtRegistry::new();
        registry
            .register(JwtSettings::new("default", "acme"))
            .register(JwtSettings::new("admin", "acme-admin"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("admin").map(|s| s.issuer.as_str()), Some("acme-admin"));
        assert!(registry.get("other").is_none());
    }
}
