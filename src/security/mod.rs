//! Token verification for `#[jwt_auth]` routes.

mod settings;

pub use settings::{JwtRegistry, JwtSettings};

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::error::AuthenticationError;
use crate::http::Token;

/// Checks a parsed token against the settings named by a route's auth policy.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: &Token, settings: &JwtSettings) -> Result<(), AuthenticationError>;
}

/// Verifies issuer and expiry, and the HMAC signature when a secret is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtVerifier {
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway: u64,
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &Token, settings: &JwtSettings) -> Result<(), AuthenticationError> {
        if token.issuer() != Some(settings.issuer.as_str()) {
            return Err(AuthenticationError::Invalid);
        }

        if let Some(secret) = settings.secret.as_deref() {
            let algorithm = token.algorithm();
            if !matches!(
                algorithm,
                Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
            ) {
                return Err(AuthenticationError::Invalid);
            }
            let mut validation = Validation::new(algorithm);
            validation.leeway = self.leeway;
            validation.validate_aud = false;
            validation.required_spec_claims.clear();
            validation.set_issuer(&[settings.issuer.as_str()]);
            return jsonwebtoken::decode::<Map<String, Value>>(
                token.raw(),
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            )
            .map(|_| ())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthenticationError::Expired,
                _ => AuthenticationError::Invalid,
            });
        }

        match token.expires_at() {
            Some(exp) if exp + (self.leeway as i64) < Utc::now().timestamp() => {
                Err(AuthenticationError::Expired)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::token::tests::sign;
    use serde_json::json;

    fn settings() -> JwtSettings {
        JwtSettings::new("default", "acme").with_secret("s3cret")
    }

    #[test]
    fn test_valid_token() {
        let raw = settings()
            .with_ttl("1h")
            .issue(json!({"uid": 1}).as_object().cloned().unwrap())
            .unwrap();
        let token = Token::parse(&raw).unwrap();
        assert_eq!(JwtVerifier::default().verify(&token, &settings()), Ok(()));
    }

    #[test]
    fn test_wrong_issuer_or_signature_is_invalid() {
        let token = Token::parse(&sign(json!({"iss": "other"}), "s3cret")).unwrap();
        assert_eq!(
            JwtVerifier::default().verify(&token, &settings()),
            Err(AuthenticationError::Invalid)
        );

        let token = Token::parse(&sign(json!({"iss": "acme"}), "wrong")).unwrap();
        assert_eq!(
            JwtVerifier::default().verify(&token, &settings()),
            Err(AuthenticationError::Invalid)
        );
    }

    #[test]
    fn test_expired_token() {
        let exp = Utc::now().timestamp() - 600;
        let token = Token::parse(&sign(json!({"iss": "acme", "exp": exp}), "s3cret")).unwrap();
        assert_eq!(
            JwtVerifier::default().verify(&token, &settings()),
            Err(AuthenticationError::Expired)
        );

        let unsigned = JwtSettings::new("default", "acme");
        assert_eq!(
            JwtVerifier::default().verify(&token, &unsigned),
            Err(AuthenticationError::Expired)
        );
    }
}
