use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AuthenticationError, DispatchError};
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Phase};
use crate::security::{JwtRegistry, JwtVerifier, TokenVerifier};

/// Rejects requests to `#[jwt_auth]` routes that carry no acceptable token.
///
/// A route whose settings key is unknown, or whose settings have no issuer,
/// is let through.
#[derive(Clone)]
pub struct JwtAuth {
    registry: Arc<JwtRegistry>,
    verifier: Arc<dyn TokenVerifier>,
}

impl JwtAuth {
    pub fn new(registry: Arc<JwtRegistry>) -> Self {
        Self {
            registry,
            verifier: Arc::new(JwtVerifier::default()),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }
}

#[async_trait]
impl Middleware for JwtAuth {
    fn phase(&self) -> Phase {
        Phase::Pre
    }

    async fn handle(&self, request: &Request, _response: &mut Response) -> Result<(), DispatchError> {
        let Some(key) = request.route().and_then(|r| r.auth_policy.as_deref()) else {
            return Ok(());
        };
        let Some(settings) = self.registry.get(key).filter(|s| !s.issuer.is_empty()) else {
            debug!(key, "no usable jwt settings, skipping auth check");
            return Ok(());
        };
        let token = request.token().ok_or(AuthenticationError::Missing)?;
        self.verifier.verify(token, settings)?;
        Ok(())
    }
}
