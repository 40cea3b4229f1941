use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Phase};
use crate::validation::DataValidator;

/// Checks request data against a route's `#[validate]` rules.
#[derive(Clone, Default)]
pub struct Validate {
    validator: Arc<DataValidator>,
}

impl Validate {
    pub fn new(validator: Arc<DataValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Middleware for Validate {
    fn phase(&self) -> Phase {
        Phase::Pre
    }

    async fn handle(&self, request: &Request, _response: &mut Response) -> Result<(), DispatchError> {
        let Some(policy) = request.route().and_then(|r| r.validation_rules.as_ref()) else {
            return Ok(());
        };
        if policy.rules.is_empty() {
            return Ok(());
        }
        let data = request.map(&[]);
        self.validator.validate(&data, &policy.rules, policy.failfast)?;
        Ok(())
    }
}
