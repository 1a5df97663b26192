use crate::db::repo::account::AccountRepo;
use crate::error::{AppResult, DomainError};
use async_trait::async_trait;
use portico_core::{Input, RuleSet, Validation};
use std::sync::Arc;

/// Applies a rule set to a request payload.
#[async_trait]
pub trait ValidationGateway: Send + Sync {
    async fn validate(&self, rules: &RuleSet, input: &Input) -> AppResult<Validation>;
}

/// Evaluates rules in-process and answers uniqueness probes from the account store.
pub struct RuleValidator {
    accounts: Arc<dyn AccountRepo>,
}

impl RuleValidator {
    pub fn new(accounts: Arc<dyn AccountRepo>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl ValidationGateway for RuleValidator {
    async fn validate(&self, rules: &RuleSet, input: &Input) -> AppResult<Validation> {
        let (mut validation, probes) = rules.evaluate(input);

        for probe in &probes {
            let taken = match probe.field.as_str() {
                "email" => self.accounts.email_exists(&probe.value).await?,
                other => return Err(DomainError::InvalidData(format!("no unique index for field {other}"))),
            };
            validation.resolve(probe, taken);
        }

        Ok(validation)
    }
}
