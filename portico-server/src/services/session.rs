use crate::error::AppResult;
use crate::models::account::Account;
use crate::models::types::AccountId;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues bearer tokens for verified accounts and maps them back to an identity.
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn generate(&self, account: &Account) -> AppResult<AccessToken>;
    /// Account behind a token, or `None` when unknown or expired.
    async fn resolve(&self, token: &str) -> AppResult<Option<AccountId>>;
}

struct Grant {
    account_id: AccountId,
    expires_at: DateTime<Utc>,
}

/// Opaque random tokens kept in process memory.
pub struct MemorySessions {
    grants: DashMap<String, Grant>,
    ttl: TimeDelta,
}

impl MemorySessions {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self { grants: DashMap::new(), ttl }
    }

    fn new_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[async_trait]
impl SessionIssuer for MemorySessions {
    async fn generate(&self, account: &Account) -> AppResult<AccessToken> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let token = Self::new_token();

        self.grants.insert(token.clone(), Grant { account_id: account.id, expires_at });
        // expired grants are otherwise only dropped when presented again
        self.grants.retain(|_, g| g.expires_at > now);

        Ok(AccessToken { kind: "bearer", token, expires_at })
    }

    async fn resolve(&self, token: &str) -> AppResult<Option<AccountId>> {
        let now = Utc::now();
        let Some(grant) = self.grants.get(token) else {
            return Ok(None);
        };
        if grant.expires_at > now {
            return Ok(Some(grant.account_id));
        }

        drop(grant);
        self.grants.remove(token);
        Ok(None)
    }
}
