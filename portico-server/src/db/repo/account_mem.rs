use crate::db::error::DbError;
use crate::db::repo::account::{AccountRepo, NameField};
use crate::db::DbResult;
use crate::models::account::Account;
use crate::models::types::AccountId;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local account store. Rows, insertion order and the email index live behind one lock so
/// the uniqueness check and the write happen together.
#[derive(Default)]
pub struct MemoryAccountRepo {
    inner: RwLock<MemAccounts>,
}

#[derive(Default)]
struct MemAccounts {
    order: Vec<AccountId>,
    rows: HashMap<AccountId, Account>,
    emails: HashMap<String, AccountId>,
}

impl MemoryAccountRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn email_key(email: &str) -> String {
    email.to_lowercase()
}

#[async_trait]
impl AccountRepo for MemoryAccountRepo {
    async fn get_by_id(&self, account_id: AccountId) -> DbResult<Option<Account>> {
        Ok(self.inner.read().rows.get(&account_id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let inner = self.inner.read();
        Ok(inner
            .emails
            .get(&email_key(email))
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    async fn email_exists(&self, email: &str) -> DbResult<bool> {
        Ok(self.inner.read().emails.contains_key(&email_key(email)))
    }

    async fn insert_account(&self, account: Account) -> DbResult<Account> {
        let mut inner = self.inner.write();
        let key = email_key(&account.email);
        if inner.emails.contains_key(&key) {
            return Err(DbError::UniqueViolation);
        }

        inner.emails.insert(key, account.id);
        inner.order.push(account.id);
        inner.rows.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_profile(&self, account: &Account) -> DbResult<Account> {
        let mut inner = self.inner.write();
        let Some(old_email) = inner.rows.get(&account.id).map(|a| email_key(&a.email)) else {
            return Err(DbError::NotFound);
        };

        let new_email = email_key(&account.email);
        if new_email != old_email {
            if inner.emails.contains_key(&new_email) {
                return Err(DbError::UniqueViolation);
            }
            inner.emails.remove(&old_email);
            inner.emails.insert(new_email, account.id);
        }

        let row = inner.rows.get_mut(&account.id).ok_or(DbError::NotFound)?;
        row.first_name = account.first_name.clone();
        row.last_name = account.last_name.clone();
        row.email = account.email.clone();
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn update_password(&self, account_id: AccountId, password_hash: &str) -> DbResult<()> {
        let mut inner = self.inner.write();
        let row = inner.rows.get_mut(&account_id).ok_or(DbError::NotFound)?;
        row.password_hash = password_hash.to_string();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn search_name(&self, field: NameField, needle: &str) -> DbResult<Vec<Account>> {
        let needle = needle.to_lowercase();
        let inner = self.inner.read();

        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.rows.get(id))
            .filter(|a| {
                let name = match field {
                    NameField::First => &a.first_name,
                    NameField::Last => &a.last_name,
                };
                name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}
