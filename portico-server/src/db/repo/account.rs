use crate::db::DbResult;
use crate::models::account::Account;
use crate::models::types::AccountId;

/// Name column searched by [`AccountRepo::search_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    First,
    Last,
}

impl NameField {
    pub fn column(&self) -> &'static str {
        match self {
            NameField::First => "first_name",
            NameField::Last => "last_name",
        }
    }
}

/// Persistence boundary for accounts. Emails compare case-insensitively and are unique; an insert
/// or update that would break that returns `DbError::UniqueViolation`.
#[async_trait::async_trait]
pub trait AccountRepo: Send + Sync {
    async fn get_by_id(&self, account_id: AccountId) -> DbResult<Option<Account>>;
    async fn get_by_email(&self, email: &str) -> DbResult<Option<Account>>;
    async fn email_exists(&self, email: &str) -> DbResult<bool>;
    async fn insert_account(&self, account: Account) -> DbResult<Account>;
    /// Writes names and email in one statement. `DbError::NotFound` if the row is gone.
    async fn update_profile(&self, account: &Account) -> DbResult<Account>;
    async fn update_password(&self, account_id: AccountId, password_hash: &str) -> DbResult<()>;
    /// Case-insensitive substring match on one name column, in store order.
    async fn search_name(&self, field: NameField, needle: &str) -> DbResult<Vec<Account>>;
}
