use crate::db::error::DbError;
use crate::db::repo::account::{AccountRepo, NameField};
use crate::db::{Db, DbResult};
use crate::models::account::Account;
use crate::models::types::AccountId;
use std::sync::Arc;

pub struct AccountRepository {
    db: Arc<Db>,
}

impl AccountRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

/// Escapes LIKE wildcards so the needle is matched literally.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait::async_trait]
impl AccountRepo for AccountRepository {
    async fn get_by_id(&self, account_id: AccountId) -> DbResult<Option<Account>> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
            SELECT id, first_name, last_name, email, password_hash, photo, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
            )
            .await?;

        let row_opt = client.query_opt(&stmt, &[&account_id]).await?;
        row_opt.as_ref().map(Account::try_from_row).transpose()
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
            SELECT id, first_name, last_name, email, password_hash, photo, created_at, updated_at
            FROM accounts
            WHERE lower(email) = lower($1)
            "#,
            )
            .await?;

        let row_opt = client.query_opt(&stmt, &[&email]).await?;
        row_opt.as_ref().map(Account::try_from_row).transpose()
    }

    async fn email_exists(&self, email: &str) -> DbResult<bool> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT EXISTS(SELECT 1 FROM accounts WHERE lower(email) = lower($1))")
            .await?;
        let row = client.query_one(&stmt, &[&email]).await?;

        Ok(row.try_get::<_, bool>(0)?)
    }

    async fn insert_account(&self, account: Account) -> DbResult<Account> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
            INSERT INTO accounts (id, first_name, last_name, email, password_hash, photo, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, first_name, last_name, email, password_hash, photo, created_at, updated_at
            "#,
            )
            .await?;

        let row = client
            .query_one(
                &stmt,
                &[
                    &account.id,
                    &account.first_name,
                    &account.last_name,
                    &account.email,
                    &account.password_hash,
                    &account.photo,
                    &account.created_at,
                ],
            )
            .await
            .map_err(DbError::classify)?;

        Account::try_from_row(&row)
    }

    async fn update_profile(&self, account: &Account) -> DbResult<Account> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached(
                r#"
            UPDATE accounts
            SET first_name = $2, last_name = $3, email = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash, photo, created_at, updated_at
            "#,
            )
            .await?;

        let row = client
            .query_opt(&stmt, &[&account.id, &account.first_name, &account.last_name, &account.email])
            .await
            .map_err(DbError::classify)?
            .ok_or(DbError::NotFound)?;

        Account::try_from_row(&row)
    }

    async fn update_password(&self, account_id: AccountId, password_hash: &str) -> DbResult<()> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .await?;
        match client.execute(&stmt, &[&account_id, &password_hash]).await? {
            0 => Err(DbError::NotFound),
            _ => Ok(()),
        }
    }

    async fn search_name(&self, field: NameField, needle: &str) -> DbResult<Vec<Account>> {
        let client = self.db.get_client().await?;

        // column names cannot be bound; `column()` only yields fixed identifiers
        let sql = format!(
            r#"
            SELECT id, first_name, last_name, email, password_hash, photo, created_at, updated_at
            FROM accounts
            WHERE {} ILIKE $1 ESCAPE '\'
            ORDER BY created_at, id
            "#,
            field.column()
        );
        let stmt = client.prepare_cached(&sql).await?;

        let rows = client.query(&stmt, &[&like_pattern(needle)]).await?;
        rows.iter().map(Account::try_from_row).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
