//! Account repository trait and implementation

use crate::error::Result;
use crate::models::{Account, AccountId};
use crate::repositories::now;
use async_trait::async_trait;
use bridge_traits::Credential;
use sqlx::{query, query_as, SqlitePool};

/// Account repository interface
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create the account row if it does not exist yet.
    ///
    /// # Returns
    /// `true` if a new row was created
    async fn ensure(&self, account: AccountId) -> Result<bool>;

    /// Find an account by its identifier
    ///
    /// # Returns
    /// - `Ok(Some(account))` if registered
    /// - `Ok(None)` if not found
    async fn find(&self, account: AccountId) -> Result<Option<Account>>;

    /// Stored credential, if any.
    async fn get_credential(&self, account: AccountId) -> Result<Option<Credential>>;

    /// Store a credential, replacing any previous one.
    ///
    /// Creates the account row when missing.
    async fn set_credential(&self, account: AccountId, credential: &Credential) -> Result<()>;

    /// Forget the stored credential.
    ///
    /// # Returns
    /// `true` if a credential was removed
    async fn clear_credential(&self, account: AccountId) -> Result<bool>;
}

/// SQLite implementation of AccountRepository
pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn ensure(&self, account: AccountId) -> Result<bool> {
        let ts = now();
        let result = query(
            r#"
            INSERT INTO accounts (id, upload_count, created_at, updated_at)
            VALUES (?, 0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(account)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, account: AccountId) -> Result<Option<Account>> {
        let row = query_as::<_, Account>(
            r#"
            SELECT id,
                   (credential IS NOT NULL AND credential != '') AS authorized,
                   upload_count, created_at, updated_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_credential(&self, account: AccountId) -> Result<Option<Credential>> {
        let row: Option<(Option<String>,)> =
            query_as("SELECT credential FROM accounts WHERE id = ?")
                .bind(account)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .and_then(|(credential,)| credential)
            .filter(|secret| !secret.is_empty())
            .map(Credential::new))
    }

    async fn set_credential(&self, account: AccountId, credential: &Credential) -> Result<()> {
        let ts = now();
        query(
            r#"
            INSERT INTO accounts (id, credential, upload_count, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                credential = excluded.credential,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account)
        .bind(credential.expose())
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_credential(&self, account: AccountId) -> Result<bool> {
        let result = query(
            "UPDATE accounts SET credential = NULL, updated_at = ? WHERE id = ? AND credential IS NOT NULL",
        )
        .bind(now())
        .bind(account)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
