//! Collection repository trait and implementation
//!
//! Every mutation that touches `is_active` runs in a single transaction so
//! that at most one collection per account is ever observed as active.

use crate::error::{LibraryError, Result};
use crate::models::{AccountId, Collection};
use crate::repositories::now;
use async_trait::async_trait;
use bridge_traits::RemoteCollection;
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

const SELECT_COLUMNS: &str =
    "SELECT id, account_id, kind, title, is_active, created_at, updated_at FROM collections";

/// Collection repository interface
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Upsert remote collections by their `kind`.
    ///
    /// Titles of known kinds are refreshed, unknown kinds are appended and
    /// rows absent from `remote` are kept. Activation flags are untouched.
    ///
    /// # Returns
    /// The account's full local collection list after the upsert
    async fn upsert_by_kind(
        &self,
        account: AccountId,
        remote: &[RemoteCollection],
    ) -> Result<Vec<Collection>>;

    /// All collections of an account, oldest first
    async fn list(&self, account: AccountId) -> Result<Vec<Collection>>;

    /// Find a collection by local id, scoped to its owner
    async fn find(&self, account: AccountId, id: i64) -> Result<Option<Collection>>;

    /// The account's active collection, if one is selected
    async fn find_active(&self, account: AccountId) -> Result<Option<Collection>>;

    /// Insert a single remote collection (or refresh its title).
    async fn insert(&self, account: AccountId, remote: &RemoteCollection) -> Result<Collection>;

    /// Deactivate every collection of the account and activate `id`.
    ///
    /// # Errors
    /// `NotFound` if `id` does not exist or belongs to another account;
    /// nothing is changed in that case.
    async fn activate_exclusive(&self, account: AccountId, id: i64) -> Result<Collection>;

    /// Activate the oldest collection when none is active.
    ///
    /// # Returns
    /// The active collection after the call, `None` when the account owns
    /// no collections
    async fn ensure_active(&self, account: AccountId) -> Result<Option<Collection>>;
}

/// SQLite implementation of CollectionRepository
pub struct SqliteCollectionRepository {
    pool: SqlitePool,
}

impl SqliteCollectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validate_remote(remote: &RemoteCollection) -> Result<()> {
    if remote.kind.trim().is_empty() {
        return Err(LibraryError::InvalidInput {
            field: "kind".to_string(),
            message: "Collection kind cannot be empty".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl CollectionRepository for SqliteCollectionRepository {
    async fn upsert_by_kind(
        &self,
        account: AccountId,
        remote: &[RemoteCollection],
    ) -> Result<Vec<Collection>> {
        for collection in remote {
            validate_remote(collection)?;
        }

        let ts = now();
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO accounts (id, upload_count, created_at, updated_at)
            VALUES (?, 0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(account)
        .bind(ts)
        .bind(ts)
        .execute(&mut *tx)
        .await?;

        for collection in remote {
            query(
                r#"
                INSERT INTO collections (account_id, kind, title, is_active, created_at, updated_at)
                VALUES (?, ?, ?, 0, ?, ?)
                ON CONFLICT(account_id, kind) DO UPDATE SET
                    title = excluded.title,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(account)
            .bind(&collection.kind)
            .bind(&collection.title)
            .bind(ts)
            .bind(ts)
            .execute(&mut *tx)
            .await?;
        }

        let rows = query_as::<_, Collection>(&format!(
            "{} WHERE account_id = ? ORDER BY id",
            SELECT_COLUMNS
        ))
        .bind(account)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(account = %account, upserted = remote.len(), total = rows.len(), "Collections upserted");
        Ok(rows)
    }

    async fn list(&self, account: AccountId) -> Result<Vec<Collection>> {
        let rows = query_as::<_, Collection>(&format!(
            "{} WHERE account_id = ? ORDER BY id",
            SELECT_COLUMNS
        ))
        .bind(account)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find(&self, account: AccountId, id: i64) -> Result<Option<Collection>> {
        let row = query_as::<_, Collection>(&format!(
            "{} WHERE id = ? AND account_id = ?",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_active(&self, account: AccountId) -> Result<Option<Collection>> {
        let row = query_as::<_, Collection>(&format!(
            "{} WHERE account_id = ? AND is_active = 1",
            SELECT_COLUMNS
        ))
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert(&self, account: AccountId, remote: &RemoteCollection) -> Result<Collection> {
        let mut rows = self
            .upsert_by_kind(account, std::slice::from_ref(remote))
            .await?;

        rows.retain(|c| c.kind == remote.kind);
        rows.pop().ok_or_else(|| LibraryError::NotFound {
            entity_type: "Collection".to_string(),
            id: remote.kind.clone(),
        })
    }

    async fn activate_exclusive(&self, account: AccountId, id: i64) -> Result<Collection> {
        let ts = now();
        let mut tx = self.pool.begin().await?;

        // Only touch the current selection when the target is owned by the account
        query(
            r#"
            UPDATE collections
            SET is_active = 0, updated_at = ?
            WHERE account_id = ?
              AND is_active = 1
              AND id != ?
              AND EXISTS (SELECT 1 FROM collections WHERE id = ? AND account_id = ?)
            "#,
        )
        .bind(ts)
        .bind(account)
        .bind(id)
        .bind(id)
        .bind(account)
        .execute(&mut *tx)
        .await?;

        let activated = query(
            "UPDATE collections SET is_active = 1, updated_at = ? WHERE id = ? AND account_id = ?",
        )
        .bind(ts)
        .bind(id)
        .bind(account)
        .execute(&mut *tx)
        .await?;

        if activated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(LibraryError::NotFound {
                entity_type: "Collection".to_string(),
                id: id.to_string(),
            });
        }

        let row = query_as::<_, Collection>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(account = %account, collection_id = id, kind = %row.kind, "Collection activated");
        Ok(row)
    }

    async fn ensure_active(&self, account: AccountId) -> Result<Option<Collection>> {
        query(
            r#"
            UPDATE collections
            SET is_active = 1, updated_at = ?
            WHERE id = (SELECT MIN(id) FROM collections WHERE account_id = ?)
              AND NOT EXISTS (
                  SELECT 1 FROM collections WHERE account_id = ? AND is_active = 1
              )
            "#,
        )
        .bind(now())
        .bind(account)
        .bind(account)
        .execute(&self.pool)
        .await?;

        self.find_active(account).await
    }
}
