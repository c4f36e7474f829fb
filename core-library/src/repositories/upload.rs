//! Upload counter and history repository

use crate::error::{LibraryError, Result};
use crate::models::{AccountId, NewUpload, UploadRecord};
use crate::repositories::now;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Upload repository interface
#[async_trait]
pub trait UploadRepository: Send + Sync {
    /// Increment the account's upload counter and append a history record.
    ///
    /// Both writes commit together or not at all.
    ///
    /// # Errors
    /// `NotFound` if the account is not registered, `InvalidInput` if the
    /// record fails validation
    async fn record_success(&self, account: AccountId, upload: &NewUpload) -> Result<UploadRecord>;

    /// Most recent uploads first
    async fn recent(&self, account: AccountId, limit: u32) -> Result<Vec<UploadRecord>>;

    /// Current value of the upload counter (0 for unknown accounts)
    async fn upload_count(&self, account: AccountId) -> Result<i64>;
}

/// SQLite implementation of UploadRepository
pub struct SqliteUploadRepository {
    pool: SqlitePool,
}

impl SqliteUploadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadRepository for SqliteUploadRepository {
    async fn record_success(&self, account: AccountId, upload: &NewUpload) -> Result<UploadRecord> {
        upload
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "upload".to_string(),
                message,
            })?;

        let ts = now();
        let mut tx = self.pool.begin().await?;

        let updated = query(
            "UPDATE accounts SET upload_count = upload_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(ts)
        .bind(account)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(LibraryError::NotFound {
                entity_type: "Account".to_string(),
                id: account.to_string(),
            });
        }

        let record = query_as::<_, UploadRecord>(
            r#"
            INSERT INTO upload_history (
                account_id, collection_kind, remote_track_id, artist, title,
                content_hash, uploaded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, account_id, collection_kind, remote_track_id, artist, title,
                      content_hash, uploaded_at
            "#,
        )
        .bind(account)
        .bind(&upload.collection_kind)
        .bind(&upload.remote_track_id)
        .bind(&upload.artist)
        .bind(&upload.title)
        .bind(&upload.content_hash)
        .bind(ts)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn recent(&self, account: AccountId, limit: u32) -> Result<Vec<UploadRecord>> {
        let rows = query_as::<_, UploadRecord>(
            r#"
            SELECT id, account_id, collection_kind, remote_track_id, artist, title,
                   content_hash, uploaded_at
            FROM upload_history
            WHERE account_id = ?
            ORDER BY uploaded_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(account)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn upload_count(&self, account: AccountId) -> Result<i64> {
        let row: Option<(i64,)> = query_as("SELECT upload_count FROM accounts WHERE id = ?")
            .bind(account)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(count,)| count).unwrap_or(0))
    }
}
