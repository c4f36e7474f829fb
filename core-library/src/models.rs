//! Domain models for the bridge database
//!
//! Plain row types mapped with `sqlx::FromRow`, plus the account identifier
//! every other crate keys its state by.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Chat-side account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Account row, without the credential itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    /// Whether a credential is currently stored
    pub authorized: bool,
    pub upload_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Local record of a remote collection owned by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Collection {
    /// Local identifier, used when the user selects a collection
    pub id: i64,
    pub account_id: AccountId,
    /// Stable remote identity
    pub kind: String,
    pub title: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One successful upload, as appended to the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UploadRecord {
    pub id: i64,
    pub account_id: AccountId,
    pub collection_kind: String,
    pub remote_track_id: String,
    pub artist: String,
    pub title: String,
    pub content_hash: Option<String>,
    pub uploaded_at: i64,
}

/// Input for recording a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpload {
    pub collection_kind: String,
    pub remote_track_id: String,
    pub artist: String,
    pub title: String,
    pub content_hash: Option<String>,
}

impl NewUpload {
    pub fn validate(&self) -> Result<(), String> {
        if self.collection_kind.trim().is_empty() {
            return Err("Collection kind cannot be empty".to_string());
        }
        if self.remote_track_id.trim().is_empty() {
            return Err("Remote track id cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("Title cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display() {
        assert_eq!(AccountId(42).to_string(), "42");
        assert_eq!(AccountId::from(7), AccountId(7));
    }

    #[test]
    fn test_new_upload_validation() {
        let mut upload = NewUpload {
            collection_kind: "1003".to_string(),
            remote_track_id: "555".to_string(),
            artist: "Band".to_string(),
            title: "Song".to_string(),
            content_hash: None,
        };
        assert!(upload.validate().is_ok());

        upload.remote_track_id = " ".to_string();
        assert!(upload.validate().is_err());
    }
}
