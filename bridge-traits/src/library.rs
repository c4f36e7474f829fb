//! Remote Music Library Abstraction
//!
//! The seam between the core and the remote music service. Every call takes
//! the credential explicitly; implementations keep no per-account session
//! state between calls.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::error::Result;

/// Opaque bearer secret tied to one account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for placing into request headers and storage only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// A collection (playlist) as the remote service reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCollection {
    /// Stable remote identity
    pub kind: String,
    pub title: String,
}

/// One-time upload URL plus the identifier of the track it will create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    pub upload_url: String,
    pub track_id: String,
}

/// Cover image bytes with their MIME type.
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub data: Bytes,
    pub mime_type: String,
}

/// Remote music library operations used by the synchronizer and the upload pipeline.
///
/// # Errors
///
/// - [`BridgeError::Network`](crate::BridgeError::Network) for transport failures and non-success statuses
/// - [`BridgeError::Protocol`](crate::BridgeError::Protocol) when a response lacks expected fields
/// - [`BridgeError::Unauthorized`](crate::BridgeError::Unauthorized) when the credential is rejected
#[async_trait]
pub trait MusicLibraryApi: Send + Sync {
    /// List the account's collections in remote order.
    async fn list_collections(&self, credential: &Credential) -> Result<Vec<RemoteCollection>>;

    /// Create a collection with the given title.
    async fn create_collection(
        &self,
        credential: &Credential,
        title: &str,
    ) -> Result<RemoteCollection>;

    /// Ask for a one-time upload slot targeting `collection_kind`.
    async fn request_upload_slot(
        &self,
        credential: &Credential,
        collection_kind: &str,
        file_name: &str,
    ) -> Result<UploadSlot>;

    /// Transfer the file bytes to the slot URL.
    async fn transfer(
        &self,
        credential: &Credential,
        slot: &UploadSlot,
        file_name: &str,
        data: Bytes,
    ) -> Result<()>;

    /// Set the display title of an uploaded track.
    async fn patch_title(&self, credential: &Credential, track_id: &str, title: &str)
        -> Result<()>;

    /// Replace the artwork of an uploaded track.
    async fn patch_cover(
        &self,
        credential: &Credential,
        track_id: &str,
        cover: CoverImage,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("y0_secret");
        assert_eq!(format!("{:?}", credential), "Credential([REDACTED])");
        assert_eq!(credential.expose(), "y0_secret");
    }
}
