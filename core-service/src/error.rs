use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use core_sync::SyncError;
use core_upload::{Prerequisite, UploadError};
use thiserror::Error;

/// Broad failure category, used by the front end to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Endpoint unreachable or answered with a non-success status
    Network,
    /// Response lacked the expected fields
    Protocol,
    /// Authorization denied or expired, or credential rejected
    Auth,
    /// Malformed user input
    Validation,
    /// Missing credential or active collection
    State,
    Internal,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

fn bridge_kind(error: &BridgeError) -> ErrorKind {
    match error {
        BridgeError::Unauthorized(_) => ErrorKind::Auth,
        BridgeError::Protocol(_) => ErrorKind::Protocol,
        BridgeError::Network { .. } => ErrorKind::Network,
        BridgeError::NotAvailable(_) | BridgeError::OperationFailed(_) | BridgeError::Io(_) => {
            ErrorKind::Internal
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InitializationFailed(_) | CoreError::Config(_) | CoreError::Library(_) => {
                ErrorKind::Internal
            }
            CoreError::Auth(e) => match e {
                AuthError::Network(_) => ErrorKind::Network,
                AuthError::Protocol(_) => ErrorKind::Protocol,
                AuthError::Denied | AuthError::Expired => ErrorKind::Auth,
                AuthError::Validation(_) => ErrorKind::Validation,
                AuthError::Library(_) => ErrorKind::Internal,
            },
            CoreError::Sync(e) => match e {
                SyncError::MissingCredential(_) | SyncError::NoCollections(_) => ErrorKind::State,
                SyncError::UnknownCollection { .. } => ErrorKind::Validation,
                SyncError::Remote(e) => bridge_kind(e),
                SyncError::Library(_) => ErrorKind::Internal,
            },
            CoreError::Upload(e) => match e {
                UploadError::State { .. } => ErrorKind::State,
                UploadError::Network(_) => ErrorKind::Network,
                UploadError::Protocol(_) => ErrorKind::Protocol,
                UploadError::Auth(_) => ErrorKind::Auth,
                UploadError::Io(_) | UploadError::Library(_) => ErrorKind::Internal,
            },
        }
    }

    /// Corrective message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Upload(e) => e.user_message(),
            CoreError::Sync(SyncError::MissingCredential(_)) => UploadError::State {
                missing: Prerequisite::Credential,
            }
            .user_message(),
            CoreError::Sync(SyncError::UnknownCollection { .. }) => {
                "That playlist is not available. Refresh the list and choose again.".to_string()
            }
            CoreError::Auth(AuthError::Validation(_)) => {
                "That does not look like a valid token. Check it and send it again.".to_string()
            }
            CoreError::Auth(AuthError::Denied) | CoreError::Auth(AuthError::Expired) => {
                "Authorization did not complete. Start authorization again.".to_string()
            }
            other => match other.kind() {
                ErrorKind::Auth => {
                    "The music service rejected your authorization. Authorize again.".to_string()
                }
                ErrorKind::Network | ErrorKind::Protocol => {
                    "The music service is not responding as expected. Try again later.".to_string()
                }
                _ => "Something went wrong. Try again later.".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::AccountId;

    #[test]
    fn test_kinds_follow_taxonomy() {
        let state: CoreError = UploadError::State {
            missing: Prerequisite::ActiveCollection,
        }
        .into();
        assert_eq!(state.kind(), ErrorKind::State);

        let validation: CoreError = AuthError::Validation("bad".into()).into();
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let revoked: CoreError =
            SyncError::Remote(BridgeError::Unauthorized("revoked".into())).into();
        assert_eq!(revoked.kind(), ErrorKind::Auth);

        let missing: CoreError = SyncError::MissingCredential(AccountId(1)).into();
        assert_eq!(missing.kind(), ErrorKind::State);
        assert!(missing.user_message().contains("authorization"));
    }

    #[test]
    fn test_upload_messages_pass_through() {
        let error: CoreError = UploadError::Protocol("no slot".into()).into();
        assert_eq!(
            error.user_message(),
            "The music service did not accept the file. Send it again."
        );
    }
}
