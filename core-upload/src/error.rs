use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use std::fmt;
use thiserror::Error;

/// Account state an upload session needs before it can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    Credential,
    ActiveCollection,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::Credential => f.write_str("credential"),
            Prerequisite::ActiveCollection => f.write_str("active collection"),
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload blocked: no {missing}")]
    State { missing: Prerequisite },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Credential rejected: {0}")]
    Auth(String),

    #[error("Scratch storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Library(#[from] LibraryError),
}

impl From<BridgeError> for UploadError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Unauthorized(msg) => UploadError::Auth(msg),
            BridgeError::Protocol(msg) => UploadError::Protocol(msg),
            BridgeError::Io(e) => UploadError::Io(e),
            other => UploadError::Network(other.to_string()),
        }
    }
}

impl UploadError {
    /// Text shown to the user when a file could not be uploaded.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::State {
                missing: Prerequisite::Credential,
            } => "You are not authorized yet. Start authorization first.".to_string(),
            UploadError::State {
                missing: Prerequisite::ActiveCollection,
            } => "No playlist is selected. Choose a playlist first.".to_string(),
            UploadError::Auth(_) => {
                "The music service rejected your authorization. Authorize again and resend the file."
                    .to_string()
            }
            UploadError::Network(_) | UploadError::Protocol(_) => {
                "The music service did not accept the file. Send it again.".to_string()
            }
            UploadError::Io(_) | UploadError::Library(_) => {
                "Something went wrong while processing the file. Send it again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_categories_survive() {
        assert!(matches!(
            UploadError::from(BridgeError::Unauthorized("revoked".into())),
            UploadError::Auth(_)
        ));
        assert!(matches!(
            UploadError::from(BridgeError::Protocol("no post_target".into())),
            UploadError::Protocol(_)
        ));
        assert!(matches!(
            UploadError::from(BridgeError::status(500, "oops")),
            UploadError::Network(_)
        ));
    }

    #[test]
    fn test_state_error_names_prerequisite() {
        let error = UploadError::State {
            missing: Prerequisite::ActiveCollection,
        };
        assert_eq!(error.to_string(), "Upload blocked: no active collection");
        assert!(error.user_message().contains("playlist"));
    }
}
