use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authorization server unreachable: {0}")]
    Network(String),

    #[error("Unexpected authorization server response: {0}")]
    Protocol(String),

    #[error("Authorization was denied")]
    Denied,

    #[error("Authorization code expired")]
    Expired,

    #[error("Invalid credential: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Library(#[from] LibraryError),
}

impl From<BridgeError> for AuthError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Protocol(msg) => AuthError::Protocol(msg),
            other => AuthError::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
