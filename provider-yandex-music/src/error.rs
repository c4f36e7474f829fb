//! Error types for the Yandex Music provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Yandex Music provider errors
#[derive(Error, Debug)]
pub enum YandexMusicError {
    /// The credential was rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned a non-success status
    #[error("Yandex Music API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Response is missing expected fields under every known key scheme
    #[error("Missing field in response: {0}")]
    MissingField(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The upload host answered without a success marker
    #[error("Transfer rejected (status {status_code}): {body}")]
    TransferRejected { status_code: u16, body: String },

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Yandex Music operations
pub type Result<T> = std::result::Result<T, YandexMusicError>;

impl From<YandexMusicError> for BridgeError {
    fn from(error: YandexMusicError) -> Self {
        match error {
            YandexMusicError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            YandexMusicError::ApiError {
                status_code,
                message,
            } => BridgeError::status(status_code, message),
            YandexMusicError::MissingField(msg) => {
                BridgeError::Protocol(format!("Missing field: {}", msg))
            }
            YandexMusicError::ParseError(msg) => {
                BridgeError::Protocol(format!("Parse error: {}", msg))
            }
            YandexMusicError::TransferRejected { status_code, body } => BridgeError::status(
                status_code,
                format!("Transfer rejected with response {:?}", body),
            ),
            YandexMusicError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = YandexMusicError::ApiError {
            status_code: 404,
            message: "Playlist not found".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Yandex Music API error (status 404): Playlist not found"
        );
    }

    #[test]
    fn test_error_conversion_keeps_category() {
        let unauthorized: BridgeError =
            YandexMusicError::AuthenticationFailed("Token revoked".to_string()).into();
        assert!(matches!(unauthorized, BridgeError::Unauthorized(_)));

        let protocol: BridgeError = YandexMusicError::MissingField("post_target".to_string()).into();
        assert!(matches!(protocol, BridgeError::Protocol(_)));

        let network: BridgeError = YandexMusicError::ApiError {
            status_code: 502,
            message: "Bad gateway".to_string(),
        }
        .into();
        assert!(matches!(
            network,
            BridgeError::Network {
                status: Some(502),
                ..
            }
        ));

        let rejected: BridgeError = YandexMusicError::TransferRejected {
            status_code: 200,
            body: "FAILED".to_string(),
        }
        .into();
        assert!(matches!(rejected, BridgeError::Network { .. }));
    }
}
