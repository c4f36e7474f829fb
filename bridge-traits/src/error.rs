use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Endpoint unreachable, or it answered with a non-success status.
    #[error("Network error{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The response did not carry the fields expected under any known scheme.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote side rejected the credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Build a network error from a transport failure without a status code.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Build a network error for a non-success HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_display() {
        assert_eq!(
            BridgeError::status(502, "bad gateway").to_string(),
            "Network error (status 502): bad gateway"
        );
        assert_eq!(
            BridgeError::network("connection refused").to_string(),
            "Network error: connection refused"
        );
    }
}
