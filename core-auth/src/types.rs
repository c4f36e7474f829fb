//! Device authorization types.

use bridge_traits::Credential;
use std::fmt;
use std::time::Duration;

/// Code pair issued by the authorization server.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCode {
    /// Secret exchanged for the credential; never shown to the user
    pub device_code: String,
    /// Short code the user types on the verification page
    pub user_code: String,
    pub verification_url: String,
    /// Delay between token requests
    pub interval: Duration,
    /// Lifetime of the code, measured from issuance
    pub expires_in: Duration,
}

impl DeviceCode {
    /// The part of the code that is safe to show to the user.
    pub fn pending(&self) -> PendingAuthorization {
        PendingAuthorization {
            user_code: self.user_code.clone(),
            verification_url: self.verification_url.clone(),
            expires_in: self.expires_in,
        }
    }
}

impl fmt::Debug for DeviceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCode")
            .field("device_code", &"[REDACTED]")
            .field("user_code", &self.user_code)
            .field("verification_url", &self.verification_url)
            .field("interval", &self.interval)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// What the user needs to complete authorization elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub user_code: String,
    pub verification_url: String,
    pub expires_in: Duration,
}

/// Result of [`AuthManager::start`](crate::AuthManager::start).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStart {
    /// A credential is already stored; no flow was started
    AlreadyAuthorized,
    /// A poll loop is running for the returned code
    Started(PendingAuthorization),
}

/// Lifecycle of one device authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAuthState {
    Requested,
    Polling,
    Granted,
    Expired,
    Denied,
    /// Superseded by a newer authorization or cancelled explicitly
    Cancelled,
    /// Granted, but the credential could not be stored
    Failed,
}

impl DeviceAuthState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeviceAuthState::Requested | DeviceAuthState::Polling)
    }
}

impl fmt::Display for DeviceAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceAuthState::Requested => "requested",
            DeviceAuthState::Polling => "polling",
            DeviceAuthState::Granted => "granted",
            DeviceAuthState::Expired => "expired",
            DeviceAuthState::Denied => "denied",
            DeviceAuthState::Cancelled => "cancelled",
            DeviceAuthState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Classified answer of a single token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeResult {
    Granted(Credential),
    Pending,
    SlowDown,
    Expired,
    Denied,
    /// Any other error shape; treated as transient by the poll loop
    Unexpected(String),
}

/// Terminal outcome of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Granted(Credential),
    Expired,
    Denied,
    Cancelled,
}

impl PollOutcome {
    pub fn state(&self) -> DeviceAuthState {
        match self {
            PollOutcome::Granted(_) => DeviceAuthState::Granted,
            PollOutcome::Expired => DeviceAuthState::Expired,
            PollOutcome::Denied => DeviceAuthState::Denied,
            PollOutcome::Cancelled => DeviceAuthState::Cancelled,
        }
    }
}
