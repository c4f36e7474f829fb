//! # Authentication Module
//!
//! Device-authorization flow and per-account credential management.
//!
//! ## Overview
//!
//! This module handles:
//! - Device code issuance and the background token poll loop
//! - At most one live authorization per account, superseded on restart
//! - Manual credential entry with format validation
//! - Status message updates for each terminal outcome

pub mod device;
pub mod error;
pub mod manager;
pub mod types;

pub use device::DeviceAuthFlow;
pub use error::{AuthError, Result};
pub use manager::{validate_credential, AuthManager};
pub use types::{AuthStart, DeviceAuthState, DeviceCode, ExchangeResult, PendingAuthorization, PollOutcome};
