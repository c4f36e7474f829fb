//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every core crate:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! Other crates depend on this one for the [`BridgeConfig`](config::BridgeConfig)
//! sections they consume and for the logging conventions used throughout.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BridgeConfig, MusicApiConfig, OAuthClientConfig, SessionPolicy, UploadConfig};
pub use error::{Error, Result};
