//! # Bridge Configuration Module
//!
//! Provides configuration for the upload bridge.
//!
//! ## Overview
//!
//! A builder constructs a [`BridgeConfig`] holding storage locations, the
//! OAuth client registration, remote API endpoints and upload policy.
//! Validation is fail-fast: `build()` rejects empty paths, a missing client
//! registration and nonsensical intervals before anything touches the network.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{BridgeConfig, SessionPolicy};
//!
//! let config = BridgeConfig::builder()
//!     .database_path("/var/lib/bridge/bridge.db")
//!     .scratch_dir("/var/lib/bridge/scratch")
//!     .client_credentials("client-id", "client-secret")
//!     .session_policy(SessionPolicy::RefetchPerFile)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// How an upload session treats the credential and active collection it
/// resolved at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Resolve once when the session opens and reuse for every file.
    #[default]
    SnapshotOnce,
    /// Resolve again before each file, picking up a changed selection.
    RefetchPerFile,
}

/// OAuth device-flow client registration and endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Device code issuance endpoint
    pub device_code_url: String,
    /// Token exchange endpoint
    pub token_url: String,
    /// Used when the code response omits `verification_url`
    pub fallback_verification_url: String,
    /// Used when the code response omits `interval`
    pub fallback_interval: Duration,
    /// Used when the code response omits `expires_in`
    pub fallback_expires_in: Duration,
    /// Added to the poll interval on every `slow_down` answer
    pub slow_down_step: Duration,
}

impl OAuthClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            device_code_url: "https://oauth.yandex.ru/device/code".to_string(),
            token_url: "https://oauth.yandex.ru/token".to_string(),
            fallback_verification_url: "https://oauth.yandex.ru/device".to_string(),
            fallback_interval: Duration::from_secs(5),
            fallback_expires_in: Duration::from_secs(300),
            slow_down_step: Duration::from_secs(1),
        }
    }

    pub fn with_endpoints(
        mut self,
        device_code_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.device_code_url = device_code_url.into();
        self.token_url = token_url.into();
        self
    }

    pub fn with_slow_down_step(mut self, step: Duration) -> Self {
        self.slow_down_step = step;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("OAuth client id cannot be empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "OAuth client secret cannot be empty".to_string(),
            ));
        }
        if self.device_code_url.is_empty() || self.token_url.is_empty() {
            return Err(Error::Config("OAuth endpoints cannot be empty".to_string()));
        }
        if self.fallback_interval.is_zero() {
            return Err(Error::Config(
                "Fallback poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("device_code_url", &self.device_code_url)
            .field("token_url", &self.token_url)
            .field("fallback_verification_url", &self.fallback_verification_url)
            .field("fallback_interval", &self.fallback_interval)
            .field("fallback_expires_in", &self.fallback_expires_in)
            .field("slow_down_step", &self.slow_down_step)
            .finish()
    }
}

/// Remote music API endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicApiConfig {
    /// JSON API used for account and collection calls
    pub api_base_url: String,
    /// Web handlers used for upload slots and track edits
    pub web_base_url: String,
    /// Visibility requested for uploads and new collections
    pub visibility: String,
    /// Timeout for metadata calls
    pub request_timeout: Duration,
    /// Timeout for the byte transfer
    pub transfer_timeout: Duration,
}

impl Default for MusicApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.music.yandex.net".to_string(),
            web_base_url: "https://music.yandex.ru".to_string(),
            visibility: "private".to_string(),
            request_timeout: Duration::from_secs(30),
            transfer_timeout: Duration::from_secs(300),
        }
    }
}

impl MusicApiConfig {
    pub fn with_base_urls(
        mut self,
        api_base_url: impl Into<String>,
        web_base_url: impl Into<String>,
    ) -> Self {
        self.api_base_url = api_base_url.into();
        self.web_base_url = web_base_url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() || self.web_base_url.is_empty() {
            return Err(Error::Config("Music API base URLs cannot be empty".to_string()));
        }
        if self.visibility.is_empty() {
            return Err(Error::Config("Upload visibility cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Upload pipeline behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub session_policy: SessionPolicy,
    /// Artist used when the file carries none; also the sentinel omitted from titles
    pub default_artist: String,
    /// Title of the collection created for accounts that have none
    pub default_collection_title: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            session_policy: SessionPolicy::default(),
            default_artist: "Unknown Artist".to_string(),
            default_collection_title: "Uploads".to_string(),
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    /// Directory for per-upload scratch files
    pub scratch_dir: PathBuf,
    pub oauth: OAuthClientConfig,
    pub music_api: MusicApiConfig,
    pub upload: UploadConfig,
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.scratch_dir.as_os_str().is_empty() {
            return Err(Error::Config("Scratch directory cannot be empty".to_string()));
        }

        self.oauth.validate()?;
        self.music_api.validate()?;

        if self.upload.default_artist.trim().is_empty() {
            return Err(Error::Config("Default artist cannot be empty".to_string()));
        }

        if self.upload.default_collection_title.trim().is_empty() {
            return Err(Error::Config(
                "Default collection title cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Default)]
pub struct BridgeConfigBuilder {
    database_path: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    oauth: Option<OAuthClientConfig>,
    music_api: Option<MusicApiConfig>,
    upload: UploadConfig,
}

impl BridgeConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn scratch_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.scratch_dir = Some(path.into());
        self
    }

    /// Sets the OAuth client registration with default endpoints.
    pub fn client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.oauth = Some(OAuthClientConfig::new(client_id, client_secret));
        self
    }

    pub fn oauth(mut self, oauth: OAuthClientConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    pub fn music_api(mut self, music_api: MusicApiConfig) -> Self {
        self.music_api = Some(music_api);
        self
    }

    pub fn session_policy(mut self, policy: SessionPolicy) -> Self {
        self.upload.session_policy = policy;
        self
    }

    pub fn default_artist(mut self, artist: impl Into<String>) -> Self {
        self.upload.default_artist = artist.into();
        self
    }

    pub fn default_collection_title(mut self, title: impl Into<String>) -> Self {
        self.upload.default_collection_title = title.into();
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required value is missing or invalid.
    pub fn build(self) -> Result<BridgeConfig> {
        let database_path = self
            .database_path
            .ok_or_else(|| Error::Config("Database path is required".to_string()))?;

        let scratch_dir = self
            .scratch_dir
            .ok_or_else(|| Error::Config("Scratch directory is required".to_string()))?;

        let oauth = self.oauth.ok_or_else(|| {
            Error::Config(
                "OAuth client credentials are required. Call client_credentials() or oauth()."
                    .to_string(),
            )
        })?;

        let config = BridgeConfig {
            database_path,
            scratch_dir,
            oauth,
            music_api: self.music_api.unwrap_or_default(),
            upload: self.upload,
        };

        config.validate()?;
        Ok(config)
    }
}
