//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges (HTTP client, chat status
//! sink) into the core crates and exposes the operations a chat front end
//! calls. Server hosts typically enable the `desktop-shims` feature, which
//! supplies the `reqwest` HTTP client from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, ErrorKind, Result};

pub use core_auth::{AuthStart, DeviceAuthState, PendingAuthorization};
pub use core_library::{AccountId, Collection, UploadRecord};
pub use core_upload::{FileSource, IncomingFile, UploadReport, UploadSession};

use std::sync::Arc;

use bridge_traits::{HttpClient, MessageRef, MusicLibraryApi, StatusSink};
use core_auth::{AuthManager, DeviceAuthFlow};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{
    AccountRepository, SqliteAccountRepository, SqliteCollectionRepository,
    SqliteUploadRepository, UploadRepository,
};
use core_runtime::config::BridgeConfig;
use core_sync::PlaylistSynchronizer;
use core_upload::{PipelineDependencies, UploadPipeline};
use provider_yandex_music::YandexMusicConnector;
use sqlx::SqlitePool;
use tracing::{info, instrument};

/// Aggregated handle to the bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub status_sink: Arc<dyn StatusSink>,
    /// Remote library; built from `http_client` when absent
    pub music_api: Option<Arc<dyn MusicLibraryApi>>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(http_client: Arc<dyn HttpClient>, status_sink: Arc<dyn StatusSink>) -> Self {
        Self {
            http_client,
            status_sink,
            music_api: None,
        }
    }

    pub fn with_music_api(mut self, music_api: Arc<dyn MusicLibraryApi>) -> Self {
        self.music_api = Some(music_api);
        self
    }

    /// Dependencies backed by the `reqwest` HTTP client.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(status_sink: Arc<dyn StatusSink>) -> Result<Self> {
        let http_client = bridge_desktop::ReqwestHttpClient::new()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
        Ok(Self::new(Arc::new(http_client), status_sink))
    }
}

/// Upload counter and recent history of an account.
#[derive(Debug, Clone)]
pub struct AccountStats {
    pub authorized: bool,
    pub upload_count: i64,
    pub recent: Vec<UploadRecord>,
}

/// Primary façade exposed to the chat front end.
#[derive(Clone)]
pub struct BridgeService {
    accounts: Arc<dyn AccountRepository>,
    uploads: Arc<dyn UploadRepository>,
    auth: Arc<AuthManager>,
    synchronizer: Arc<PlaylistSynchronizer>,
    pipeline: UploadPipeline,
}

impl BridgeService {
    /// Open the database, prepare scratch storage and wire every component.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the database cannot be opened
    /// or migrated, or the scratch directory cannot be created.
    pub async fn bootstrap(config: BridgeConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.scratch_dir)
            .await
            .map_err(|e| {
                CoreError::InitializationFailed(format!(
                    "Cannot create scratch directory {}: {}",
                    config.scratch_dir.display(),
                    e
                ))
            })?;

        let pool = create_pool(DatabaseConfig::new(config.database_path.clone())).await?;
        let service = Self::with_pool(&config, deps, pool);

        info!("Bridge service ready");
        Ok(service)
    }

    /// Wire the components on top of an existing pool.
    pub fn with_pool(config: &BridgeConfig, deps: CoreDependencies, pool: SqlitePool) -> Self {
        let accounts = Arc::new(SqliteAccountRepository::new(pool.clone()));
        let collections = Arc::new(SqliteCollectionRepository::new(pool.clone()));
        let uploads = Arc::new(SqliteUploadRepository::new(pool));

        let music_api: Arc<dyn MusicLibraryApi> = match deps.music_api {
            Some(api) => api,
            None => Arc::new(YandexMusicConnector::new(
                Arc::clone(&deps.http_client),
                config.music_api.clone(),
            )),
        };

        let flow = Arc::new(DeviceAuthFlow::new(
            config.oauth.clone(),
            Arc::clone(&deps.http_client),
        ));
        let auth = Arc::new(AuthManager::new(
            flow,
            accounts.clone(),
            Arc::clone(&deps.status_sink),
        ));

        let synchronizer = Arc::new(PlaylistSynchronizer::new(
            Arc::clone(&music_api),
            accounts.clone(),
            collections.clone(),
            config.upload.default_collection_title.clone(),
        ));

        let pipeline = UploadPipeline::new(
            PipelineDependencies {
                api: music_api,
                http_client: deps.http_client,
                status: deps.status_sink,
                accounts: accounts.clone(),
                collections,
                uploads: uploads.clone(),
            },
            config.scratch_dir.clone(),
            &config.upload,
        );

        Self {
            accounts,
            uploads,
            auth,
            synchronizer,
            pipeline,
        }
    }

    /// Record the account on first contact.
    ///
    /// Returns `true` if the account was new.
    #[instrument(skip(self), fields(account = %account))]
    pub async fn register_account(&self, account: AccountId) -> Result<bool> {
        let created = self.accounts.ensure(account).await?;
        if created {
            info!("Account registered");
        }
        Ok(created)
    }

    /// Begin device authorization; `status` is the message that will carry
    /// the instructions and the outcome.
    pub async fn start_authorization(
        &self,
        account: AccountId,
        status: MessageRef,
    ) -> Result<AuthStart> {
        Ok(self.auth.start(account, status).await?)
    }

    /// Stop a running authorization. Returns `true` if one was running.
    pub async fn cancel_authorization(&self, account: AccountId) -> bool {
        self.auth.cancel(account).await
    }

    /// Current state of the running authorization, if any.
    pub async fn authorization_state(&self, account: AccountId) -> Option<DeviceAuthState> {
        let receiver = self.auth.subscribe(account).await?;
        let state = *receiver.borrow();
        Some(state)
    }

    /// Store a token pasted by the user.
    pub async fn submit_credential(&self, account: AccountId, raw: &str) -> Result<()> {
        Ok(self.auth.submit_credential(account, raw).await?)
    }

    /// Forget the stored credential. Returns `true` if one was stored.
    #[instrument(skip(self), fields(account = %account))]
    pub async fn sign_out(&self, account: AccountId) -> Result<bool> {
        self.auth.cancel(account).await;
        let cleared = self.accounts.clear_credential(account).await?;
        if cleared {
            info!("Credential cleared");
        }
        Ok(cleared)
    }

    pub async fn refresh_collections(&self, account: AccountId) -> Result<Vec<Collection>> {
        Ok(self.synchronizer.refresh(account).await?)
    }

    pub async fn bootstrap_collection(&self, account: AccountId) -> Result<Collection> {
        Ok(self.synchronizer.bootstrap(account).await?)
    }

    pub async fn select_collection(&self, account: AccountId, collection_id: i64) -> Result<Collection> {
        Ok(self.synchronizer.select(account, collection_id).await?)
    }

    pub async fn list_collections(&self, account: AccountId) -> Result<Vec<Collection>> {
        Ok(self.synchronizer.list(account).await?)
    }

    pub async fn active_collection(&self, account: AccountId) -> Result<Option<Collection>> {
        Ok(self.synchronizer.active(account).await?)
    }

    /// Start an upload session; fails with a state error naming whatever is
    /// missing.
    pub async fn open_upload_session(&self, account: AccountId) -> Result<UploadSession> {
        Ok(self.pipeline.open_session(account).await?)
    }

    /// Upload counter plus the `recent` latest history records.
    pub async fn account_stats(&self, account: AccountId, recent: u32) -> Result<AccountStats> {
        let authorized = self
            .accounts
            .find(account)
            .await?
            .map(|a| a.authorized)
            .unwrap_or(false);

        Ok(AccountStats {
            authorized,
            upload_count: self.uploads.upload_count(account).await?,
            recent: self.uploads.recent(account, recent).await?,
        })
    }
}
