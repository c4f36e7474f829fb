//! Upload pipeline
//!
//! [`UploadPipeline`] holds the collaborators shared by every upload.
//! [`UploadPipeline::open_session`] checks the account's prerequisites and
//! returns an [`UploadSession`] that processes files one at a time.
//!
//! ## Failure handling
//!
//! Slot request and transfer failures end the file with an error; nothing is
//! retried. Title and cover patches only log their failures. Scratch files are
//! removed on every path out of [`UploadSession::process`].

use bridge_traits::http::HttpClient;
use bridge_traits::messenger::{edit_quietly, post_quietly, MessageRef, StatusSink};
use bridge_traits::{CoverImage, Credential, MusicLibraryApi};
use bytes::Bytes;
use core_library::{
    AccountId, AccountRepository, Collection, CollectionRepository, NewUpload, UploadRepository,
};
use core_metadata::{ExtractedCover, MetadataExtractor};
use core_runtime::config::{SessionPolicy, UploadConfig};
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Prerequisite, Result, UploadError};
use crate::job::{display_title, FileSource, IncomingFile, UploadReport};
use crate::scratch::ScratchFiles;

const TEXT_RECEIVING: &str = "Receiving file...";
const TEXT_UPLOADING: &str = "Uploading to the music service...";

/// Collaborators the pipeline talks to.
#[derive(Clone)]
pub struct PipelineDependencies {
    pub api: Arc<dyn MusicLibraryApi>,
    pub http_client: Arc<dyn HttpClient>,
    pub status: Arc<dyn StatusSink>,
    pub accounts: Arc<dyn AccountRepository>,
    pub collections: Arc<dyn CollectionRepository>,
    pub uploads: Arc<dyn UploadRepository>,
}

/// Credential and target collection an upload runs with.
#[derive(Debug, Clone)]
struct SessionSnapshot {
    credential: Credential,
    collection: Collection,
}

/// Shared upload machinery.
#[derive(Clone)]
pub struct UploadPipeline {
    deps: PipelineDependencies,
    extractor: Arc<MetadataExtractor>,
    scratch_dir: PathBuf,
    policy: SessionPolicy,
}

impl UploadPipeline {
    pub fn new(deps: PipelineDependencies, scratch_dir: impl Into<PathBuf>, config: &UploadConfig) -> Self {
        Self {
            deps,
            extractor: Arc::new(
                MetadataExtractor::new().with_default_artist(config.default_artist.clone()),
            ),
            scratch_dir: scratch_dir.into(),
            policy: config.session_policy,
        }
    }

    /// Start an upload session for `account`.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::State` naming the missing prerequisite if the
    /// account has no credential or no active collection.
    #[instrument(skip(self), fields(account = %account))]
    pub async fn open_session(&self, account: AccountId) -> Result<UploadSession> {
        let snapshot = self.resolve(account).await?;
        info!(
            collection = %snapshot.collection.kind,
            policy = ?self.policy,
            "Upload session opened"
        );
        Ok(UploadSession {
            pipeline: self.clone(),
            account,
            snapshot,
        })
    }

    async fn resolve(&self, account: AccountId) -> Result<SessionSnapshot> {
        let credential = self
            .deps
            .accounts
            .get_credential(account)
            .await?
            .ok_or(UploadError::State {
                missing: Prerequisite::Credential,
            })?;
        let collection = self
            .deps
            .collections
            .find_active(account)
            .await?
            .ok_or(UploadError::State {
                missing: Prerequisite::ActiveCollection,
            })?;
        Ok(SessionSnapshot {
            credential,
            collection,
        })
    }

    /// Write the incoming bytes to `path`.
    async fn materialize(&self, source: &FileSource, path: &Path) -> Result<u64> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let written = match source {
            FileSource::Bytes(data) => {
                tokio::fs::write(path, &data[..]).await?;
                data.len() as u64
            }
            FileSource::Url(url) => {
                let mut reader = self.deps.http_client.download_stream(url.clone()).await?;
                let mut file = tokio::fs::File::create(path).await?;
                let written = tokio::io::copy(&mut reader, &mut file).await?;
                file.flush().await?;
                written
            }
        };

        debug!(
            file = %strip_path(&path.to_string_lossy()),
            bytes = written,
            "File materialized"
        );
        Ok(written)
    }

    async fn notify(&self, status: Option<&MessageRef>, text: &str) {
        if let Some(message) = status {
            edit_quietly(self.deps.status.as_ref(), message, text).await;
        }
    }
}

/// Upload session bound to one account.
pub struct UploadSession {
    pipeline: UploadPipeline,
    account: AccountId,
    snapshot: SessionSnapshot,
}

impl UploadSession {
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Collection captured when the session was opened.
    pub fn collection(&self) -> &Collection {
        &self.snapshot.collection
    }

    /// Upload one file.
    ///
    /// When `status` is given the message is rewritten as the file moves
    /// through the stages and finally with the outcome.
    ///
    /// # Errors
    ///
    /// - `UploadError::Network` / `UploadError::Protocol` if the slot request
    ///   or transfer fails
    /// - `UploadError::Auth` if the credential was rejected
    /// - `UploadError::State` if prerequisites vanished under
    ///   [`SessionPolicy::RefetchPerFile`]
    #[instrument(skip(self, file, status), fields(account = %self.account, file = %file.original_name))]
    pub async fn process(
        &self,
        file: IncomingFile,
        status: Option<MessageRef>,
    ) -> Result<UploadReport> {
        let result = self.run(&file, status.as_ref()).await;

        match &result {
            Ok(report) => {
                info!(track_id = %report.track_id, "Upload complete");
                let text = format!("Uploaded: {}", report.display_title);
                self.pipeline.notify(status.as_ref(), &text).await;
            }
            Err(e) => {
                error!(error = %e, "Upload failed");
                self.pipeline
                    .notify(status.as_ref(), &e.user_message())
                    .await;
            }
        }

        result
    }

    /// Upload one file, reporting progress in a new message in the
    /// account's chat.
    ///
    /// The upload still runs if the status message cannot be posted.
    pub async fn process_with_status(&self, file: IncomingFile) -> Result<UploadReport> {
        let status = post_quietly(
            self.pipeline.deps.status.as_ref(),
            self.account.0,
            TEXT_RECEIVING,
        )
        .await;
        self.process(file, status).await
    }

    async fn run(&self, file: &IncomingFile, status: Option<&MessageRef>) -> Result<UploadReport> {
        let refreshed;
        let snapshot = match self.pipeline.policy {
            SessionPolicy::SnapshotOnce => &self.snapshot,
            SessionPolicy::RefetchPerFile => {
                refreshed = self.pipeline.resolve(self.account).await?;
                &refreshed
            }
        };
        let deps = &self.pipeline.deps;
        let credential = &snapshot.credential;
        let collection_kind = snapshot.collection.kind.as_str();

        let scratch = ScratchFiles::new(&self.pipeline.scratch_dir);

        self.pipeline.notify(status, TEXT_RECEIVING).await;
        self.pipeline.materialize(&file.source, scratch.audio()).await?;

        let metadata = self
            .pipeline
            .extractor
            .extract(scratch.audio(), &file.original_name)
            .await;
        debug!(
            artist = %metadata.artist,
            title = %metadata.title,
            cover = metadata.cover.is_some(),
            "Metadata extracted"
        );

        self.pipeline.notify(status, TEXT_UPLOADING).await;
        let file_name = file.slot_file_name();
        let slot = deps
            .api
            .request_upload_slot(credential, collection_kind, file_name)
            .await?;
        debug!(track_id = %slot.track_id, "Upload slot issued");

        let data = tokio::fs::read(scratch.audio()).await?;
        deps.api
            .transfer(credential, &slot, file_name, Bytes::from(data))
            .await?;
        info!(track_id = %slot.track_id, collection = %collection_kind, "Transfer accepted");

        let title = display_title(
            &metadata.artist,
            &metadata.title,
            self.pipeline.extractor.default_artist(),
        );
        let title_patched = match deps.api.patch_title(credential, &slot.track_id, &title).await {
            Ok(()) => true,
            Err(e) => {
                warn!(track_id = %slot.track_id, error = %e, "Title patch failed");
                false
            }
        };

        let cover_patched = match &metadata.cover {
            Some(cover) => self.patch_cover(credential, &slot.track_id, cover).await,
            None => false,
        };

        let record = deps
            .uploads
            .record_success(
                self.account,
                &NewUpload {
                    collection_kind: collection_kind.to_string(),
                    remote_track_id: slot.track_id.clone(),
                    artist: metadata.artist.clone(),
                    title: metadata.title.clone(),
                    content_hash: metadata.content_hash.clone(),
                },
            )
            .await?;

        drop(scratch);

        Ok(UploadReport {
            track_id: slot.track_id,
            collection_kind: collection_kind.to_string(),
            display_title: title,
            title_patched,
            cover_patched,
            record,
        })
    }

    async fn patch_cover(&self, credential: &Credential, track_id: &str, cover: &ExtractedCover) -> bool {
        let data = match tokio::fs::read(&cover.path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(track_id, error = %e, "Cover file unreadable, skipping cover patch");
                return false;
            }
        };

        let image = CoverImage {
            data: Bytes::from(data),
            mime_type: cover.mime_type.clone(),
        };
        match self
            .pipeline
            .deps
            .api
            .patch_cover(credential, track_id, image)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(track_id, error = %e, "Cover patch failed");
                false
            }
        }
    }
}
