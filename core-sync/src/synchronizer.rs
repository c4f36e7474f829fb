//! Playlist synchronizer
//!
//! Keeps the local collection set in step with the remote account and owns
//! the active-collection selection.

use bridge_traits::{Credential, MusicLibraryApi, RemoteCollection};
use core_library::{
    AccountId, AccountRepository, Collection, CollectionRepository, LibraryError,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{Result, SyncError};

/// Reconciles remote collections and manages the active selection.
pub struct PlaylistSynchronizer {
    api: Arc<dyn MusicLibraryApi>,
    accounts: Arc<dyn AccountRepository>,
    collections: Arc<dyn CollectionRepository>,
    /// Title of the collection created for accounts that have none
    default_title: String,
}

impl PlaylistSynchronizer {
    pub fn new(
        api: Arc<dyn MusicLibraryApi>,
        accounts: Arc<dyn AccountRepository>,
        collections: Arc<dyn CollectionRepository>,
        default_title: impl Into<String>,
    ) -> Self {
        Self {
            api,
            accounts,
            collections,
            default_title: default_title.into(),
        }
    }

    async fn credential(&self, account: AccountId) -> Result<Credential> {
        self.accounts
            .get_credential(account)
            .await?
            .ok_or(SyncError::MissingCredential(account))
    }

    /// Upsert `remote` into the local collection set.
    ///
    /// Titles are refreshed by `kind` and local rows absent from `remote` are
    /// left untouched. An existing selection is kept; otherwise the oldest
    /// collection becomes active.
    #[instrument(skip(self, remote), fields(account = %account, remote = remote.len()))]
    pub async fn sync(
        &self,
        account: AccountId,
        remote: &[RemoteCollection],
    ) -> Result<Vec<Collection>> {
        self.collections.upsert_by_kind(account, remote).await?;
        if let Some(active) = self.collections.ensure_active(account).await? {
            debug!(collection_id = active.id, kind = %active.kind, "Active collection");
        }

        let collections = self.collections.list(account).await?;
        debug!(local = collections.len(), "Collections reconciled");
        Ok(collections)
    }

    /// List the remote collections and reconcile them.
    ///
    /// # Errors
    ///
    /// - `SyncError::MissingCredential` if the account is not authorized
    /// - `SyncError::Remote` if the listing fails
    #[instrument(skip(self), fields(account = %account))]
    pub async fn refresh(&self, account: AccountId) -> Result<Vec<Collection>> {
        let credential = self.credential(account).await?;
        let remote = self.api.list_collections(&credential).await?;

        self.sync(account, &remote).await
    }

    /// Make sure the account has at least one collection and an active one.
    ///
    /// An account with no remote collections gets one titled with the
    /// default title, which becomes active. Otherwise the remote list is
    /// reconciled and the current selection kept, so calling this again
    /// never creates a second collection.
    ///
    /// # Returns
    ///
    /// The active collection
    #[instrument(skip(self), fields(account = %account))]
    pub async fn bootstrap(&self, account: AccountId) -> Result<Collection> {
        let credential = self.credential(account).await?;
        let remote = self.api.list_collections(&credential).await?;

        if remote.is_empty() {
            let created = self
                .api
                .create_collection(&credential, &self.default_title)
                .await?;
            let local = self.collections.insert(account, &created).await?;
            let active = self.collections.activate_exclusive(account, local.id).await?;

            info!(
                collection_id = active.id,
                kind = %active.kind,
                "Created default collection"
            );
            return Ok(active);
        }

        self.sync(account, &remote).await?;
        self.collections
            .find_active(account)
            .await?
            .ok_or(SyncError::NoCollections(account))
    }

    /// Make `collection_id` the only active collection of the account.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::UnknownCollection` if the id does not belong to the
    /// account; the current selection is unchanged in that case.
    #[instrument(skip(self), fields(account = %account))]
    pub async fn select(&self, account: AccountId, collection_id: i64) -> Result<Collection> {
        match self
            .collections
            .activate_exclusive(account, collection_id)
            .await
        {
            Ok(collection) => {
                info!(collection_id, kind = %collection.kind, "Collection selected");
                Ok(collection)
            }
            Err(LibraryError::NotFound { .. }) => Err(SyncError::UnknownCollection {
                account,
                collection_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Local collections in creation order.
    pub async fn list(&self, account: AccountId) -> Result<Vec<Collection>> {
        Ok(self.collections.list(account).await?)
    }

    pub async fn active(&self, account: AccountId) -> Result<Option<Collection>> {
        Ok(self.collections.find_active(account).await?)
    }
}
