//! Integration tests for collection reconciliation and selection
//!
//! Runs the synchronizer against an in-memory database and a mocked remote
//! library.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{CoverImage, Credential, MusicLibraryApi, RemoteCollection, UploadSlot};
use bytes::Bytes;
use core_library::db::create_test_pool;
use core_library::{
    AccountId, AccountRepository, CollectionRepository, SqliteAccountRepository,
    SqliteCollectionRepository,
};
use core_sync::{PlaylistSynchronizer, SyncError};
use mockall::mock;
use std::sync::Arc;

mock! {
    Library {}

    #[async_trait]
    impl MusicLibraryApi for Library {
        async fn list_collections(&self, credential: &Credential) -> BridgeResult<Vec<RemoteCollection>>;
        async fn create_collection(&self, credential: &Credential, title: &str) -> BridgeResult<RemoteCollection>;
        async fn request_upload_slot(
            &self,
            credential: &Credential,
            collection_kind: &str,
            file_name: &str,
        ) -> BridgeResult<UploadSlot>;
        async fn transfer(
            &self,
            credential: &Credential,
            slot: &UploadSlot,
            file_name: &str,
            data: Bytes,
        ) -> BridgeResult<()>;
        async fn patch_title(&self, credential: &Credential, track_id: &str, title: &str) -> BridgeResult<()>;
        async fn patch_cover(&self, credential: &Credential, track_id: &str, cover: CoverImage) -> BridgeResult<()>;
    }
}

const ACCOUNT: AccountId = AccountId(501);

fn remote(kind: &str, title: &str) -> RemoteCollection {
    RemoteCollection {
        kind: kind.to_string(),
        title: title.to_string(),
    }
}

struct Harness {
    synchronizer: PlaylistSynchronizer,
    collections: Arc<SqliteCollectionRepository>,
}

async fn harness(api: MockLibrary, authorized: bool) -> Harness {
    let pool = create_test_pool().await.unwrap();
    let accounts = Arc::new(SqliteAccountRepository::new(pool.clone()));
    let collections = Arc::new(SqliteCollectionRepository::new(pool));

    if authorized {
        accounts
            .set_credential(ACCOUNT, &Credential::new("y0_test"))
            .await
            .unwrap();
    }

    Harness {
        synchronizer: PlaylistSynchronizer::new(
            Arc::new(api),
            accounts,
            collections.clone(),
            "Uploads",
        ),
        collections,
    }
}

#[tokio::test]
async fn test_sync_is_append_only() {
    let h = harness(MockLibrary::new(), true).await;

    h.synchronizer
        .sync(ACCOUNT, &[remote("3", "Liked"), remote("1003", "Road")])
        .await
        .unwrap();
    let after = h
        .synchronizer
        .sync(ACCOUNT, &[remote("1003", "Road trip"), remote("1004", "Gym")])
        .await
        .unwrap();

    let kinds: Vec<_> = after.iter().map(|c| c.kind.as_str()).collect();
    assert_eq!(kinds, vec!["3", "1003", "1004"]);
    assert_eq!(after[1].title, "Road trip");
    assert!(after[0].is_active);
    assert_eq!(after.iter().filter(|c| c.is_active).count(), 1);
}

#[tokio::test]
async fn test_sync_alone_leaves_exactly_one_active() {
    let h = harness(MockLibrary::new(), true).await;

    let synced = h
        .synchronizer
        .sync(ACCOUNT, &[remote("3", "A"), remote("7", "B")])
        .await
        .unwrap();
    assert_eq!(synced.len(), 2);

    let stored = h.collections.list(ACCOUNT).await.unwrap();
    assert_eq!(stored.iter().filter(|c| c.is_active).count(), 1);
    assert_eq!(
        h.synchronizer.active(ACCOUNT).await.unwrap().unwrap().kind,
        "3"
    );

    h.synchronizer.select(ACCOUNT, synced[1].id).await.unwrap();
    h.synchronizer
        .sync(ACCOUNT, &[remote("9", "C")])
        .await
        .unwrap();
    let active = h.synchronizer.active(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(active.kind, "7");
    let stored = h.collections.list(ACCOUNT).await.unwrap();
    assert_eq!(stored.iter().filter(|c| c.is_active).count(), 1);
}

#[tokio::test]
async fn test_sync_with_nothing_selects_nothing() {
    let h = harness(MockLibrary::new(), true).await;

    let synced = h.synchronizer.sync(ACCOUNT, &[]).await.unwrap();

    assert!(synced.is_empty());
    assert!(h.synchronizer.active(ACCOUNT).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_activates_first_collection_once() {
    let mut api = MockLibrary::new();
    api.expect_list_collections()
        .times(2)
        .returning(|_| Ok(vec![remote("7", "First"), remote("8", "Second")]));
    let h = harness(api, true).await;

    let listed = h.synchronizer.refresh(ACCOUNT).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].is_active);

    h.synchronizer.select(ACCOUNT, listed[1].id).await.unwrap();
    let again = h.synchronizer.refresh(ACCOUNT).await.unwrap();
    assert!(!again[0].is_active);
    assert!(again[1].is_active);
}

#[tokio::test]
async fn test_refresh_requires_credential() {
    let h = harness(MockLibrary::new(), false).await;

    let result = h.synchronizer.refresh(ACCOUNT).await;

    assert!(matches!(result, Err(SyncError::MissingCredential(a)) if a == ACCOUNT));
}

#[tokio::test]
async fn test_bootstrap_creates_default_collection_once() {
    let mut api = MockLibrary::new();
    let mut listed = false;
    api.expect_list_collections().times(2).returning(move |_| {
        let result = if listed {
            vec![remote("1001", "Uploads")]
        } else {
            Vec::new()
        };
        listed = true;
        Ok(result)
    });
    api.expect_create_collection()
        .withf(|_, title| title == "Uploads")
        .times(1)
        .returning(|_, title| Ok(remote("1001", title)));
    let h = harness(api, true).await;

    let first = h.synchronizer.bootstrap(ACCOUNT).await.unwrap();
    let second = h.synchronizer.bootstrap(ACCOUNT).await.unwrap();

    assert_eq!(first.kind, "1001");
    assert!(first.is_active);
    assert_eq!(second.id, first.id);
    assert_eq!(h.collections.list(ACCOUNT).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bootstrap_keeps_existing_selection() {
    let mut api = MockLibrary::new();
    api.expect_list_collections()
        .returning(|_| Ok(vec![remote("1", "A"), remote("2", "B")]));
    api.expect_create_collection().never();
    let h = harness(api, true).await;

    let synced = h
        .synchronizer
        .sync(ACCOUNT, &[remote("1", "A"), remote("2", "B")])
        .await
        .unwrap();
    h.synchronizer.select(ACCOUNT, synced[1].id).await.unwrap();

    let active = h.synchronizer.bootstrap(ACCOUNT).await.unwrap();
    assert_eq!(active.kind, "2");
}

#[tokio::test]
async fn test_bootstrap_surfaces_remote_failure() {
    let mut api = MockLibrary::new();
    api.expect_list_collections()
        .returning(|_| Err(BridgeError::Unauthorized("token revoked".to_string())));
    let h = harness(api, true).await;

    let result = h.synchronizer.bootstrap(ACCOUNT).await;

    assert!(matches!(
        result,
        Err(SyncError::Remote(BridgeError::Unauthorized(_)))
    ));
    assert!(h.collections.list(ACCOUNT).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_select_rejects_foreign_collection() {
    let h = harness(MockLibrary::new(), true).await;
    let other = AccountId(502);

    let mine = h
        .synchronizer
        .sync(ACCOUNT, &[remote("1", "Mine")])
        .await
        .unwrap();
    h.synchronizer.select(ACCOUNT, mine[0].id).await.unwrap();
    let theirs = h
        .synchronizer
        .sync(other, &[remote("1", "Theirs")])
        .await
        .unwrap();

    let result = h.synchronizer.select(ACCOUNT, theirs[0].id).await;
    assert!(matches!(
        result,
        Err(SyncError::UnknownCollection { collection_id, .. }) if collection_id == theirs[0].id
    ));

    let active = h.synchronizer.active(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(active.id, mine[0].id);
    let theirs_active = h.synchronizer.active(other).await.unwrap().unwrap();
    assert_eq!(theirs_active.id, theirs[0].id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_selects_leave_one_active() {
    let h = Arc::new(harness(MockLibrary::new(), true).await);
    let synced = h
        .synchronizer
        .sync(
            ACCOUNT,
            &[remote("1", "A"), remote("2", "B"), remote("3", "C"), remote("4", "D")],
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        for collection in &synced {
            let h = Arc::clone(&h);
            let id = collection.id;
            handles.push(tokio::spawn(async move {
                h.synchronizer.select(ACCOUNT, id).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let active: Vec<_> = h
        .synchronizer
        .list(ACCOUNT)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.is_active)
        .collect();
    assert_eq!(active.len(), 1);
}
