use bridge_traits::error::BridgeError;
use core_library::{AccountId, LibraryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Account {0} has no stored credential")]
    MissingCredential(AccountId),

    #[error("Collection {collection_id} does not belong to account {account}")]
    UnknownCollection { account: AccountId, collection_id: i64 },

    #[error("Account {0} has no collections")]
    NoCollections(AccountId),

    #[error("Remote library error: {0}")]
    Remote(#[from] BridgeError),

    #[error("Storage error: {0}")]
    Library(#[from] LibraryError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
