//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the persistence surface the core consumes
//! - SQLite implementations use sqlx for async database access
//! - Multi-statement mutations run inside one transaction
//!
//! ## Available Repositories
//!
//! - `AccountRepository` - Accounts and their stored credential
//! - `CollectionRepository` - Collections and the active selection
//! - `UploadRepository` - Upload counter and history

pub mod account;
pub mod collection;
pub mod upload;

pub use account::{AccountRepository, SqliteAccountRepository};
pub use collection::{CollectionRepository, SqliteCollectionRepository};
pub use upload::{SqliteUploadRepository, UploadRepository};

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
