//! # Library Persistence Module
//!
//! Owns the bridge database and provides repositories for the state the
//! core reads and mutates.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pool, schema and migrations
//! - Accounts and their stored credential
//! - Collections with the single-active invariant
//! - Upload counter and upload history

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{Account, AccountId, Collection, NewUpload, UploadRecord};
pub use repositories::{
    AccountRepository, CollectionRepository, SqliteAccountRepository,
    SqliteCollectionRepository, SqliteUploadRepository, UploadRepository,
};
