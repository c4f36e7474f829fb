//! # Collection Sync Module
//!
//! Reconciles the account's remote collections (playlists) with the local
//! copy and maintains the single active collection uploads go to.
//!
//! ## Overview
//!
//! - `sync` upserts remote collections by their stable `kind`; local rows the
//!   remote list no longer mentions are kept
//! - `bootstrap` creates a default collection for accounts that have none and
//!   is safe to call repeatedly
//! - `select` switches the active collection in one transaction
//!
//! ## Components
//!
//! - **Playlist Synchronizer** (`synchronizer`): remote listing, reconciliation and selection

pub mod error;
pub mod synchronizer;

pub use error::{Result, SyncError};
pub use synchronizer::PlaylistSynchronizer;
