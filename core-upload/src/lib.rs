//! # Upload Pipeline Module
//!
//! Takes one incoming audio file at a time through the remote upload
//! handshake and records the result.
//!
//! ## Overview
//!
//! A session is opened per account once it has a credential and an active
//! collection. Each file then runs through these stages:
//!
//! 1. Materialize the file into scratch storage under a random name
//! 2. Extract artist, title and cover (never fails)
//! 3. Request an upload slot for the active collection
//! 4. Transfer the bytes to the slot
//! 5. Patch the display title (best effort)
//! 6. Patch the cover (best effort)
//! 7. Bump the upload counter and append a history record in one transaction
//! 8. Remove the scratch files, whatever happened above
//!
//! ## Components
//!
//! - **Pipeline** (`pipeline`): session entry and the per-file stages
//! - **Jobs** (`job`): incoming file description and the upload report
//! - **Scratch files** (`scratch`): drop guard over the per-file scratch paths

pub mod error;
pub mod job;
pub mod pipeline;
pub mod scratch;

pub use error::{Prerequisite, Result, UploadError};
pub use job::{display_title, FileSource, IncomingFile, UploadReport};
pub use pipeline::{PipelineDependencies, UploadPipeline, UploadSession};
pub use scratch::ScratchFiles;
