//! # Host Bridge Traits
//!
//! Contracts between the core and its collaborators.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP with JSON, form and multipart bodies
//! - [`StatusSink`](messenger::StatusSink) - Post and edit status messages in the chat front end
//! - [`MusicLibraryApi`](library::MusicLibraryApi) - Remote collections, upload slots, transfers and patches
//!
//! ## Error Handling
//!
//! All traits return [`BridgeError`](error::BridgeError). Implementations
//! classify failures as network, protocol or authorization errors so the
//! core can decide what is fatal and what the user is told.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so handles can be shared across tasks.

pub mod error;
pub mod http;
pub mod library;
pub mod messenger;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart};
pub use library::{Credential, CoverImage, MusicLibraryApi, RemoteCollection, UploadSlot};
pub use messenger::{edit_quietly, post_quietly, MessageRef, StatusSink};
