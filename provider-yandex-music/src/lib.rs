//! # Yandex Music Provider
//!
//! Implements `MusicLibraryApi` for the Yandex Music web and mobile APIs.
//!
//! ## Overview
//!
//! This module provides:
//! - Collection (playlist) listing and creation
//! - Upload slot handshake tolerant of both response key schemes
//! - Single-attempt byte transfer with literal success markers
//! - Title and cover patches for uploaded tracks

pub mod connector;
pub mod error;
pub mod types;

pub use connector::YandexMusicConnector;
pub use error::{Result, YandexMusicError};
