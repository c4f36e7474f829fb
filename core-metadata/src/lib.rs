//! # Metadata Module
//!
//! Extracts display metadata from submitted audio files.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag extraction (ID3, Vorbis, MP4, FLAC)
//! - Embedded cover extraction to a scratch file
//! - Fallback titles from submitted file names
//! - Content hashing for the upload history

pub mod error;
pub mod extractor;

pub use error::{MetadataError, Result};
pub use extractor::{
    clean_file_title, cover_path_for, ExtractedCover, MetadataExtractor, TrackMetadata,
    DEFAULT_ARTIST,
};
