//! Upload job types

use bytes::Bytes;
use core_library::UploadRecord;

/// Where the bytes of an incoming file come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Already in memory
    Bytes(Bytes),
    /// Downloaded through the HTTP client
    Url(String),
}

/// A file submitted by the user.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub source: FileSource,
    /// Name the file was sent under
    pub original_name: String,
    /// Name to announce to the upload slot instead of `original_name`
    pub sanitized_name: Option<String>,
}

impl IncomingFile {
    pub fn from_bytes(original_name: impl Into<String>, data: Bytes) -> Self {
        Self {
            source: FileSource::Bytes(data),
            original_name: original_name.into(),
            sanitized_name: None,
        }
    }

    pub fn from_url(original_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: FileSource::Url(url.into()),
            original_name: original_name.into(),
            sanitized_name: None,
        }
    }

    pub fn with_sanitized_name(mut self, name: impl Into<String>) -> Self {
        self.sanitized_name = Some(name.into());
        self
    }

    /// File name sent with the slot request and the transfer.
    pub fn slot_file_name(&self) -> &str {
        self.sanitized_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.original_name)
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub track_id: String,
    pub collection_kind: String,
    /// Title as displayed by the remote service
    pub display_title: String,
    pub title_patched: bool,
    pub cover_patched: bool,
    pub record: UploadRecord,
}

/// `"{artist} - {title}"`, or just the title when the artist is missing or
/// equals `default_artist`.
pub fn display_title(artist: &str, title: &str, default_artist: &str) -> String {
    let artist = artist.trim();
    if artist.is_empty() || artist == default_artist {
        title.to_string()
    } else {
        format!("{} - {}", artist, title)
    }
}
