//! # Audio Metadata Extractor
//!
//! Reads the artist, title and a single embedded picture from an audio file
//! using the `lofty` crate (ID3v2, Vorbis Comments, MP4 tags, FLAC).
//!
//! Extraction never fails: missing or unreadable tags fall back to a
//! configurable default artist and a title derived from the caller's
//! original file name. An embedded picture is written next to the audio
//! file (see [`cover_path_for`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_metadata::extractor::MetadataExtractor;
//! use std::path::Path;
//!
//! let extractor = MetadataExtractor::new().with_default_artist("Unknown Artist");
//! let metadata = extractor
//!     .extract(Path::new("/tmp/scratch/4f1c"), "Band - Song.mp3")
//!     .await;
//! println!("{} / {}", metadata.artist, metadata.title);
//! ```

use lofty::config::ParseOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};

/// Artist used when the file carries none.
pub const DEFAULT_ARTIST: &str = "Unknown Artist";

/// Title used when neither the tags nor the file name yield one.
const FALLBACK_TITLE: &str = "track";

/// Suffix appended to the audio path for the extracted cover.
const COVER_SUFFIX: &str = ".cover";

/// Cover image written to scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCover {
    pub path: PathBuf,
    pub mime_type: String,
}

/// Result of metadata extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub cover: Option<ExtractedCover>,
    /// SHA-256 of the file contents, absent when the file could not be read
    pub content_hash: Option<String>,
    /// Whether any tag container was found
    pub tagged: bool,
}

#[derive(Debug, Default)]
struct TagFields {
    artist: Option<String>,
    title: Option<String>,
    picture: Option<(Vec<u8>, String)>,
}

/// Extracts metadata from audio files using the `lofty` crate.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    /// Parse options for lofty
    parse_options: ParseOptions,
    default_artist: String,
}

impl MetadataExtractor {
    /// Create a new metadata extractor with default settings
    pub fn new() -> Self {
        Self {
            // Audio properties are never used
            parse_options: ParseOptions::new().read_properties(false),
            default_artist: DEFAULT_ARTIST.to_string(),
        }
    }

    /// Override the fallback artist
    pub fn with_default_artist(mut self, artist: impl Into<String>) -> Self {
        self.default_artist = artist.into();
        self
    }

    pub fn default_artist(&self) -> &str {
        &self.default_artist
    }

    /// Extract artist, title and cover from the file at `path`.
    ///
    /// `original_name` is the name the file was submitted under; it is only
    /// used to derive a fallback title.
    pub async fn extract(&self, path: &Path, original_name: &str) -> TrackMetadata {
        let fallback_title = clean_file_title(original_name);

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to read audio file, using defaults");
                return self.defaults(fallback_title, None);
            }
        };

        let options = self.parse_options;
        let parsed = tokio::task::spawn_blocking(move || {
            let hash = calculate_hash(&data);
            (hash, read_tags(&data, options))
        })
        .await;

        let (hash, tags) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Metadata task failed, using defaults");
                return self.defaults(fallback_title, None);
            }
        };
        let content_hash = Some(hash);

        let fields = match tags {
            Ok(Some(fields)) => fields,
            Ok(None) => {
                debug!("No tags found, using defaults");
                return self.defaults(fallback_title, content_hash);
            }
            Err(e) => {
                debug!(error = %e, "Unreadable tags, using defaults");
                return self.defaults(fallback_title, content_hash);
            }
        };

        let cover = match fields.picture {
            Some((bytes, mime_type)) => write_cover(path, &bytes, mime_type).await,
            None => None,
        };

        TrackMetadata {
            artist: fields
                .artist
                .unwrap_or_else(|| self.default_artist.clone()),
            title: fields.title.unwrap_or(fallback_title),
            cover,
            content_hash,
            tagged: true,
        }
    }

    fn defaults(&self, title: String, content_hash: Option<String>) -> TrackMetadata {
        TrackMetadata {
            artist: self.default_artist.clone(),
            title,
            cover: None,
            content_hash,
            tagged: false,
        }
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe `data` and pull the artist, title and picture from its primary tag.
fn read_tags(data: &[u8], options: ParseOptions) -> Result<Option<TagFields>> {
    let tagged_file = Probe::new(std::io::Cursor::new(data))
        .options(options)
        .guess_file_type()
        .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e)))?
        .read()
        .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {}", e)))?;

    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(tag) => tag,
        None => return Ok(None),
    };

    Ok(Some(TagFields {
        artist: tag.artist().and_then(|s| non_empty(normalize_text(&s))),
        title: tag.title().and_then(|s| non_empty(normalize_text(&s))),
        picture: select_picture(tag),
    }))
}

/// Path of the cover file written for the audio file at `audio_path`.
pub fn cover_path_for(audio_path: &Path) -> PathBuf {
    let mut name = audio_path.as_os_str().to_owned();
    name.push(COVER_SUFFIX);
    PathBuf::from(name)
}

/// Derive a display title from a submitted file name.
///
/// Drops any directory part and the extension, then collapses whitespace.
/// The rest of the name is kept as-is.
pub fn clean_file_title(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);

    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };

    non_empty(normalize_text(stem)).unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

async fn write_cover(audio_path: &Path, bytes: &[u8], mime_type: String) -> Option<ExtractedCover> {
    let path = cover_path_for(audio_path);
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => {
            debug!(size = bytes.len(), mime_type = %mime_type, "Cover written");
            Some(ExtractedCover { path, mime_type })
        }
        Err(e) => {
            warn!(error = %e, "Failed to write cover, continuing without it");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(error = %e, "Partial cover not removed");
                }
            }
            None
        }
    }
}

/// Prefer the front cover, otherwise the first non-empty picture.
fn select_picture(tag: &Tag) -> Option<(Vec<u8>, String)> {
    let pictures = tag.pictures();
    let picture = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront && !p.data().is_empty())
        .or_else(|| pictures.iter().find(|p| !p.data().is_empty()))?;

    Some((picture.data().to_vec(), picture_mime_type(picture)))
}

fn picture_mime_type(picture: &Picture) -> String {
    picture
        .mime_type()
        .and_then(mime_type_to_string)
        .unwrap_or_else(|| sniff_image_mime(picture.data()).to_string())
}

/// Calculate SHA-256 hash of file contents
fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Normalize text metadata
///
/// - Trims leading/trailing whitespace
/// - Normalizes consecutive whitespace to single space
/// - Removes null bytes and control characters
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Convert lofty MimeType to string
fn mime_type_to_string(mime_type: &MimeType) -> Option<String> {
    match mime_type {
        MimeType::Png => Some("image/png".to_string()),
        MimeType::Jpeg => Some("image/jpeg".to_string()),
        MimeType::Tiff => Some("image/tiff".to_string()),
        MimeType::Bmp => Some("image/bmp".to_string()),
        MimeType::Gif => Some("image/gif".to_string()),
        _ => None,
    }
}

fn sniff_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}
