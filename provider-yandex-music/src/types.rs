//! Yandex Music API response types
//!
//! Data structures for deserializing API responses, plus the ordered key
//! schemes used to read upload slots.

use bridge_traits::{RemoteCollection, UploadSlot};
use serde::Deserialize;
use serde_json::Value;

/// Body markers the upload host uses to acknowledge a transfer.
pub const TRANSFER_SUCCESS_MARKERS: &[&str] = &["OK", "CREATED"];

/// Identifiers arrive as numbers from some endpoints and strings from others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(u64),
    Text(String),
}

impl Identifier {
    pub fn into_string(self) -> String {
        match self {
            Identifier::Number(n) => n.to_string(),
            Identifier::Text(s) => s,
        }
    }
}

/// Standard `{"result": ...}` envelope of the mobile API
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub result: T,
}

/// `account/status` result
#[derive(Debug, Deserialize)]
pub struct AccountStatus {
    pub account: AccountInfo,
}

#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub uid: Option<Identifier>,
}

/// Playlist as returned by `users/{uid}/playlists/list` and `.../create`
#[derive(Debug, Deserialize)]
pub struct Playlist {
    pub kind: Identifier,
    #[serde(default)]
    pub title: String,
}

impl From<Playlist> for RemoteCollection {
    fn from(playlist: Playlist) -> Self {
        RemoteCollection {
            kind: playlist.kind.into_string(),
            title: playlist.title,
        }
    }
}

/// Key names under which an upload slot may be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotKeyScheme {
    pub upload_url: &'static str,
    pub track_id: &'static str,
}

/// Tried in order; the first scheme with both keys present wins.
pub const SLOT_KEY_SCHEMES: &[SlotKeyScheme] = &[
    SlotKeyScheme {
        upload_url: "post_target",
        track_id: "track_id",
    },
    SlotKeyScheme {
        upload_url: "post-target",
        track_id: "track-id",
    },
];

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an upload slot from a handshake response.
///
/// The payload may be wrapped in a `result` object.
pub fn extract_slot(response: &Value) -> Option<UploadSlot> {
    let payload = match response.get("result") {
        Some(inner) if inner.is_object() => inner,
        _ => response,
    };

    SLOT_KEY_SCHEMES.iter().find_map(|scheme| {
        let upload_url = payload.get(scheme.upload_url).and_then(scalar_to_string)?;
        let track_id = payload.get(scheme.track_id).and_then(scalar_to_string)?;
        Some(UploadSlot {
            upload_url: upload_url.replacen(":443", "", 1),
            track_id,
        })
    })
}

/// Pull the acknowledgement out of a transfer response body.
///
/// Accepts a bare marker, a JSON string, or `{"result": "<marker>"}`.
pub fn transfer_marker(body: &str) -> String {
    let trimmed = body.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => map
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| trimmed.to_string()),
        _ => trimmed.to_string(),
    }
}

pub fn is_transfer_success(marker: &str) -> bool {
    TRANSFER_SUCCESS_MARKERS.contains(&marker)
}
