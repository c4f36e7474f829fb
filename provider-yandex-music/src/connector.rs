//! Yandex Music API connector implementation
//!
//! Implements the `MusicLibraryApi` trait on top of `HttpClient`.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart};
use bridge_traits::library::{CoverImage, Credential, MusicLibraryApi, RemoteCollection, UploadSlot};
use bytes::Bytes;
use core_runtime::config::MusicApiConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::YandexMusicError;
use crate::types::{
    extract_slot, is_transfer_success, transfer_marker, AccountStatus, Envelope, Playlist,
};

/// Yandex Music API connector
///
/// Implements `MusicLibraryApi` for the Yandex Music mobile API
/// (collections) and web handlers (upload slot, title and cover patches).
///
/// # Features
///
/// - Collection listing and creation under the credential's account
/// - Upload slot handshake with ordered key-scheme extraction
/// - Single-attempt multipart transfer validated against success markers
/// - Credential passed per call, no session state kept between calls
///
/// # Example
///
/// ```ignore
/// use provider_yandex_music::YandexMusicConnector;
/// use bridge_traits::MusicLibraryApi;
///
/// let connector = YandexMusicConnector::new(http_client, MusicApiConfig::default());
/// let collections = connector.list_collections(&credential).await?;
/// ```
pub struct YandexMusicConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    config: MusicApiConfig,
}

impl YandexMusicConnector {
    /// Create a new connector
    pub fn new(http_client: Arc<dyn HttpClient>, config: MusicApiConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Build authorization header value
    fn auth_header(credential: &Credential) -> String {
        format!("OAuth {}", credential.expose())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn web_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.web_base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: HttpMethod, url: impl Into<String>, credential: &Credential) -> HttpRequest {
        HttpRequest::new(method, url)
            .header("Authorization", Self::auth_header(credential))
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout)
    }

    /// Execute a request and map non-success statuses to provider errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = ?request.method, url = %request.url, "Sending request");
        let response = self.http_client.execute(request).await?;
        check_status(response).map_err(Into::into)
    }

    /// Resolve the account uid that owns the credential.
    async fn account_uid(&self, credential: &Credential) -> Result<String> {
        let request = self.request(HttpMethod::Get, self.api_url("account/status"), credential);
        let response = self.send(request).await?;

        let status: Envelope<AccountStatus> = parse_json(&response)?;
        status
            .result
            .account
            .uid
            .map(|uid| uid.into_string())
            .ok_or_else(|| {
                YandexMusicError::AuthenticationFailed("Account has no uid".to_string()).into()
            })
    }

    fn upload_handshake_url(&self, collection_kind: &str, file_name: &str) -> Result<String> {
        let base = self.web_url("handlers/ugc-upload.jsx");
        let params = [
            ("filename", file_name),
            ("kind", collection_kind),
            ("visibility", self.config.visibility.as_str()),
            ("lang", "ru"),
            ("external-domain", "music.yandex.ru"),
            ("overembed", "false"),
        ];

        Url::parse_with_params(&base, &params)
            .map(String::from)
            .map_err(|e| {
                YandexMusicError::ParseError(format!("Invalid upload handshake URL: {}", e)).into()
            })
    }
}

fn check_status(response: HttpResponse) -> std::result::Result<HttpResponse, YandexMusicError> {
    match response.status {
        200..=299 => Ok(response),
        401 | 403 => Err(YandexMusicError::AuthenticationFailed(format!(
            "Credential rejected (status {})",
            response.status
        ))),
        status => Err(YandexMusicError::ApiError {
            status_code: status,
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        }),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| YandexMusicError::ParseError(e.to_string()).into())
}

#[async_trait]
impl MusicLibraryApi for YandexMusicConnector {
    #[instrument(skip(self, credential))]
    async fn list_collections(&self, credential: &Credential) -> Result<Vec<RemoteCollection>> {
        let uid = self.account_uid(credential).await?;
        let url = self.api_url(&format!("users/{}/playlists/list", uid));

        let response = self.send(self.request(HttpMethod::Get, url, credential)).await?;
        let playlists: Envelope<Vec<Playlist>> = parse_json(&response)?;

        let collections: Vec<RemoteCollection> =
            playlists.result.into_iter().map(Into::into).collect();

        info!(count = collections.len(), "Listed remote collections");
        Ok(collections)
    }

    #[instrument(skip(self, credential))]
    async fn create_collection(
        &self,
        credential: &Credential,
        title: &str,
    ) -> Result<RemoteCollection> {
        let uid = self.account_uid(credential).await?;
        let url = self.api_url(&format!("users/{}/playlists/create", uid));

        let request = self.request(HttpMethod::Post, url, credential).form(&[
            ("title", title),
            ("visibility", self.config.visibility.as_str()),
        ])?;
        let response = self.send(request).await?;
        let playlist: Envelope<Playlist> = parse_json(&response)?;

        let collection = RemoteCollection::from(playlist.result);
        info!(kind = %collection.kind, "Created remote collection");
        Ok(collection)
    }

    #[instrument(skip(self, credential))]
    async fn request_upload_slot(
        &self,
        credential: &Credential,
        collection_kind: &str,
        file_name: &str,
    ) -> Result<UploadSlot> {
        let url = self.upload_handshake_url(collection_kind, file_name)?;
        let response = self.send(self.request(HttpMethod::Get, url, credential)).await?;
        let body: Value = parse_json(&response)?;

        let slot = extract_slot(&body).ok_or_else(|| {
            warn!("Upload slot response matched no known key scheme");
            YandexMusicError::MissingField("upload URL and track id".to_string())
        })?;

        debug!(track_id = %slot.track_id, "Upload slot issued");
        Ok(slot)
    }

    #[instrument(skip(self, credential, slot, data), fields(track_id = %slot.track_id, size = data.len()))]
    async fn transfer(
        &self,
        credential: &Credential,
        slot: &UploadSlot,
        file_name: &str,
        data: Bytes,
    ) -> Result<()> {
        let request = self
            .request(HttpMethod::Post, slot.upload_url.clone(), credential)
            .multipart_part(MultipartPart::file("file", file_name, data))
            .timeout(self.config.transfer_timeout);

        let response = self.http_client.execute(request).await?;
        let status = response.status;
        let marker = transfer_marker(&String::from_utf8_lossy(&response.body));

        if (200..300).contains(&status) && is_transfer_success(&marker) {
            info!(marker = %marker, "Transfer acknowledged");
            return Ok(());
        }

        if status == 401 || status == 403 {
            return Err(YandexMusicError::AuthenticationFailed(format!(
                "Upload host rejected credential (status {})",
                status
            ))
            .into());
        }

        Err(YandexMusicError::TransferRejected {
            status_code: status,
            body: marker,
        }
        .into())
    }

    #[instrument(skip(self, credential))]
    async fn patch_title(&self, credential: &Credential, track_id: &str, title: &str) -> Result<()> {
        let request = self
            .request(
                HttpMethod::Post,
                self.web_url("api/v2/handlers/edit-track-name"),
                credential,
            )
            .json(&serde_json::json!({ "trackId": track_id, "value": title }))?;

        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, credential, cover), fields(mime_type = %cover.mime_type, size = cover.data.len()))]
    async fn patch_cover(
        &self,
        credential: &Credential,
        track_id: &str,
        cover: CoverImage,
    ) -> Result<()> {
        let base = self.web_url("api/v2/handlers/edit-track-cover");
        let url = Url::parse_with_params(&base, &[("trackId", track_id)])
            .map(String::from)
            .map_err(|e| YandexMusicError::ParseError(format!("Invalid cover URL: {}", e)))?;

        let request = self.request(HttpMethod::Post, url, credential).multipart_part(
            MultipartPart::file("cover", "cover.jpg", cover.data).content_type(cover.mime_type),
        );

        self.send(request).await?;
        Ok(())
    }
}
