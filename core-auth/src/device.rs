//! OAuth 2.0 Device Authorization Flow
//!
//! Requests a device code and polls the token endpoint until the user
//! completes authorization on another device, the code expires, or the
//! caller cancels.
//!
//! ## Poll loop
//!
//! The loop waits `interval` before every token request:
//! - `access_token` present: granted
//! - `authorization_pending`: keep polling
//! - `slow_down`: keep polling, interval grows by the configured step
//! - `expired_token` / `access_denied`: terminal
//! - any other error or a transport failure: logged, keep polling
//!
//! Once the code's lifetime has elapsed the loop stops with `Expired`,
//! whatever the server last answered.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_auth::DeviceAuthFlow;
//! use tokio_util::sync::CancellationToken;
//!
//! let flow = DeviceAuthFlow::new(config.oauth.clone(), http_client);
//! let code = flow.request_code().await?;
//! println!("Visit {} and enter {}", code.verification_url, code.user_code);
//!
//! let outcome = flow.poll(&code, &CancellationToken::new(), |state| {
//!     tracing::debug!(%state, "Authorization state changed");
//! }).await;
//! ```

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::Credential;
use core_runtime::config::OAuthClientConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::types::{DeviceAuthState, DeviceCode, ExchangeResult, PollOutcome};

/// Device code response from the authorization server
#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: Option<String>,
    user_code: Option<String>,
    verification_url: Option<String>,
    verification_uri: Option<String>,
    interval: Option<u64>,
    expires_in: Option<u64>,
}

/// Token endpoint response; success and error share one shape
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Device authorization flow against a single OAuth client.
pub struct DeviceAuthFlow {
    config: OAuthClientConfig,
    http_client: Arc<dyn HttpClient>,
}

impl DeviceAuthFlow {
    pub fn new(config: OAuthClientConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Ask the authorization server for a new device code.
    ///
    /// Fields the server omits fall back to the configured defaults.
    ///
    /// # Errors
    ///
    /// - `AuthError::Network` if the endpoint is unreachable or answers with
    ///   a non-success status
    /// - `AuthError::Protocol` if the device or user code is missing
    #[instrument(skip(self))]
    pub async fn request_code(&self) -> Result<DeviceCode> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.device_code_url.clone())
            .form(&[("client_id", self.config.client_id.as_str())])?;

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = response.status, "Device code request failed");
            return Err(AuthError::Network(format!(
                "Device code endpoint returned {}: {}",
                response.status, body
            )));
        }

        let parsed: DeviceCodeResponse = response
            .json()
            .map_err(|e| AuthError::Protocol(format!("Failed to parse device code response: {}", e)))?;

        let device_code = parsed
            .device_code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Protocol("Response has no device_code".to_string()))?;
        let user_code = parsed
            .user_code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Protocol("Response has no user_code".to_string()))?;

        let code = DeviceCode {
            device_code,
            user_code,
            verification_url: parsed
                .verification_url
                .or(parsed.verification_uri)
                .unwrap_or_else(|| self.config.fallback_verification_url.clone()),
            interval: parsed
                .interval
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(self.config.fallback_interval),
            expires_in: parsed
                .expires_in
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(self.config.fallback_expires_in),
        };

        info!(
            interval_secs = code.interval.as_secs(),
            expires_in_secs = code.expires_in.as_secs(),
            "Device code issued"
        );
        Ok(code)
    }

    /// Perform a single token request for `device_code`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Network` only for transport failures; every HTTP
    /// answer is classified into an [`ExchangeResult`].
    pub async fn exchange(&self, device_code: &str) -> Result<ExchangeResult> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone()).form(&[
            ("grant_type", "device_code"),
            ("code", device_code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])?;

        let response = self.http_client.execute(request).await?;

        let parsed: TokenResponse = match response.json() {
            Ok(parsed) => parsed,
            Err(_) => {
                return Ok(ExchangeResult::Unexpected(format!(
                    "status {} with non-JSON body",
                    response.status
                )))
            }
        };

        if response.is_success() {
            if let Some(token) = parsed.access_token.filter(|t| !t.is_empty()) {
                return Ok(ExchangeResult::Granted(Credential::new(token)));
            }
        }

        let result = match parsed.error.as_deref() {
            Some("authorization_pending") => ExchangeResult::Pending,
            Some("slow_down") => ExchangeResult::SlowDown,
            Some("expired_token") => ExchangeResult::Expired,
            Some("access_denied") => ExchangeResult::Denied,
            Some(other) => ExchangeResult::Unexpected(match parsed.error_description {
                Some(description) => format!("{}: {}", other, description),
                None => other.to_string(),
            }),
            None => ExchangeResult::Unexpected(format!("status {} without error", response.status)),
        };
        Ok(result)
    }

    /// Poll the token endpoint until a terminal outcome.
    ///
    /// `on_state` observes every state the loop passes through, the terminal
    /// one included.
    #[instrument(skip(self, code, cancel, on_state), fields(interval_secs = code.interval.as_secs()))]
    pub async fn poll<F>(
        &self,
        code: &DeviceCode,
        cancel: &CancellationToken,
        mut on_state: F,
    ) -> PollOutcome
    where
        F: FnMut(DeviceAuthState) + Send,
    {
        let deadline = Instant::now() + code.expires_in;
        let mut interval = code.interval;
        let mut attempts: u32 = 0;

        on_state(DeviceAuthState::Polling);

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break PollOutcome::Cancelled,
                _ = sleep(interval) => {}
            }

            if Instant::now() > deadline {
                info!(attempts, "Device code lifetime elapsed");
                break PollOutcome::Expired;
            }

            attempts += 1;
            let result = tokio::select! {
                _ = cancel.cancelled() => break PollOutcome::Cancelled,
                result = self.exchange(&code.device_code) => result,
            };

            match result {
                Ok(ExchangeResult::Granted(credential)) => {
                    info!(attempts, "Authorization granted");
                    break PollOutcome::Granted(credential);
                }
                Ok(ExchangeResult::Pending) => {
                    debug!(attempts, "Authorization pending");
                }
                Ok(ExchangeResult::SlowDown) => {
                    interval += self.config.slow_down_step;
                    debug!(
                        attempts,
                        interval_secs = interval.as_secs(),
                        "Server asked to slow down"
                    );
                }
                Ok(ExchangeResult::Expired) => {
                    info!(attempts, "Device code expired");
                    break PollOutcome::Expired;
                }
                Ok(ExchangeResult::Denied) => {
                    info!(attempts, "Authorization denied");
                    break PollOutcome::Denied;
                }
                Ok(ExchangeResult::Unexpected(reason)) => {
                    warn!(attempts, reason = %reason, "Unexpected token response, still polling");
                }
                Err(e) => {
                    warn!(attempts, error = %e, "Token request failed, still polling");
                }
            }
        };

        on_state(outcome.state());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays scripted token-endpoint answers and records request times.
    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<BridgeResult<HttpResponse>>>,
        requests: Mutex<Vec<(Instant, HttpRequest)>>,
    }

    impl ScriptedHttpClient {
        fn new(responses: Vec<BridgeResult<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request_times(&self) -> Vec<Instant> {
            self.requests.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().unwrap().push((Instant::now(), request));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| json(400, r#"{"error":"authorization_pending"}"#))
        }

        async fn download_stream(
            &self,
            _url: String,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::NotAvailable("download".to_string()))
        }
    }

    fn json(status: u16, body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn pending() -> BridgeResult<HttpResponse> {
        json(400, r#"{"error":"authorization_pending"}"#)
    }

    fn granted() -> BridgeResult<HttpResponse> {
        json(200, r#"{"access_token":"y0_granted","token_type":"bearer"}"#)
    }

    fn config() -> OAuthClientConfig {
        OAuthClientConfig::new("client", "secret")
    }

    fn code(interval: u64, expires_in: u64) -> DeviceCode {
        DeviceCode {
            device_code: "dev-code".to_string(),
            user_code: "ABCD".to_string(),
            verification_url: "https://ya.ru/device".to_string(),
            interval: Duration::from_secs(interval),
            expires_in: Duration::from_secs(expires_in),
        }
    }

    #[tokio::test]
    async fn test_request_code_parses_response() {
        let http = ScriptedHttpClient::new(vec![json(
            200,
            r#"{"device_code":"d1","user_code":"U1","verification_url":"https://ya.ru/device","interval":7,"expires_in":600}"#,
        )]);
        let flow = DeviceAuthFlow::new(config(), http.clone());

        let code = flow.request_code().await.unwrap();
        assert_eq!(code.device_code, "d1");
        assert_eq!(code.user_code, "U1");
        assert_eq!(code.interval, Duration::from_secs(7));
        assert_eq!(code.expires_in, Duration::from_secs(600));

        let requests = http.requests.lock().unwrap();
        let body = requests[0].1.body.clone().unwrap();
        assert_eq!(&body[..], b"client_id=client");
    }

    #[tokio::test]
    async fn test_request_code_uses_fallbacks() {
        let http = ScriptedHttpClient::new(vec![json(200, r#"{"device_code":"d1","user_code":"U1"}"#)]);
        let flow = DeviceAuthFlow::new(config(), http);

        let code = flow.request_code().await.unwrap();
        assert_eq!(code.verification_url, "https://oauth.yandex.ru/device");
        assert_eq!(code.interval, Duration::from_secs(5));
        assert_eq!(code.expires_in, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_request_code_errors() {
        let http = ScriptedHttpClient::new(vec![json(500, "oops")]);
        let result = DeviceAuthFlow::new(config(), http).request_code().await;
        assert!(matches!(result, Err(AuthError::Network(_))));

        let http = ScriptedHttpClient::new(vec![json(200, r#"{"user_code":"U1"}"#)]);
        let result = DeviceAuthFlow::new(config(), http).request_code().await;
        assert!(matches!(result, Err(AuthError::Protocol(_))));

        let http = ScriptedHttpClient::new(vec![Err(BridgeError::network("refused"))]);
        let result = DeviceAuthFlow::new(config(), http).request_code().await;
        assert!(matches!(result, Err(AuthError::Network(_))));
    }

    #[tokio::test]
    async fn test_exchange_classification() {
        let http = ScriptedHttpClient::new(vec![
            granted(),
            pending(),
            json(400, r#"{"error":"slow_down"}"#),
            json(400, r#"{"error":"expired_token"}"#),
            json(400, r#"{"error":"access_denied"}"#),
            json(400, r#"{"error":"invalid_client","error_description":"bad"}"#),
            json(502, "<html>gateway</html>"),
        ]);
        let flow = DeviceAuthFlow::new(config(), http.clone());

        assert_eq!(
            flow.exchange("d").await.unwrap(),
            ExchangeResult::Granted(Credential::new("y0_granted"))
        );
        assert_eq!(flow.exchange("d").await.unwrap(), ExchangeResult::Pending);
        assert_eq!(flow.exchange("d").await.unwrap(), ExchangeResult::SlowDown);
        assert_eq!(flow.exchange("d").await.unwrap(), ExchangeResult::Expired);
        assert_eq!(flow.exchange("d").await.unwrap(), ExchangeResult::Denied);
        assert!(matches!(
            flow.exchange("d").await.unwrap(),
            ExchangeResult::Unexpected(reason) if reason == "invalid_client: bad"
        ));
        assert!(matches!(
            flow.exchange("d").await.unwrap(),
            ExchangeResult::Unexpected(_)
        ));

        let requests = http.requests.lock().unwrap();
        let body = String::from_utf8(requests[0].1.body.clone().unwrap().to_vec()).unwrap();
        assert_eq!(
            body,
            "grant_type=device_code&code=d&client_id=client&client_secret=secret"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_grants_exactly_at_call_n() {
        let http = ScriptedHttpClient::new(vec![pending(), pending(), pending(), granted()]);
        let flow = DeviceAuthFlow::new(config(), http.clone());
        let mut states = Vec::new();

        let outcome = flow
            .poll(&code(5, 300), &CancellationToken::new(), |s| states.push(s))
            .await;

        assert_eq!(outcome, PollOutcome::Granted(Credential::new("y0_granted")));
        assert_eq!(http.request_count(), 4);
        assert_eq!(states, vec![DeviceAuthState::Polling, DeviceAuthState::Granted]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_expires_when_timeout_shorter_than_n_intervals() {
        // Grant would arrive on call 4 (t = 20s) but the code lives 15s
        let http = ScriptedHttpClient::new(vec![pending(), pending(), pending(), granted()]);
        let flow = DeviceAuthFlow::new(config(), http.clone());

        let outcome = flow
            .poll(&code(5, 15), &CancellationToken::new(), |_| {})
            .await;

        assert_eq!(outcome, PollOutcome::Expired);
        assert_eq!(http.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_slow_down_grows_interval() {
        let http = ScriptedHttpClient::new(vec![
            json(400, r#"{"error":"slow_down"}"#),
            pending(),
            granted(),
        ]);
        let flow = DeviceAuthFlow::new(config(), http.clone());
        let start = Instant::now();

        let outcome = flow
            .poll(&code(5, 300), &CancellationToken::new(), |_| {})
            .await;

        assert!(matches!(outcome, PollOutcome::Granted(_)));
        let offsets: Vec<u64> = http
            .request_times()
            .iter()
            .map(|t| t.duration_since(start).as_secs())
            .collect();
        assert_eq!(offsets, vec![5, 11, 17]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_terminal_errors() {
        let http = ScriptedHttpClient::new(vec![pending(), json(400, r#"{"error":"access_denied"}"#)]);
        let outcome = DeviceAuthFlow::new(config(), http)
            .poll(&code(1, 60), &CancellationToken::new(), |_| {})
            .await;
        assert_eq!(outcome, PollOutcome::Denied);

        let http = ScriptedHttpClient::new(vec![json(400, r#"{"error":"expired_token"}"#)]);
        let outcome = DeviceAuthFlow::new(config(), http)
            .poll(&code(1, 60), &CancellationToken::new(), |_| {})
            .await;
        assert_eq!(outcome, PollOutcome::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_survives_transient_failures() {
        let http = ScriptedHttpClient::new(vec![
            Err(BridgeError::network("connection reset")),
            json(500, r#"{"error":"server_error"}"#),
            json(502, "bad gateway"),
            granted(),
        ]);
        let outcome = DeviceAuthFlow::new(config(), http.clone())
            .poll(&code(2, 60), &CancellationToken::new(), |_| {})
            .await;

        assert!(matches!(outcome, PollOutcome::Granted(_)));
        assert_eq!(http.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cancellation() {
        let http = ScriptedHttpClient::new(vec![]);
        let flow = DeviceAuthFlow::new(config(), http.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut states = Vec::new();
        let outcome = flow.poll(&code(5, 300), &cancel, |s| states.push(s)).await;

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(http.request_count(), 0);
        assert_eq!(states.last(), Some(&DeviceAuthState::Cancelled));
    }
}
