//! Per-account authorization sessions
//!
//! [`AuthManager`] starts device authorizations, keeps at most one poll loop
//! alive per account and reports every terminal outcome through the
//! front end's status message.
//!
//! Starting a new authorization while one is running cancels the old poll
//! loop and waits for it to finish before a new code is requested.

use bridge_traits::messenger::{edit_quietly, MessageRef, StatusSink};
use bridge_traits::Credential;
use core_library::{AccountId, AccountRepository};
use core_runtime::logging::mask_credential;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::device::DeviceAuthFlow;
use crate::error::{AuthError, Result};
use crate::types::{AuthStart, DeviceAuthState, DeviceCode, PendingAuthorization, PollOutcome};

static CREDENTIAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^y0_[A-Za-z0-9_-]{30,100}$").expect("valid credential regex"));

const TEXT_ALREADY_AUTHORIZED: &str = "You are already authorized.";
const TEXT_GRANTED: &str = "Authorization complete. You can upload tracks now.";
const TEXT_EXPIRED: &str = "The authorization code expired. Start authorization again.";
const TEXT_DENIED: &str = "Authorization was denied. Start authorization again.";
const TEXT_STORE_FAILED: &str = "Authorization succeeded but could not be saved. Try again.";

fn instructions(pending: &PendingAuthorization) -> String {
    format!(
        "Open {} and enter the code {}.\nThe code is valid for {} minutes.",
        pending.verification_url,
        pending.user_code,
        pending.expires_in.as_secs().div_ceil(60)
    )
}

/// Check a user-supplied credential string.
///
/// # Errors
///
/// Returns `AuthError::Validation` if the trimmed string does not look like
/// an access token.
pub fn validate_credential(raw: &str) -> Result<Credential> {
    let trimmed = raw.trim();
    if CREDENTIAL_PATTERN.is_match(trimmed) {
        Ok(Credential::new(trimmed))
    } else {
        Err(AuthError::Validation(
            "expected a token starting with y0_ followed by 30 to 100 characters".to_string(),
        ))
    }
}

/// A running poll loop.
struct ActiveAuthorization {
    session_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    state: watch::Receiver<DeviceAuthState>,
}

/// Device authorization sessions keyed by account.
pub struct AuthManager {
    flow: Arc<DeviceAuthFlow>,
    accounts: Arc<dyn AccountRepository>,
    status: Arc<dyn StatusSink>,
    sessions: Arc<Mutex<HashMap<AccountId, ActiveAuthorization>>>,
    /// Serializes start/cancel/submit per account
    account_locks: Arc<Mutex<HashMap<AccountId, Arc<Mutex<()>>>>>,
}

impl AuthManager {
    pub fn new(
        flow: Arc<DeviceAuthFlow>,
        accounts: Arc<dyn AccountRepository>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            flow,
            accounts,
            status,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            account_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn account_lock(&self, account: AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().await;
        locks
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start a device authorization for `account`.
    ///
    /// The front-end message `status` is rewritten with the instructions and
    /// later with the outcome. A credential already on file short-circuits.
    ///
    /// # Errors
    ///
    /// - `AuthError::Network` / `AuthError::Protocol` if no code could be obtained
    /// - `AuthError::Library` if the credential lookup fails
    #[instrument(skip(self, status), fields(account = %account))]
    pub async fn start(&self, account: AccountId, status: MessageRef) -> Result<AuthStart> {
        let lock = self.account_lock(account).await;
        let _guard = lock.lock().await;

        if self.accounts.get_credential(account).await?.is_some() {
            info!("Account already authorized");
            edit_quietly(self.status.as_ref(), &status, TEXT_ALREADY_AUTHORIZED).await;
            return Ok(AuthStart::AlreadyAuthorized);
        }

        if self.stop_session(account).await {
            info!("Superseded previous authorization");
        }

        let code = self.flow.request_code().await?;
        let pending = code.pending();
        edit_quietly(self.status.as_ref(), &status, &instructions(&pending)).await;

        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(DeviceAuthState::Requested);

        let mut sessions = self.sessions.lock().await;
        let task = self.clone_for_task();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            task.run_session(account, session_id, code, status, task_cancel, state_tx)
                .await;
            task.finish_session(account, session_id).await;
        });
        sessions.insert(
            account,
            ActiveAuthorization {
                session_id,
                cancel,
                handle,
                state: state_rx,
            },
        );
        drop(sessions);

        info!(session = %session_id, "Authorization started");
        Ok(AuthStart::Started(pending))
    }

    /// Cancel the running authorization for `account` and wait for it to stop.
    ///
    /// Returns `true` if a poll loop was running.
    #[instrument(skip(self), fields(account = %account))]
    pub async fn cancel(&self, account: AccountId) -> bool {
        let lock = self.account_lock(account).await;
        let _guard = lock.lock().await;
        self.stop_session(account).await
    }

    /// Store a credential typed in by the user.
    ///
    /// A running authorization for the account is cancelled first.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if the string is malformed; nothing is stored
    /// - `AuthError::Library` if the credential cannot be saved
    #[instrument(skip(self, raw), fields(account = %account))]
    pub async fn submit_credential(&self, account: AccountId, raw: &str) -> Result<()> {
        let credential = validate_credential(raw)?;

        let lock = self.account_lock(account).await;
        let _guard = lock.lock().await;

        self.stop_session(account).await;
        self.accounts.set_credential(account, &credential).await?;

        info!(
            credential = %mask_credential(credential.expose()),
            "Credential stored from manual entry"
        );
        Ok(())
    }

    /// Watch the state of the running authorization, if any.
    pub async fn subscribe(&self, account: AccountId) -> Option<watch::Receiver<DeviceAuthState>> {
        let sessions = self.sessions.lock().await;
        sessions.get(&account).map(|s| s.state.clone())
    }

    pub async fn is_pending(&self, account: AccountId) -> bool {
        self.sessions.lock().await.contains_key(&account)
    }

    /// Remove, cancel and await the session for `account`.
    async fn stop_session(&self, account: AccountId) -> bool {
        let previous = self.sessions.lock().await.remove(&account);
        match previous {
            Some(active) => {
                debug!(session = %active.session_id, "Cancelling authorization");
                active.cancel.cancel();
                if let Err(e) = active.handle.await {
                    warn!(error = %e, "Authorization task ended abnormally");
                }
                true
            }
            None => false,
        }
    }

    fn clone_for_task(&self) -> Self {
        Self {
            flow: Arc::clone(&self.flow),
            accounts: Arc::clone(&self.accounts),
            status: Arc::clone(&self.status),
            sessions: Arc::clone(&self.sessions),
            account_locks: Arc::clone(&self.account_locks),
        }
    }

    #[instrument(skip_all, fields(account = %account, session = %session_id))]
    async fn run_session(
        &self,
        account: AccountId,
        session_id: Uuid,
        code: DeviceCode,
        status: MessageRef,
        cancel: CancellationToken,
        state_tx: watch::Sender<DeviceAuthState>,
    ) {
        // Granted is published only once the credential is stored
        let outcome = self
            .flow
            .poll(&code, &cancel, |state| {
                if state != DeviceAuthState::Granted {
                    state_tx.send_replace(state);
                }
            })
            .await;

        let text = match outcome {
            PollOutcome::Granted(credential) => {
                match self.accounts.set_credential(account, &credential).await {
                    Ok(()) => {
                        info!("Credential stored");
                        state_tx.send_replace(DeviceAuthState::Granted);
                        TEXT_GRANTED
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to store granted credential");
                        state_tx.send_replace(DeviceAuthState::Failed);
                        TEXT_STORE_FAILED
                    }
                }
            }
            PollOutcome::Expired => TEXT_EXPIRED,
            PollOutcome::Denied => TEXT_DENIED,
            PollOutcome::Cancelled => {
                debug!("Authorization cancelled");
                return;
            }
        };

        edit_quietly(self.status.as_ref(), &status, text).await;
    }

    /// Drop the map entry if it still belongs to `session_id`.
    async fn finish_session(&self, account: AccountId, session_id: Uuid) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(&account)
            .is_some_and(|active| active.session_id == session_id)
        {
            sessions.remove(&account);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use core_library::{Account, LibraryError};
    use core_runtime::config::OAuthClientConfig;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    const TOKEN: &str = "y0_AgAAAAAAxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

    /// Answers device-code requests with a fixed code and token requests
    /// from a script, defaulting to `authorization_pending`.
    struct StubOAuthServer {
        token_responses: StdMutex<VecDeque<&'static str>>,
        code_requests: StdMutex<usize>,
    }

    impl StubOAuthServer {
        fn new(token_responses: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                token_responses: StdMutex::new(token_responses.into()),
                code_requests: StdMutex::new(0),
            })
        }

        fn code_requests(&self) -> usize {
            *self.code_requests.lock().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for StubOAuthServer {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            let body = if request.url.ends_with("/device/code") {
                *self.code_requests.lock().unwrap() += 1;
                r#"{"device_code":"dev","user_code":"USER-CODE","verification_url":"https://ya.ru/device","interval":5,"expires_in":300}"#
            } else {
                self.token_responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(r#"{"error":"authorization_pending"}"#)
            };
            let status = if body.contains("access_token") || body.contains("device_code") {
                200
            } else {
                400
            };
            Ok(HttpResponse {
                status,
                headers: Default::default(),
                body: Bytes::from(body),
            })
        }

        async fn download_stream(
            &self,
            _url: String,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::NotAvailable("download".to_string()))
        }
    }

    /// Credential store kept in memory so paused-clock tests never wait on
    /// a database thread.
    #[derive(Default)]
    struct MemoryAccounts {
        credentials: StdMutex<HashMap<AccountId, Credential>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl AccountRepository for MemoryAccounts {
        async fn ensure(&self, _account: AccountId) -> core_library::Result<bool> {
            Ok(false)
        }

        async fn find(&self, _account: AccountId) -> core_library::Result<Option<Account>> {
            Ok(None)
        }

        async fn get_credential(&self, account: AccountId) -> core_library::Result<Option<Credential>> {
            Ok(self.credentials.lock().unwrap().get(&account).cloned())
        }

        async fn set_credential(
            &self,
            account: AccountId,
            credential: &Credential,
        ) -> core_library::Result<()> {
            if self.fail_writes {
                return Err(LibraryError::Migration("read-only".to_string()));
            }
            self.credentials
                .lock()
                .unwrap()
                .insert(account, credential.clone());
            Ok(())
        }

        async fn clear_credential(&self, account: AccountId) -> core_library::Result<bool> {
            Ok(self.credentials.lock().unwrap().remove(&account).is_some())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        edits: StdMutex<Vec<String>>,
    }

    impl RecordingSink {
        fn edits(&self) -> Vec<String> {
            self.edits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn post(&self, chat_id: i64, _text: &str) -> BridgeResult<MessageRef> {
            Ok(MessageRef::new(chat_id, 1))
        }

        async fn edit(&self, _message: &MessageRef, text: &str) -> BridgeResult<()> {
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Fixture {
        manager: AuthManager,
        accounts: Arc<MemoryAccounts>,
        server: Arc<StubOAuthServer>,
        sink: Arc<RecordingSink>,
    }

    fn fixture(token_responses: Vec<&'static str>) -> Fixture {
        fixture_with(MemoryAccounts::default(), token_responses)
    }

    fn fixture_with(accounts: MemoryAccounts, token_responses: Vec<&'static str>) -> Fixture {
        let accounts = Arc::new(accounts);
        let server = StubOAuthServer::new(token_responses);
        let sink = Arc::new(RecordingSink::default());
        let flow = Arc::new(DeviceAuthFlow::new(
            OAuthClientConfig::new("client", "secret"),
            server.clone(),
        ));
        let manager = AuthManager::new(flow, accounts.clone(), sink.clone());
        Fixture {
            manager,
            accounts,
            server,
            sink,
        }
    }

    async fn wait_for_terminal(mut rx: watch::Receiver<DeviceAuthState>) -> DeviceAuthState {
        rx.wait_for(|s| s.is_terminal())
            .await
            .map(|s| *s)
            .unwrap_or(DeviceAuthState::Cancelled)
    }

    #[test]
    fn test_validate_credential() {
        assert!(validate_credential(TOKEN).is_ok());
        assert_eq!(
            validate_credential(&format!("  {}\n", TOKEN)).unwrap().expose(),
            TOKEN
        );
        assert!(matches!(
            validate_credential("y0_short"),
            Err(AuthError::Validation(_))
        ));
        assert!(validate_credential("AQAAAAAAxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx").is_err());
        assert!(validate_credential(&format!("{}!", TOKEN)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_grants_and_stores_credential() {
        let fx = fixture(vec![
            r#"{"error":"authorization_pending"}"#,
            r#"{"access_token":"y0_granted_token"}"#,
        ]);
        let account = AccountId(42);

        let started = fx.manager.start(account, MessageRef::new(42, 1)).await.unwrap();
        let AuthStart::Started(pending) = started else {
            panic!("expected a started flow");
        };
        assert_eq!(pending.user_code, "USER-CODE");

        let rx = fx.manager.subscribe(account).await.unwrap();
        assert_eq!(wait_for_terminal(rx).await, DeviceAuthState::Granted);

        let stored = fx.accounts.get_credential(account).await.unwrap().unwrap();
        assert_eq!(stored.expose(), "y0_granted_token");

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!fx.manager.is_pending(account).await);

        let edits = fx.sink.edits();
        assert!(edits[0].contains("USER-CODE"));
        assert_eq!(edits.last().map(String::as_str), Some(TEXT_GRANTED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_short_circuits_when_authorized() {
        let fx = fixture(vec![]);
        let account = AccountId(7);
        fx.accounts
            .set_credential(account, &Credential::new(TOKEN))
            .await
            .unwrap();

        let started = fx.manager.start(account, MessageRef::new(7, 1)).await.unwrap();

        assert_eq!(started, AuthStart::AlreadyAuthorized);
        assert_eq!(fx.server.code_requests(), 0);
        assert!(!fx.manager.is_pending(account).await);
        assert_eq!(fx.sink.edits(), vec![TEXT_ALREADY_AUTHORIZED.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_session() {
        let fx = fixture(vec![]);
        let account = AccountId(9);

        fx.manager.start(account, MessageRef::new(9, 1)).await.unwrap();
        let first = fx.manager.subscribe(account).await.unwrap();

        fx.manager.start(account, MessageRef::new(9, 2)).await.unwrap();

        assert_eq!(*first.borrow(), DeviceAuthState::Cancelled);
        assert_eq!(fx.server.code_requests(), 2);
        assert!(fx.manager.is_pending(account).await);

        let second = fx.manager.subscribe(account).await.unwrap();
        assert!(!second.borrow().is_terminal());
        assert!(fx.manager.cancel(account).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_reports_terminal_status() {
        let fx = fixture(vec![r#"{"error":"access_denied"}"#]);
        let account = AccountId(11);

        fx.manager.start(account, MessageRef::new(11, 1)).await.unwrap();
        let rx = fx.manager.subscribe(account).await.unwrap();

        assert_eq!(wait_for_terminal(rx).await, DeviceAuthState::Denied);
        assert!(fx.accounts.get_credential(account).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fx.sink.edits().last().map(String::as_str), Some(TEXT_DENIED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_reports_failed_state() {
        let accounts = MemoryAccounts {
            fail_writes: true,
            ..Default::default()
        };
        let fx = fixture_with(accounts, vec![r#"{"access_token":"y0_granted_token"}"#]);
        let account = AccountId(12);

        fx.manager.start(account, MessageRef::new(12, 1)).await.unwrap();
        let rx = fx.manager.subscribe(account).await.unwrap();

        assert_eq!(wait_for_terminal(rx).await, DeviceAuthState::Failed);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(
            fx.sink.edits().last().map(String::as_str),
            Some(TEXT_STORE_FAILED)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_session() {
        let fx = fixture(vec![]);
        assert!(!fx.manager.cancel(AccountId(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_credential_cancels_running_flow() {
        let fx = fixture(vec![]);
        let account = AccountId(5);

        fx.manager.start(account, MessageRef::new(5, 1)).await.unwrap();
        assert!(fx.manager.is_pending(account).await);

        fx.manager.submit_credential(account, TOKEN).await.unwrap();

        assert!(!fx.manager.is_pending(account).await);
        let stored = fx.accounts.get_credential(account).await.unwrap().unwrap();
        assert_eq!(stored.expose(), TOKEN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_invalid_credential_stores_nothing() {
        let fx = fixture(vec![]);
        let account = AccountId(6);

        let result = fx.manager.submit_credential(account, "not a token").await;

        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert!(fx.accounts.get_credential(account).await.unwrap().is_none());
    }
}
