//! The Slade 360 server client.
//!
//! A [`ServerClient`] holds one credential set, obtains tokens with the
//! OAuth2 password grant and dispatches authenticated JSON requests.
//!
//! A client starts uninitialized. [`ServerClient::initialize`] validates the
//! credentials, authenticates and checks the resulting token bundle; only
//! then is the client marked initialized. Every request made afterwards
//! refreshes the token first when its refresh deadline has passed.
//!
//! # Example
//!
//! ```rust,no_run
//! use slade_core::{ClientConfig, RequestDispatcher, ServerClient};
//!
//! # async fn example() -> Result<(), slade_core::ClientError> {
//! let client = ServerClient::connect(ClientConfig::from_env()?).await?;
//! let url = client.compose_api_url("/v1/patients/", "page=1")?;
//! let response = client.make_request(reqwest::Method::GET, &url, None).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{self, ClientConfig};
use crate::debug::curl_command;
use crate::error::{ClientError, ClientResult};
use crate::exchange::{TokenExchanger, password_grant_form, refresh_grant_form};
use crate::token::TokenState;
use crate::urls;
use crate::validate::{check_postconditions, check_preconditions};

/// Timeout of the long-lived HTTP transport.
///
/// Long enough for slow crawl-style integrations, not just quick API calls.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Token lifecycle capabilities.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtain a fresh token bundle with the password grant.
    async fn authenticate(&self) -> ClientResult<()>;

    /// Obtain a fresh token bundle with the refresh grant.
    async fn refresh(&self) -> ClientResult<()>;

    fn is_initialized(&self) -> bool;

    /// Snapshot of the current token bundle, if any.
    fn token_state(&self) -> Option<Arc<TokenState>>;

    fn access_token(&self) -> Option<String> {
        self.token_state()
            .map(|s| s.access_token.expose().to_string())
    }

    fn token_type(&self) -> Option<String> {
        self.token_state().map(|s| s.token_type.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.token_state()
            .map(|s| s.refresh_token.expose().to_string())
    }

    fn access_scope(&self) -> Option<String> {
        self.token_state().map(|s| s.access_scope.clone())
    }

    fn expires_in(&self) -> Option<i64> {
        self.token_state().map(|s| s.expires_in)
    }

    fn refresh_at(&self) -> Option<DateTime<Utc>> {
        self.token_state().map(|s| s.refresh_at)
    }
}

/// Authenticated request dispatch.
#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    /// Send an authenticated JSON request.
    ///
    /// Only responses declaring `Content-Type: application/json` are returned.
    async fn make_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<Response>;

    fn api_scheme(&self) -> &str;

    fn api_host(&self) -> &str;

    fn api_token_url(&self) -> &str;

    /// `scheme://host/path?query` on the API host.
    fn compose_api_url(&self, path: &str, query: &str) -> ClientResult<String> {
        Ok(urls::compose_api_url(
            self.api_scheme(),
            self.api_host(),
            path,
            query,
        )?)
    }

    /// The auth server user profile URL.
    fn me_url(&self) -> ClientResult<String> {
        Ok(urls::me_url(self.api_token_url())?)
    }
}

/// Fail unless `client` went through a successful initialization.
pub fn check_initialization<A>(client: &A) -> ClientResult<()>
where
    A: Authenticator + ?Sized,
{
    if client.is_initialized() {
        Ok(())
    } else {
        Err(ClientError::NotInitialized)
    }
}

/// Connect with `config` and return the resulting access token.
pub async fn get_access_token(config: ClientConfig) -> ClientResult<String> {
    let client = ServerClient::connect(config).await?;
    client.access_token().ok_or(ClientError::NotInitialized)
}

/// OAuth2 password-grant client for Slade 360 APIs.
///
/// Safe to share between tasks behind an [`Arc`]. Token reads take a
/// snapshot; refreshes are serialized so that concurrent callers past the
/// refresh deadline trigger one refresh between them.
#[derive(Debug)]
pub struct ServerClient {
    config: ClientConfig,
    http: reqwest::Client,
    exchanger: TokenExchanger,
    state: RwLock<Option<Arc<TokenState>>>,
    initialized: AtomicBool,
    refresh_lock: Mutex<()>,
    debug: AtomicBool,
}

impl ServerClient {
    /// Create an uninitialized client with its own HTTP transport.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ClientError::transport("unable to build HTTP client", e))?;
        Ok(Self::with_http_client(config, http))
    }

    /// Create an uninitialized client on a caller-supplied HTTP transport.
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        let exchanger = TokenExchanger::new(http.clone(), config.api_token_url.clone());
        Self {
            config,
            http,
            exchanger,
            state: RwLock::new(None),
            initialized: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
            debug: AtomicBool::new(false),
        }
    }

    /// Create and initialize a client.
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let client = Self::new(config)?;
        client.initialize().await?;
        Ok(client)
    }

    /// Create and initialize a client from the process environment.
    ///
    /// Wire-level debugging follows the `DEBUG` environment variable.
    pub async fn from_env() -> ClientResult<Self> {
        let client = Self::new(ClientConfig::from_env()?)?;
        client.set_debug(config::is_debug());
        client.initialize().await?;
        Ok(client)
    }

    /// Like [`from_env`](Self::from_env), logging in as a different user.
    pub async fn login(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ClientResult<Self> {
        let config = ClientConfig::from_env()?.with_login(username, password);
        let client = Self::new(config)?;
        client.set_debug(config::is_debug());
        client.initialize().await?;
        Ok(client)
    }

    /// Validate the credentials, authenticate and verify the token bundle.
    ///
    /// The client is only marked initialized when every step succeeds.
    pub async fn initialize(&self) -> ClientResult<()> {
        check_preconditions(&self.config)?;

        let candidate = self.password_grant().await?;
        check_postconditions(&candidate, Utc::now())?;

        self.store_state(candidate);
        self.initialized.store(true, Ordering::Release);
        info!(
            username = %self.config.username,
            token_url = %self.config.api_token_url,
            "server client initialized"
        );
        Ok(())
    }

    /// Obtain a new token bundle with the password grant and store it.
    ///
    /// A bundle that fails the postconditions is discarded and the current
    /// one kept.
    pub async fn authenticate(&self) -> ClientResult<()> {
        check_preconditions(&self.config)?;
        let candidate = self.password_grant().await?;
        check_postconditions(&candidate, Utc::now())?;
        self.store_state(candidate);
        info!(username = %self.config.username, "authenticated");
        Ok(())
    }

    /// Exchange the refresh token for a new token bundle.
    ///
    /// Fails without any network call on an uninitialized client. The new
    /// bundle replaces the current one only if it passes the postconditions.
    pub async fn refresh(&self) -> ClientResult<()> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Send an authenticated JSON request, refreshing the token first if due.
    pub async fn make_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<Response> {
        if !self.is_initialized() {
            return Err(ClientError::NotInitialized);
        }
        self.refresh_if_due().await?;

        let state = self.token_state().ok_or(ClientError::NotInitialized)?;
        let headers = self.request_headers(&state)?;

        if self.is_debug() {
            debug!(
                command = %curl_command(&method, url, &headers, body.as_deref()),
                "outgoing request"
            );
        }

        let mut request = self.http.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().await.map_err(|e| {
            ClientError::transport(format!("unable to send {} request to {}", method, url), e)
        })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type != JSON_CONTENT_TYPE {
            let drained = response.bytes().await;
            if let (true, Ok(bytes)) = (self.is_debug(), &drained) {
                debug!(body = %String::from_utf8_lossy(bytes), "rejected response body");
            }
            warn!(url, content_type = %content_type, "rejected non-JSON response");
            return Err(ClientError::ContentType {
                actual: content_type,
            });
        }

        Ok(response)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn token_state(&self) -> Option<Arc<TokenState>> {
        self.state.read().clone()
    }

    /// Turn curl-style request logging on or off.
    ///
    /// Authorization headers are redacted, request bodies are not.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    pub fn grant_type(&self) -> &str {
        &self.config.grant_type
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn api_scheme(&self) -> &str {
        &self.config.api_scheme
    }

    pub fn api_host(&self) -> &str {
        &self.config.api_host
    }

    pub fn api_token_url(&self) -> &str {
        &self.config.api_token_url
    }

    async fn password_grant(&self) -> ClientResult<TokenState> {
        let response = self
            .exchanger
            .exchange(password_grant_form(&self.config))
            .await
            .inspect_err(|e| error!(error = %e, "password grant failed"))?;
        Ok(TokenState::from_response(response, Utc::now())?)
    }

    async fn refresh_locked(&self) -> ClientResult<()> {
        if !self.is_initialized() {
            return Err(ClientError::NotInitialized);
        }
        let current = self.token_state().ok_or(ClientError::NotInitialized)?;

        let response = self
            .exchanger
            .exchange(refresh_grant_form(
                &self.config,
                current.refresh_token.expose(),
            ))
            .await
            .inspect_err(|e| error!(error = %e, "refresh grant failed"))?;

        let now = Utc::now();
        let candidate = TokenState::from_response(response, now)?;
        check_postconditions(&candidate, now)?;

        let refresh_at = candidate.refresh_at;
        self.store_state(candidate);
        info!(%refresh_at, "access token refreshed");
        Ok(())
    }

    async fn refresh_if_due(&self) -> ClientResult<()> {
        if !self.refresh_due() {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while this one waited.
        if !self.refresh_due() {
            debug!("token already refreshed");
            return Ok(());
        }
        self.refresh_locked().await
    }

    fn refresh_due(&self) -> bool {
        self.token_state()
            .is_some_and(|state| state.is_due(Utc::now()))
    }

    fn store_state(&self, state: TokenState) {
        *self.state.write() = Some(Arc::new(state));
    }

    fn request_headers(&self, state: &TokenState) -> ClientResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        let mut bearer =
            HeaderValue::from_str(&state.bearer()).map_err(|_| ClientError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
            })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        for (name, value) in &self.config.extra_headers {
            let invalid = || ClientError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl Authenticator for ServerClient {
    async fn authenticate(&self) -> ClientResult<()> {
        ServerClient::authenticate(self).await
    }

    async fn refresh(&self) -> ClientResult<()> {
        ServerClient::refresh(self).await
    }

    fn is_initialized(&self) -> bool {
        ServerClient::is_initialized(self)
    }

    fn token_state(&self) -> Option<Arc<TokenState>> {
        ServerClient::token_state(self)
    }
}

#[async_trait]
impl RequestDispatcher for ServerClient {
    async fn make_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<Response> {
        ServerClient::make_request(self, method, url, body).await
    }

    fn api_scheme(&self) -> &str {
        ServerClient::api_scheme(self)
    }

    fn api_host(&self) -> &str {
        ServerClient::api_host(self)
    }

    fn api_token_url(&self) -> &str {
        ServerClient::api_token_url(self)
    }
}
