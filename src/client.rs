//! Secure Endpoint API client.
//!
//! `SecureEndpointClient` ties together the region's base URLs, the AMP
//! Basic-auth credential pair and the token cache. Endpoint methods live in
//! the [`crate::computers`], [`crate::audit`] and [`crate::vulnerabilities`]
//! modules as further `impl` blocks on this type.
//!
//! URL layout: the config holds the v3 base (e.g.
//! `https://api.amp.cisco.com/v3`); the v1 and v0 bases are derived by
//! swapping the version segment. Resource endpoints are all under v1 and
//! use Basic auth; the v3 and SecureX tokens are cached for callers that
//! need them.
//!
//! Token lifecycle: each slot sits behind its own `tokio::sync::Mutex`,
//! held for the whole check-and-refresh sequence so that concurrent callers
//! trigger at most one refresh per expiry.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ClientSettings;
use crate::credentials::CredentialManager;
use crate::error::{ApiResult, Result};
use crate::http::{HttpMethod, Payload, Query, RequestAuth};
use crate::secrets::{OnePasswordCli, SecretReader};
use crate::token::{Clock, SystemClock, TOKEN_VALIDITY, Token, TokenKind};

/// Pulls `data` out of a Secure Endpoint response envelope
/// (`{"version", "metadata", "data"}`). Anything that is not an object with
/// a non-null `data` key yields `None`.
pub fn envelope_data(body: Value) -> Option<Value> {
    match body {
        Value::Object(mut map) => map.remove("data").filter(|data| !data.is_null()),
        _ => None,
    }
}

/// Replaces the `/v3` version segment of a base URL.
fn with_version(v3_url: &str, version: &str) -> String {
    v3_url.replacen("/v3", &format!("/{version}"), 1)
}

/// Authenticated client for the Secure Endpoint REST API.
pub struct SecureEndpointClient {
    credentials: CredentialManager,
    clock: Arc<dyn Clock>,
    v3_url: String,
    v1_url: String,
    v0_url: String,
    amp_token: Mutex<Token>,
    securex_token: Mutex<Token>,
}

impl SecureEndpointClient {
    /// Loads config and preferences, resolves every secret via `op`, and
    /// selects the region's URLs. Fails before any network call if either
    /// YAML document is missing or malformed.
    ///
    /// # Errors
    ///
    /// - `CscError::Config` — either YAML document is missing or malformed.
    /// - `CscError::SecretBackend` — `op` is missing or a read failed.
    /// - `CscError::Network` — the HTTP client could not be built.
    pub async fn new(settings: &ClientSettings) -> Result<Self> {
        Self::with_parts(settings, Arc::new(OnePasswordCli::new()), Arc::new(SystemClock)).await
    }

    /// Constructor with an injected secret reader and clock.
    ///
    /// # Errors
    ///
    /// Same as [`SecureEndpointClient::new`].
    pub async fn with_parts(
        settings: &ClientSettings,
        reader: Arc<dyn SecretReader>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let credentials = CredentialManager::with_reader(settings, reader).await?;
        Ok(Self::from_manager(credentials, clock))
    }

    /// Wraps an already-populated credential manager.
    pub fn from_manager(credentials: CredentialManager, clock: Arc<dyn Clock>) -> Self {
        let v3_url = credentials.urls().v3.clone();
        let v1_url = with_version(&v3_url, "v1");
        let v0_url = with_version(&v3_url, "v0");
        if v1_url == v3_url {
            warn!(%v3_url, "v3 base URL has no /v3 segment; v1 calls will hit the same base");
        }
        SecureEndpointClient {
            credentials,
            clock,
            v3_url,
            v1_url,
            v0_url,
            amp_token: Mutex::new(Token::empty()),
            securex_token: Mutex::new(Token::empty()),
        }
    }

    /// Base URL for v3 (token exchange).
    pub fn v3_url(&self) -> &str {
        &self.v3_url
    }

    /// Base URL for the v1 resource endpoints.
    pub fn v1_url(&self) -> &str {
        &self.v1_url
    }

    /// Base URL for the legacy v0 endpoints.
    pub fn v0_url(&self) -> &str {
        &self.v0_url
    }

    /// The manager holding resolved secrets and region URLs.
    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    fn slot(&self, which: TokenKind) -> &Mutex<Token> {
        match which {
            TokenKind::Amp => &self.amp_token,
            TokenKind::SecureX => &self.securex_token,
        }
    }

    async fn fetch(&self, which: TokenKind) -> Option<String> {
        match which {
            TokenKind::Amp => self.credentials.fetch_endpoint_token().await,
            TokenKind::SecureX => self.credentials.fetch_securex_token().await,
        }
    }

    /// Refreshes the named token if it is missing or expired.
    ///
    /// Returns `true` when a refresh was attempted. A failed refresh leaves
    /// the slot empty, so the next call tries again.
    pub async fn get_token(&self, which: TokenKind) -> bool {
        let mut slot = self.slot(which).lock().await;
        if slot.is_usable(self.clock.now()) {
            return false;
        }

        debug!(token = %which, "refreshing token");
        match self.fetch(which).await {
            Some(value) => *slot = Token::issued(value, self.clock.now(), TOKEN_VALIDITY),
            None => {
                warn!(token = %which, "token refresh failed");
                slot.clear();
            }
        }
        true
    }

    /// Ensures the named token is fresh and returns it.
    pub async fn token(&self, which: TokenKind) -> Option<String> {
        self.get_token(which).await;
        let slot = self.slot(which).lock().await;
        slot.value_at(self.clock.now()).map(str::to_owned)
    }

    fn amp_basic_auth(&self) -> RequestAuth {
        match self.credentials.credential("amp") {
            Some(pair) => RequestAuth::Basic {
                username: pair.client_id.clone(),
                password: pair.secret_key.clone(),
            },
            None => {
                warn!("no amp credentials loaded; sending v1 request without auth");
                RequestAuth::None
            }
        }
    }

    /// Sends a Basic-auth request under the v1 base and unwraps `data`.
    /// `path` starts with a slash.
    pub(crate) async fn v1_request(
        &self,
        method: HttpMethod,
        path: &str,
        payload: Option<&Payload>,
        query: Option<&Query>,
    ) -> ApiResult<Option<Value>> {
        let uri = format!("{}{}", self.v1_url, path);
        let body = self
            .credentials
            .http()
            .send(method, &uri, &self.amp_basic_auth(), None, payload, query)
            .await?;
        Ok(envelope_data(body))
    }

    /// Verbs the v1 resource at `path` currently accepts (OPTIONS).
    pub(crate) async fn v1_allowed_methods(&self, path: &str) -> ApiResult<Vec<String>> {
        let uri = format!("{}{}", self.v1_url, path);
        self.credentials
            .http()
            .allowed_methods(&uri, &self.amp_basic_auth())
            .await
    }

    pub(crate) async fn v1_get(&self, path: &str, query: Query) -> ApiResult<Option<Value>> {
        self.v1_request(HttpMethod::Get, path, None, Some(&query)).await
    }
}
