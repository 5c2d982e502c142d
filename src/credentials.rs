//! Credential manager: secret loading and OAuth2 client-credentials exchanges.
//!
//! `CredentialManager` owns the resolved [`CredentialPair`]s and the base
//! URLs selected for a region. It performs three token exchanges:
//!
//! | Method | Endpoint | Auth |
//! |--------|----------|------|
//! | [`CredentialManager::fetch_securex_token`] | POST `{securex}/iroh/oauth2/token` | Basic (`securex` pair) |
//! | [`CredentialManager::fetch_endpoint_token`] | POST `{v3}/access_tokens` | Bearer (SecureX token) |
//! | [`CredentialManager::fetch_umbrella_token`] | POST `{umbrella}/auth/v2/token` | Basic (`umbrella` pair) |
//!
//! All three send `grant_type=client_credentials` as a form body and return
//! `None` on any failure; the reason is logged at `warn`.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{ClientSettings, EndpointConfig, Preferences, Region, RegionUrls};
use crate::error::Result;
use crate::http::{HttpHelper, HttpMethod, Payload, RequestAuth};
use crate::secrets::{
    CredentialPair, OnePasswordCli, SecretDeclaration, SecretReader, SecretResolution,
    resolve_secret,
};

/// Subset of the token response shared by all three endpoints. Extra fields
/// (`expires_in`, `scope`, `token_type`) are ignored.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The bearer token.
    pub access_token: String,
}

fn client_credentials_form() -> Payload {
    Payload::Form(vec![(
        "grant_type".to_string(),
        "client_credentials".to_string(),
    )])
}

fn accept_json() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Resolves secrets and exchanges them for bearer tokens.
pub struct CredentialManager {
    http: HttpHelper,
    reader: Arc<dyn SecretReader>,
    declarations: Vec<SecretDeclaration>,
    credentials: HashMap<String, CredentialPair>,
    region: Region,
    urls: RegionUrls,
    umbrella_url: String,
}

impl CredentialManager {
    /// Loads both YAML documents, selects the region URLs and resolves every
    /// declared secret through the 1Password CLI.
    ///
    /// # Errors
    ///
    /// - `CscError::Config` — either document is missing or malformed.
    ///   Raised before any secret is read.
    /// - `CscError::SecretBackend` — `op` is missing or a read failed.
    /// - `CscError::Network` — the HTTP client could not be built.
    pub async fn new(settings: &ClientSettings) -> Result<Self> {
        Self::with_reader(settings, Arc::new(OnePasswordCli::new())).await
    }

    /// Same as [`CredentialManager::new`] with a caller-supplied secret reader.
    pub async fn with_reader(
        settings: &ClientSettings,
        reader: Arc<dyn SecretReader>,
    ) -> Result<Self> {
        let endpoints = EndpointConfig::load(&settings.config_path)?;
        let preferences = Preferences::load(&settings.preferences_path)?;
        let mut manager = Self::from_parts(&endpoints, preferences, settings.region(), reader)?;
        manager.load_all_secrets().await?;
        Ok(manager)
    }

    /// Builds a manager from already-loaded documents. No secrets are
    /// resolved until [`CredentialManager::load_all_secrets`] is called.
    ///
    /// # Errors
    ///
    /// - `CscError::Network` — the HTTP client could not be built.
    pub fn from_parts(
        endpoints: &EndpointConfig,
        preferences: Preferences,
        region: Region,
        reader: Arc<dyn SecretReader>,
    ) -> Result<Self> {
        let urls = endpoints.urls_for(region);
        debug!(%region, securex = %urls.securex, v3 = %urls.v3, "selected region urls");
        Ok(CredentialManager {
            http: HttpHelper::new()?,
            reader,
            declarations: preferences.credentials,
            credentials: HashMap::new(),
            region,
            urls,
            umbrella_url: endpoints.umbrella_url().to_string(),
        })
    }

    /// The region the URLs were selected for.
    pub fn region(&self) -> Region {
        self.region
    }

    /// SecureX and v3 base URLs for the selected region.
    pub fn urls(&self) -> &RegionUrls {
        &self.urls
    }

    pub(crate) fn http(&self) -> &HttpHelper {
        &self.http
    }

    /// The resolved pair stored under `name`, if any.
    pub fn credential(&self, name: &str) -> Option<&CredentialPair> {
        self.credentials.get(name)
    }

    /// Resolves one declaration with this manager's reader.
    ///
    /// # Errors
    ///
    /// - `CscError::SecretBackend` — the reader failed.
    pub async fn resolve_secret(&self, declaration: &SecretDeclaration) -> Result<SecretResolution> {
        resolve_secret(self.reader.as_ref(), declaration).await
    }

    /// Resolves every declaration in order. A repeated name overwrites the
    /// earlier pair. Unsupported backends are logged and skipped; backend
    /// failures abort.
    ///
    /// # Errors
    ///
    /// - `CscError::SecretBackend` — the first failing read; pairs resolved
    ///   before it stay loaded.
    pub async fn load_all_secrets(&mut self) -> Result<()> {
        let declarations = self.declarations.clone();
        for declaration in &declarations {
            match self.resolve_secret(declaration).await? {
                SecretResolution::Resolved(pair) => {
                    if self.credentials.insert(declaration.name.clone(), pair).is_some() {
                        debug!(name = %declaration.name, "secret declared twice, keeping the later one");
                    }
                    info!(name = %declaration.name, backend = %declaration.load_from, "loaded secret");
                }
                SecretResolution::Unsupported(backend) => {
                    warn!(name = %declaration.name, %backend, "secret backend not available, skipping");
                }
            }
        }
        Ok(())
    }

    fn basic_auth_for(&self, name: &str) -> Option<RequestAuth> {
        match self.credentials.get(name) {
            Some(pair) => Some(RequestAuth::Basic {
                username: pair.client_id.clone(),
                password: pair.secret_key.clone(),
            }),
            None => {
                warn!(name, "no credentials loaded");
                None
            }
        }
    }

    /// POSTs the client-credentials grant and pulls `access_token` out of
    /// the response.
    async fn exchange(&self, uri: &str, auth: &RequestAuth) -> Option<String> {
        let response = self
            .http
            .send(
                HttpMethod::Post,
                uri,
                auth,
                Some(&accept_json()),
                Some(&client_credentials_form()),
                None,
            )
            .await;

        match response {
            Ok(body) => match serde_json::from_value::<TokenResponse>(body) {
                Ok(token) => Some(token.access_token),
                Err(e) => {
                    warn!(uri, error = %e, "token response had no access_token");
                    None
                }
            },
            Err(outcome) => {
                warn!(uri, %outcome, "token request failed");
                None
            }
        }
    }

    /// Exchanges the `securex` pair for a SecureX bearer token.
    /// `None` if the pair is not loaded or the exchange fails.
    pub async fn fetch_securex_token(&self) -> Option<String> {
        let auth = self.basic_auth_for("securex")?;
        let uri = format!("{}/iroh/oauth2/token", self.urls.securex);
        self.exchange(&uri, &auth).await
    }

    /// The v3 exchange needs a SecureX bearer token, so this performs two
    /// round trips and fails if either does.
    pub async fn fetch_endpoint_token(&self) -> Option<String> {
        let securex = self.fetch_securex_token().await?;
        let uri = format!("{}/access_tokens", self.urls.v3);
        self.exchange(&uri, &RequestAuth::Bearer(securex)).await
    }

    /// Exchanges the `umbrella` pair for an Umbrella bearer token.
    /// `None` if the pair is not loaded or the exchange fails.
    pub async fn fetch_umbrella_token(&self) -> Option<String> {
        let auth = self.basic_auth_for("umbrella")?;
        let uri = format!("{}/auth/v2/token", self.umbrella_url);
        self.exchange(&uri, &auth).await
    }
}
