//! Thin HTTP dispatcher shared by the credential manager and API client.
//!
//! Every request goes through [`HttpHelper::send`], which:
//! - maps an [`HttpMethod`] onto a `reqwest` request,
//! - attaches credentials according to [`RequestAuth`],
//! - applies a fixed 5-second timeout with no retry,
//! - translates the status code through [`classify_status`] so callers
//!   receive either the parsed JSON body or an [`HttpOutcome`] value.

use std::time::Duration;

use reqwest::header::{ALLOW, HeaderMap};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiResult, HttpOutcome};

/// Overall timeout for every outbound call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Verbs the helper knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
    Put,
    Options,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

/// How credentials are attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub enum RequestAuth {
    /// No credentials.
    None,
    /// HTTP Basic with a client ID and secret.
    #[allow(missing_docs)]
    Basic { username: String, password: String },
    /// `Authorization: Bearer <token>`.
    Bearer(String),
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestAuth::None => f.write_str("None"),
            RequestAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            RequestAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `application/x-www-form-urlencoded`, used by the token endpoints.
    Form(Vec<(String, String)>),
    /// `application/json`.
    Json(Value),
}

/// Ordered query-string builder. Optional parameters are dropped when `None`
/// so endpoints never send empty `key=` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one parameter.
    pub fn push(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// Appends the parameter only when `value` is present.
    pub fn push_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.push(key, v),
            None => self,
        }
    }

    /// Merges a raw `key=value&key2=value2` fragment, decoding it the same
    /// way a form body is decoded. Malformed fragments contribute nothing.
    pub fn extend_raw(mut self, fragment: Option<&str>) -> Self {
        let Some(fragment) = fragment.map(|f| f.trim_start_matches(['?', '&'])) else {
            return self;
        };
        match serde_urlencoded::from_str::<Vec<(String, String)>>(fragment) {
            Ok(pairs) => self.pairs.extend(pairs),
            Err(e) => debug!(fragment, error = %e, "ignoring unparseable query fragment"),
        }
        self
    }

    /// Parameters in insertion order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Whether no parameters were added.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Translates an HTTP status into success (`Ok(())`) or an outcome.
///
/// 401 and 403 are matched explicitly as a set; both mean the credentials
/// were rejected.
pub fn classify_status(status: u16) -> Result<(), HttpOutcome> {
    match status {
        200..=299 => Ok(()),
        300..=399 => Err(HttpOutcome::Redirect { status }),
        400 => Err(HttpOutcome::BadRequest),
        401 | 403 => Err(HttpOutcome::AuthError { status }),
        404 => Err(HttpOutcome::NotFound),
        500..=599 => Err(HttpOutcome::ServerError { status }),
        _ => Err(HttpOutcome::UnhandledStatus { status }),
    }
}

/// Shared `reqwest` client with the fixed timeout applied.
#[derive(Debug, Clone)]
pub struct HttpHelper {
    client: Client,
}

impl HttpHelper {
    /// Builds the client. Fails only if the TLS backend cannot initialise.
    pub fn new() -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            // Redirects are reported as outcomes, not followed.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(HttpHelper { client })
    }

    /// Sends one request and translates the response.
    ///
    /// # Errors
    ///
    /// - A status outcome from [`classify_status`] for any non-2xx reply.
    /// - `HttpOutcome::Transport` — no reply within [`REQUEST_TIMEOUT`], or
    ///   the connection failed.
    /// - `HttpOutcome::Decode` — a 2xx body that is not JSON.
    ///
    /// A 2xx with an empty body yields `Value::Null` (DELETE commonly
    /// returns no content).
    pub async fn send(
        &self,
        method: HttpMethod,
        uri: &str,
        auth: &RequestAuth,
        headers: Option<&HeaderMap>,
        payload: Option<&Payload>,
        query: Option<&Query>,
    ) -> ApiResult<Value> {
        let mut req = self.request(method, uri, auth);

        if let Some(headers) = headers {
            req = req.headers(headers.clone());
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            req = req.query(query.pairs());
        }
        req = match payload {
            Some(Payload::Form(fields)) => req.form(fields),
            Some(Payload::Json(body)) => req.json(body),
            None => req,
        };

        let response = dispatch(req, method, uri).await?;
        let body = response
            .text()
            .await
            .map_err(|e| HttpOutcome::Transport(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| HttpOutcome::Decode(e.to_string()))
    }

    /// Sends an OPTIONS request and returns the verbs listed in the `Allow`
    /// header, uppercased. A 2xx without the header yields an empty list.
    ///
    /// # Errors
    ///
    /// Same status and transport outcomes as [`HttpHelper::send`].
    pub async fn allowed_methods(&self, uri: &str, auth: &RequestAuth) -> ApiResult<Vec<String>> {
        let req = self.request(HttpMethod::Options, uri, auth);
        let response = dispatch(req, HttpMethod::Options, uri).await?;
        let allow = response
            .headers()
            .get_all(ALLOW)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(|verb| verb.trim().to_ascii_uppercase())
            .filter(|verb| !verb.is_empty())
            .collect();
        Ok(allow)
    }

    fn request(&self, method: HttpMethod, uri: &str, auth: &RequestAuth) -> RequestBuilder {
        let req = self.client.request(method.as_reqwest(), uri);
        match auth {
            RequestAuth::None => req,
            RequestAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            RequestAuth::Bearer(token) => req.bearer_auth(token),
        }
    }
}

/// Sends a prepared request and applies the status table.
async fn dispatch(req: RequestBuilder, method: HttpMethod, uri: &str) -> ApiResult<Response> {
    debug!(?method, uri, "sending request");
    let response = req
        .send()
        .await
        .map_err(|e| HttpOutcome::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    debug!(?method, uri, status, "received response");
    classify_status(status)?;
    Ok(response)
}
