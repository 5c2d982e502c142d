//! Typed error hierarchy for the cscguard crate.
//!
//! Two layers:
//! - [`CscError`] covers failures that abort client construction (bad YAML,
//!   an unreachable secret CLI) plus a wrapper for HTTP outcomes so callers
//!   can use `?` across both.
//! - [`HttpOutcome`] is the value every HTTP call returns on a non-2xx
//!   status or transport failure. It is returned, never panicked on, and the
//!   caller decides what to do with it.

use std::path::PathBuf;

/// Unified error type for construction-time and CLI-level failures.
#[derive(Debug, thiserror::Error)]
pub enum CscError {
    /// A YAML document could not be located, parsed, or mapped onto the
    /// expected shape. Always fatal: no defaults, no partial load.
    #[error("config error in {}: {message}", path.display())]
    Config {
        /// The file that failed to load.
        path: PathBuf,
        /// What went wrong (missing file, malformed YAML, missing key).
        message: String,
        /// The underlying I/O or YAML error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The secret backend could not produce a value: the `op` CLI is not
    /// installed, exited non-zero, or printed something that is not UTF-8.
    #[error("secret backend error: {message}")]
    SecretBackend {
        /// Human-readable description, including the secret reference.
        message: String,
        /// The spawn or decoding error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The HTTP client itself could not be built (TLS backend init failure).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An API call returned a non-success outcome.
    #[error(transparent)]
    Http(#[from] HttpOutcome),
}

impl CscError {
    pub(crate) fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CscError::Config {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn config_with_source<E>(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CscError::Config {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result of an HTTP exchange that did not produce a usable JSON body.
///
/// The status-bearing variants follow a fixed translation table applied to
/// every response; see [`crate::http::classify_status`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpOutcome {
    /// 300–399: the resource moved.
    #[error("redirect: received HTTP status {status}; resource moved")]
    Redirect {
        /// The 3xx status code.
        status: u16,
    },

    /// 400.
    #[error("received HTTP status 400; bad request")]
    BadRequest,

    /// 401 or 403.
    #[error("received HTTP status {status}; check credentials")]
    AuthError {
        /// Either 401 or 403.
        status: u16,
    },

    /// 404.
    #[error("received HTTP status 404; not found")]
    NotFound,

    /// 500–599.
    #[error("received HTTP status {status}; a server error occurred")]
    ServerError {
        /// The 5xx status code.
        status: u16,
    },

    /// Any status outside the ranges above (1xx, 402, 405–499 other than
    /// the ones listed, 600+).
    #[error("received unhandled HTTP status {status}")]
    UnhandledStatus {
        /// The raw status code.
        status: u16,
    },

    /// The request never produced a status (DNS, connect, TLS, timeout).
    #[error("transport failure: {0}")]
    Transport(String),

    /// A 2xx response whose body was not valid JSON.
    #[error("could not decode response body: {0}")]
    Decode(String),
}

impl HttpOutcome {
    /// The HTTP status carried by this outcome, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpOutcome::Redirect { status }
            | HttpOutcome::AuthError { status }
            | HttpOutcome::ServerError { status }
            | HttpOutcome::UnhandledStatus { status } => Some(*status),
            HttpOutcome::BadRequest => Some(400),
            HttpOutcome::NotFound => Some(404),
            HttpOutcome::Transport(_) | HttpOutcome::Decode(_) => None,
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, CscError>;

/// Alias for calls whose only failure mode is an HTTP outcome.
pub type ApiResult<T> = std::result::Result<T, HttpOutcome>;
