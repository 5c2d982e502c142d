//! Async Rust client library for Cisco Security Cloud APIs.
//!
//! Resolves API credentials from the 1Password CLI (cloud secret managers
//! are declared but unavailable), exchanges them for OAuth2 client-credentials
//! tokens (SecureX, Secure Endpoint v3, Umbrella), and wraps the Secure
//! Endpoint v1 REST endpoints behind named methods.
//!
//! # Modules
//!
//! - [`config`] — YAML loading, endpoint URL map, region selection.
//! - [`secrets`] — Secret declarations and backend resolution.
//! - [`credentials`] — Credential manager and token exchanges.
//! - [`http`] — Verb dispatch, auth attachment, status translation.
//! - [`token`] — Token cache slot and injectable clock.
//! - [`client`] — Secure Endpoint client core and token refresh.
//! - [`computers`], [`audit`], [`vulnerabilities`] — v1 endpoint methods.
//! - [`error`] — `CscError` and `HttpOutcome`.
//!
//! # Quick Start
//!
//! ```ignore
//! use cscguard::client::SecureEndpointClient;
//! use cscguard::config::ClientSettings;
//!
//! let settings = ClientSettings { region: "emea".into(), ..Default::default() };
//! let client = SecureEndpointClient::new(&settings).await?;
//! if let Some(computers) = client.list_computers(0, 50, None).await? {
//!     println!("{computers:#}");
//! }
//! ```

#![warn(missing_docs)]

pub mod audit;
pub mod client;
pub mod computers;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod secrets;
pub mod token;
pub mod vulnerabilities;
