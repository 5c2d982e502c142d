//! YAML configuration loading and region selection.
//!
//! Two documents drive a client:
//!
//! - The **endpoint config** (`config/config.yml` by default) maps each
//!   service to its regional base URLs:
//!
//!   ```yaml
//!   amp:
//!     nam: https://api.amp.cisco.com/v3
//!     emea: https://api.eu.amp.cisco.com/v3
//!     apjc: https://api.apjc.amp.cisco.com/v3
//!   securex:
//!     nam: https://visibility.amp.cisco.com
//!     emea: https://visibility.eu.amp.cisco.com
//!     apjc: https://visibility.apjc.amp.cisco.com
//!   umbrella:
//!     global: https://api.umbrella.com
//!   ```
//!
//! - The **preferences** document (`preferences.yml` by default) declares
//!   which secrets to load and from where; see [`crate::secrets`].
//!
//! Both are loaded eagerly at construction. Any failure is a
//! [`CscError::Config`] and aborts the whole client.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{CscError, Result};
use crate::secrets::SecretDeclaration;

/// Default location of the endpoint URL map, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";

/// Default location of the preferences document.
pub const DEFAULT_PREFERENCES_PATH: &str = "preferences.yml";

/// Reads a YAML file into an untyped mapping.
///
/// Fails if the file does not exist, cannot be read as UTF-8, or is not
/// valid YAML.
pub fn load_yaml(path: &Path) -> Result<serde_yaml::Value> {
    if !path.exists() {
        return Err(CscError::config(path, "could not locate the file"));
    }
    debug!(path = %path.display(), "loading yaml document");
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CscError::config_with_source(path, "could not read the file; encoding bad?", e)
    })?;
    serde_yaml::from_str(&raw)
        .map_err(|e| CscError::config_with_source(path, "malformed YAML", e))
}

/// Loads a YAML file and maps it onto `T`, reporting shape mismatches
/// (missing keys, wrong types) as config errors against the same path.
fn load_typed<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let value = load_yaml(path)?;
    serde_yaml::from_value(value)
        .map_err(|e| CscError::config_with_source(path, "unexpected document shape", e))
}

// ── Regions ────────────────────────────────────────────────────────────

/// Geographic deployment of the Cisco APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// North America. Also the fallback for unrecognized codes.
    #[default]
    Nam,
    /// Europe, Middle East and Africa.
    Emea,
    /// Asia Pacific, Japan and China.
    Apjc,
}

impl Region {
    /// Looks up a region code, returning `None` for anything unrecognized.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "nam" => Some(Region::Nam),
            "emea" => Some(Region::Emea),
            "apjc" => Some(Region::Apjc),
            _ => None,
        }
    }

    /// Looks up a region code, falling back to [`Region::Nam`] when the code
    /// is not recognized. The fallback is logged at `warn` so a typo in the
    /// region does not silently send traffic to North America.
    pub fn from_code_or_nam(code: &str) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            warn!(region = code, "unrecognized region code, falling back to nam");
            Region::Nam
        })
    }

    /// The lowercase code used as a key in the endpoint config.
    pub fn code(self) -> &'static str {
        match self {
            Region::Nam => "nam",
            Region::Emea => "emea",
            Region::Apjc => "apjc",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ── Endpoint config ────────────────────────────────────────────────────

/// Base URLs for a service deployed in every region.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionalUrls {
    /// North America.
    pub nam: String,
    /// Europe, Middle East and Africa.
    pub emea: String,
    /// Asia Pacific, Japan and China.
    pub apjc: String,
}

impl RegionalUrls {
    /// The URL configured for `region`, as written in the document.
    pub fn get(&self, region: Region) -> &str {
        match region {
            Region::Nam => &self.nam,
            Region::Emea => &self.emea,
            Region::Apjc => &self.apjc,
        }
    }
}

/// Base URL for a service with a single global deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalUrl {
    /// The single base URL.
    pub global: String,
}

/// The static endpoint-URL map. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Secure Endpoint v3 base URLs (e.g. `https://api.amp.cisco.com/v3`).
    pub amp: RegionalUrls,
    /// SecureX / XDR auth base URLs.
    pub securex: RegionalUrls,
    /// Umbrella API base URL.
    pub umbrella: GlobalUrl,
}

/// The pair of base URLs a region resolves to. Neither carries a trailing
/// slash, so request paths can be appended directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionUrls {
    /// SecureX base, e.g. `https://visibility.amp.cisco.com`.
    pub securex: String,
    /// Secure Endpoint v3 base, e.g. `https://api.amp.cisco.com/v3`.
    pub v3: String,
}

fn base_url(raw: &str) -> &str {
    raw.trim_end_matches('/')
}

impl EndpointConfig {
    /// Loads the endpoint URL map from `path`.
    ///
    /// # Errors
    ///
    /// - `CscError::Config` — the file is missing, is not valid YAML, or
    ///   lacks one of the `amp`, `securex` or `umbrella` sections.
    pub fn load(path: &Path) -> Result<Self> {
        load_typed(path)
    }

    /// Selects the SecureX and Secure Endpoint v3 URLs for `region`.
    pub fn urls_for(&self, region: Region) -> RegionUrls {
        RegionUrls {
            securex: base_url(self.securex.get(region)).to_string(),
            v3: base_url(self.amp.get(region)).to_string(),
        }
    }

    /// The Umbrella base URL without a trailing slash.
    pub fn umbrella_url(&self) -> &str {
        base_url(&self.umbrella.global)
    }
}

// ── Preferences ────────────────────────────────────────────────────────

/// The user preferences document: which secrets to load and from where.
#[derive(Debug, Clone, Deserialize)]
pub struct Preferences {
    /// Declarations in document order.
    pub credentials: Vec<SecretDeclaration>,
}

impl Preferences {
    /// Loads the preferences document from `path`.
    ///
    /// # Errors
    ///
    /// - `CscError::Config` — the file is missing, is not valid YAML, or a
    ///   declaration is missing a key or names an unknown `load-from`.
    pub fn load(path: &Path) -> Result<Self> {
        load_typed(path)
    }
}

// ── Client settings ────────────────────────────────────────────────────

/// Where to find the two YAML documents and which region to target.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Raw region code; resolved through [`Region::from_code_or_nam`].
    pub region: String,
    /// Endpoint URL map, see [`EndpointConfig`].
    pub config_path: PathBuf,
    /// Secret declarations, see [`Preferences`].
    pub preferences_path: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            region: Region::Nam.code().to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            preferences_path: PathBuf::from(DEFAULT_PREFERENCES_PATH),
        }
    }
}

impl ClientSettings {
    /// The parsed region, falling back to `nam` with a warning.
    pub fn region(&self) -> Region {
        Region::from_code_or_nam(&self.region)
    }
}
