//! Secret declarations and backend resolution.
//!
//! Each entry in the preferences document names a credential pair and the
//! backend that holds it. Only the 1Password CLI backend is implemented;
//! the AWS Secrets Manager and Azure Key Vault backends are declared so that
//! preferences can name them, but resolving one yields
//! [`SecretResolution::Unsupported`] rather than an error or an empty pair.
//!
//! The CLI invocation is behind the [`SecretReader`] trait. Production code
//! uses [`OnePasswordCli`]; tests substitute an in-memory reader.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{CscError, Result};

/// Where a declared secret is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SecretBackend {
    /// The 1Password CLI (`op read`).
    #[serde(rename = "1password", alias = "onepassword")]
    OnePassword,
    /// AWS Secrets Manager. Not implemented.
    #[serde(rename = "aws-secrets-manager", alias = "asm")]
    AwsSecretsManager,
    /// Azure Key Vault. Not implemented.
    #[serde(rename = "azure-key-vault", alias = "akv")]
    AzureKeyVault,
}

impl fmt::Display for SecretBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SecretBackend::OnePassword => "1password",
            SecretBackend::AwsSecretsManager => "aws-secrets-manager",
            SecretBackend::AzureKeyVault => "azure-key-vault",
        })
    }
}

/// One `credentials:` entry from the preferences document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecretDeclaration {
    /// Key the resolved pair is stored under (`amp`, `securex`, `umbrella`).
    pub name: String,
    /// Backend holding the pair.
    pub load_from: SecretBackend,
    /// Base reference inside the backend, e.g. `op://Security/amp-api`.
    pub credentials_path: String,
    /// Field under `credentials_path` holding the client ID.
    pub id_key_name: String,
    /// Field under `credentials_path` holding the secret.
    pub secret_key_name: String,
}

impl SecretDeclaration {
    fn reference(&self, key: &str) -> String {
        format!("{}/{}", self.credentials_path.trim_end_matches('/'), key)
    }
}

/// A client ID and its secret. The secret is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    /// Client ID, sent as the Basic-auth username.
    pub client_id: String,
    /// Client secret, sent as the Basic-auth password.
    pub secret_key: String,
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("client_id", &self.client_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Outcome of resolving one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretResolution {
    /// Both fields were read, newlines stripped.
    Resolved(CredentialPair),
    /// The declared backend exists in the vocabulary but has no
    /// implementation. Distinct from "secret missing", which is an error.
    Unsupported(SecretBackend),
}

/// Reads a single secret value by reference.
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// Returns the raw value stored at `reference` (e.g.
    /// `op://Security/amp/username`), trailing newline included.
    ///
    /// # Errors
    ///
    /// - `CscError::SecretBackend` — the backend could not produce the value.
    async fn read(&self, reference: &str) -> Result<String>;
}

/// Reads secrets by shelling out to `op read <reference>`.
///
/// No timeout is applied: `op` may prompt for biometric unlock and the
/// caller blocks until it returns.
#[derive(Debug, Clone)]
pub struct OnePasswordCli {
    program: String,
}

impl OnePasswordCli {
    /// Runs `op` from `PATH`.
    pub fn new() -> Self {
        OnePasswordCli {
            program: "op".to_string(),
        }
    }

    /// Uses a different executable in place of `op` (e.g. a wrapper script).
    pub fn with_program(program: impl Into<String>) -> Self {
        OnePasswordCli {
            program: program.into(),
        }
    }
}

impl Default for OnePasswordCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretReader for OnePasswordCli {
    async fn read(&self, reference: &str) -> Result<String> {
        debug!(reference, "reading secret via 1Password CLI");
        let output = Command::new(&self.program)
            .arg("read")
            .arg(reference)
            .output()
            .await
            .map_err(|e| CscError::SecretBackend {
                message: format!(
                    "could not run `{} read {reference}`; is the 1Password CLI installed?",
                    self.program
                ),
                source: Some(Box::new(e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CscError::SecretBackend {
                message: format!(
                    "`{} read {reference}` failed ({}): {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
                source: None,
            });
        }

        String::from_utf8(output.stdout).map_err(|e| CscError::SecretBackend {
            message: format!("`{} read {reference}` returned non-UTF-8 output", self.program),
            source: Some(Box::new(e)),
        })
    }
}

/// Removes every line break from a CLI value.
fn strip_newlines(raw: &str) -> String {
    raw.lines().collect()
}

/// Resolves one declaration against its backend.
///
/// For 1Password this performs two reads, `<path>/<id-key-name>` and
/// `<path>/<secret-key-name>`, in that order.
///
/// # Errors
///
/// - `CscError::SecretBackend` — either read failed. Declarations naming an
///   unimplemented backend are not errors; they yield
///   [`SecretResolution::Unsupported`].
pub async fn resolve_secret(
    reader: &dyn SecretReader,
    declaration: &SecretDeclaration,
) -> Result<SecretResolution> {
    match declaration.load_from {
        SecretBackend::OnePassword => {
            let client_id = reader
                .read(&declaration.reference(&declaration.id_key_name))
                .await?;
            let secret_key = reader
                .read(&declaration.reference(&declaration.secret_key_name))
                .await?;
            Ok(SecretResolution::Resolved(CredentialPair {
                client_id: strip_newlines(&client_id),
                secret_key: strip_newlines(&secret_key),
            }))
        }
        backend @ (SecretBackend::AwsSecretsManager | SecretBackend::AzureKeyVault) => {
            Ok(SecretResolution::Unsupported(backend))
        }
    }
}
