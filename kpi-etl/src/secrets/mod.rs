//! Secret store backends for the service-principal secret

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::{SecretBackend, SecretConfig};

/// An opaque secret value. Never logged, never persisted.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value for use in an outbound request
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// Lookup of a secret by (service, principal).
///
/// Returning `Ok(None)` means the store is reachable but holds no entry for
/// the pair.
pub trait SecretStore: Send + Sync {
    fn resolve_secret(&self, service: &str, principal: &str) -> Result<Option<Secret>>;
}

/// Platform credential vault (Windows Credential Manager, macOS Keychain,
/// the Secret Service on Linux)
pub struct KeyringStore;

impl SecretStore for KeyringStore {
    fn resolve_secret(&self, service: &str, principal: &str) -> Result<Option<Secret>> {
        let entry = keyring::Entry::new(service, principal)
            .context("Failed to open keyring entry")?;
        match entry.get_password() {
            Ok(password) => Ok(Some(Secret::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read secret from keyring"),
        }
    }
}

/// Environment variable backend; the variable name is derived from the
/// (service, principal) pair, uppercased with non-alphanumerics mapped to `_`
pub struct EnvStore;

pub(crate) fn env_key(service: &str, principal: &str) -> String {
    let sanitize = |s: &str| {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect::<String>()
    };
    format!("{}_{}", sanitize(service), sanitize(principal))
}

impl SecretStore for EnvStore {
    fn resolve_secret(&self, service: &str, principal: &str) -> Result<Option<Secret>> {
        match std::env::var(env_key(service, principal)) {
            Ok(value) if !value.is_empty() => Ok(Some(Secret::new(value))),
            _ => Ok(None),
        }
    }
}

/// File backend; the trimmed file contents are the secret value
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SecretStore for FileStore {
    fn resolve_secret(&self, _service: &str, _principal: &str) -> Result<Option<Secret>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read secret file: {}", self.path.display()))?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Secret::new(trimmed)))
        }
    }
}

/// Construct the secret store selected by configuration
pub fn from_config(config: &SecretConfig) -> Result<Box<dyn SecretStore>> {
    match config.backend {
        SecretBackend::Keyring => Ok(Box::new(KeyringStore)),
        SecretBackend::Env => Ok(Box::new(EnvStore)),
        SecretBackend::File => {
            let path = config
                .path
                .clone()
                .context("Secret backend 'file' requires a path")?;
            Ok(Box::new(FileStore::new(path)))
        }
    }
}
