//! API key storage and resolution

use std::fs;
use std::path::PathBuf;
use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};

use crate::config::{EnvConfig, ProviderMode};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Secrets {
    #[serde(default)]
    api_key: Option<String>,
}

/// Stored API key, kept in its own file with owner-only permissions
pub struct SecretStore {
    path: PathBuf,
}

impl SecretStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the stored key, if any
    pub fn api_key(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path)
            .context("Failed to read secrets file")?;
        let secrets: Secrets = serde_json::from_str(&data).unwrap_or_default();
        Ok(secrets
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()))
    }

    /// Persist a new key, replacing the previous one
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let secrets = Secrets {
            api_key: Some(key.trim().to_string()),
        };
        let data = serde_json::to_string_pretty(&secrets)
            .context("Failed to serialize secrets")?;
        fs::write(&self.path, data)
            .context("Failed to write secrets file")?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .context("Failed to restrict secrets file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

/// Resolve the key for `mode`. The error text is shown to the user as is.
pub fn resolve_api_key(
    mode: ProviderMode,
    env: &EnvConfig,
    store: &SecretStore,
) -> std::result::Result<String, String> {
    let stored = || store.api_key().map_err(|e| format!("{:#}", e));

    match mode {
        ProviderMode::Env => match env.api_key.clone() {
            Some(key) => Ok(key),
            None => stored()?.ok_or_else(|| {
                "API key not set. In dev, set CONTENTIZER_API_KEY in your environment.".to_string()
            }),
        },
        ProviderMode::Keychain => stored()?.ok_or_else(|| {
            "API key not found. Save an API key in the app first.".to_string()
        }),
    }
}
