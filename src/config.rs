//! Configuration management
//!
//! Handles the on-disk locations, the user-editable provider settings and
//! the environment overrides read at request time.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};

/// Application directory name under the platform config/data dirs
const APP_DIR: &str = "contentizer";

/// Default maximum input length in characters
pub const DEFAULT_INPUT_MAX_CHARS: usize = 4000;

/// Default output budget passed to the model, in characters
pub const DEFAULT_OUTPUT_MAX_CHARS: usize = 1200;

/// Default number of optimize requests allowed per UTC day
pub const DEFAULT_DAILY_QUOTA: u32 = 20;

/// Files looked up in the working directory for global prompt instructions
const GLOBAL_PROMPT_FILES: [&str; 4] = [".prompt", "global.prompt", "prompt.txt", "global_prompt.txt"];

/// Where the API credential is sourced from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// `CONTENTIZER_API_KEY` from the environment (falls back to the stored key)
    #[default]
    Env,
    /// The key saved from the app
    Keychain,
}

impl ProviderMode {
    pub const ALL: [ProviderMode; 2] = [ProviderMode::Env, ProviderMode::Keychain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::Keychain => "keychain",
        }
    }

    /// Human-readable label for selectors
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Env => "Environment variable (dev)",
            Self::Keychain => "Stored key",
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "keychain" => Ok(Self::Keychain),
            _ => Err("Unknown provider mode. Use 'env' or 'keychain'.".to_string()),
        }
    }
}

/// Provider settings owned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// How the API key is sourced
    #[serde(default)]
    pub provider_mode: ProviderMode,

    /// Optional base URL for an OpenAI-compatible API (local or proxy)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Optional model override
    #[serde(default)]
    pub model: Option<String>,
}

impl AppSettings {
    /// Trim the optional fields and turn blank ones into `None`
    pub fn normalized(self) -> Self {
        Self {
            provider_mode: self.provider_mode,
            api_base_url: non_blank(self.api_base_url),
            model: non_blank(self.model),
        }
    }

    /// Load settings from `path`, falling back to defaults when missing or unreadable
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .context("Failed to read settings file")?;
        Ok(serde_json::from_str::<Self>(&data).unwrap_or_default().normalized())
    }

    /// Save settings to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)
            .context("Failed to serialize settings")?;
        fs::write(path, data)
            .context("Failed to write settings file")?;
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// On-disk locations used by the local backend
#[derive(Debug, Clone)]
pub struct Paths {
    /// Settings, secrets and preset overrides
    pub config_dir: PathBuf,
    /// History and quota bookkeeping
    pub data_dir: PathBuf,
}

impl Paths {
    /// Resolve the platform directories, creating them if needed
    pub fn platform() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Failed to find config directory")?
            .join(APP_DIR);
        let data_dir = dirs::data_dir()
            .context("Failed to find data directory")?
            .join(APP_DIR);
        Self::create(config_dir, data_dir)
    }

    /// Keep everything under a single root (used by tests and portable setups)
    pub fn rooted(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        Self::create(root.join("config"), root.join("data"))
    }

    fn create(config_dir: PathBuf, data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;
        fs::create_dir_all(&data_dir)
            .context("Failed to create data directory")?;
        Ok(Self { config_dir, data_dir })
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    pub fn secrets_file(&self) -> PathBuf {
        self.config_dir.join("secrets.json")
    }

    pub fn presets_file(&self) -> PathBuf {
        self.config_dir.join("presets.json")
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    pub fn quota_file(&self) -> PathBuf {
        self.data_dir.join("quota.json")
    }
}

/// Overrides read from `CONTENTIZER_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub input_max_chars: usize,
    pub output_max_chars: usize,
    /// 0 disables the quota
    pub daily_quota: u32,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            language: None,
            input_max_chars: DEFAULT_INPUT_MAX_CHARS,
            output_max_chars: DEFAULT_OUTPUT_MAX_CHARS,
            daily_quota: DEFAULT_DAILY_QUOTA,
        }
    }
}

impl EnvConfig {
    /// Read the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |name: &str| non_blank(lookup(name));
        let number = |name: &str| text(name).and_then(|v| v.parse::<u64>().ok());

        let defaults = Self::default();
        Self {
            api_key: text("CONTENTIZER_API_KEY"),
            model: text("CONTENTIZER_MODEL"),
            language: text("CONTENTIZER_LANGUAGE"),
            input_max_chars: number("CONTENTIZER_INPUT_MAX_CHARS")
                .map(|v| v as usize)
                .unwrap_or(defaults.input_max_chars),
            output_max_chars: number("CONTENTIZER_OUTPUT_MAX_CHARS")
                .map(|v| v as usize)
                .unwrap_or(defaults.output_max_chars),
            daily_quota: number("CONTENTIZER_DAILY_QUOTA")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.daily_quota),
        }
    }
}

/// Read the first non-empty global prompt file found in `dir`
pub fn load_global_prompt(dir: &Path) -> Option<String> {
    GLOBAL_PROMPT_FILES.iter().find_map(|name| {
        fs::read_to_string(dir.join(name))
            .ok()
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_config_defaults_and_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CONTENTIZER_API_KEY", "  sk-test  "),
            ("CONTENTIZER_MODEL", ""),
            ("CONTENTIZER_INPUT_MAX_CHARS", "500"),
            ("CONTENTIZER_DAILY_QUOTA", "not a number"),
        ]
        .into_iter()
        .collect();

        let config = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, None);
        assert_eq!(config.input_max_chars, 500);
        assert_eq!(config.output_max_chars, DEFAULT_OUTPUT_MAX_CHARS);
        assert_eq!(config.daily_quota, DEFAULT_DAILY_QUOTA);
    }

    #[test]
    fn test_settings_round_trip_normalizes_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = AppSettings {
            provider_mode: ProviderMode::Keychain,
            api_base_url: Some("   ".into()),
            model: Some(" gpt-4o ".into()),
        }
        .normalized();
        settings.save(&path).unwrap();

        let loaded = AppSettings::load(&path).unwrap();
        assert_eq!(loaded.provider_mode, ProviderMode::Keychain);
        assert_eq!(loaded.api_base_url, None);
        assert_eq!(loaded.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_settings_missing_file_uses_env_mode() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppSettings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(loaded.provider_mode, ProviderMode::Env);
    }

    #[test]
    fn test_provider_mode_wire_format() {
        let json = serde_json::to_string(&ProviderMode::Keychain).unwrap();
        assert_eq!(json, "\"keychain\"");
        assert_eq!("ENV".parse::<ProviderMode>(), Ok(ProviderMode::Env));
        assert!("vault".parse::<ProviderMode>().is_err());
    }

    #[test]
    fn test_global_prompt_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("prompt.txt"), "third").unwrap();
        fs::write(dir.path().join(".prompt"), "   ").unwrap();
        assert_eq!(load_global_prompt(dir.path()).as_deref(), Some("third"));

        fs::write(dir.path().join("global.prompt"), "second").unwrap();
        assert_eq!(load_global_prompt(dir.path()).as_deref(), Some("second"));
    }
}
