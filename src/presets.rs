//! Category and style presets
//!
//! The first entry of each list is the default selection.

use std::fs;
use std::path::Path;
use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};

/// Ordered category and style choices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presets {
    pub categories: Vec<String>,
    pub styles: Vec<String>,
}

impl Presets {
    /// Presets bundled with the app
    pub fn builtin() -> Self {
        Self {
            categories: [
                "Email",
                "LinkedIn",
                "SEO",
                "Support",
                "Product description",
                "Resume/CV",
            ]
            .map(String::from)
            .to_vec(),
            styles: ["Formal", "Friendly", "Concise", "Persuasive", "Technical", "Casual"]
                .map(String::from)
                .to_vec(),
        }
    }

    /// Load an override file, falling back to the built-in presets when the
    /// file is absent or has an empty list
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::builtin());
        }

        let data = fs::read_to_string(path)
            .context("Failed to read presets file")?;
        let presets: Presets = serde_json::from_str(&data)
            .context("Failed to parse presets file")?;

        if presets.categories.is_empty() || presets.styles.is_empty() {
            return Ok(Self::builtin());
        }
        Ok(presets)
    }

    pub fn default_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }

    pub fn default_style(&self) -> Option<&str> {
        self.styles.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let presets = Presets::builtin();
        assert_eq!(presets.default_category(), Some("Email"));
        assert_eq!(presets.default_style(), Some("Formal"));
    }

    #[test]
    fn test_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        fs::write(&path, r#"{"categories":["Tweet"],"styles":["Witty","Dry"]}"#).unwrap();

        let presets = Presets::load_or_builtin(&path).unwrap();
        assert_eq!(presets.categories, vec!["Tweet"]);
        assert_eq!(presets.default_style(), Some("Witty"));
    }

    #[test]
    fn test_empty_override_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        fs::write(&path, r#"{"categories":[],"styles":["Witty"]}"#).unwrap();

        assert_eq!(Presets::load_or_builtin(&path).unwrap(), Presets::builtin());
    }
}
