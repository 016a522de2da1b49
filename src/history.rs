//! Optimization history
//!
//! A bounded, newest-first log of past requests persisted as JSON.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use anyhow::{Result, Context};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum number of entries kept
pub const MAX_HISTORY_LEN: usize = 20;

/// Preview length in characters
pub const PREVIEW_CHARS: usize = 80;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// One past optimize request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    /// Unix seconds
    pub timestamp: i64,
    pub category: String,
    pub style: String,
    pub original_preview: String,
    pub optimized_preview: String,
}

impl HistoryItem {
    /// Create an entry stamped now, with previews cut from the full texts
    pub fn new(category: &str, style: &str, original: &str, optimized: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            category: category.to_string(),
            style: style.to_string(),
            original_preview: preview(original),
            optimized_preview: preview(optimized),
        }
    }

    /// Local time formatted for display
    pub fn formatted_time(&self) -> String {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
            .map(|utc| utc.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Single-line preview, truncated with an ellipsis
pub fn preview(text: &str) -> String {
    let flat = WHITESPACE.replace_all(text.trim(), " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let mut cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        cut.push('…');
        cut
    } else {
        flat.into_owned()
    }
}

/// History manager backed by a JSON file
pub struct HistoryManager {
    entries: Vec<HistoryItem>,
    max_size: usize,
    history_path: PathBuf,
}

impl HistoryManager {
    /// Load history from `history_path`; unreadable content starts empty
    pub fn open(history_path: PathBuf, max_size: usize) -> Result<Self> {
        let entries = if history_path.exists() {
            let data = fs::read_to_string(&history_path)
                .context("Failed to read history file")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries,
            max_size,
            history_path,
        })
    }

    /// Add an entry at the front and trim to the maximum size
    pub fn add(&mut self, entry: HistoryItem) -> Result<()> {
        self.entries.insert(0, entry);
        self.entries.truncate(self.max_size);
        self.save()
    }

    pub fn get_all(&self) -> &[HistoryItem] {
        &self.entries
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize history")?;
        fs::write(&self.history_path, data)
            .context("Failed to write history file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_by_chars() {
        let long = "é".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));

        assert_eq!(preview("  short\n\ntext  "), "short text");
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut manager = HistoryManager::open(path.clone(), 3).unwrap();

        for i in 0..5 {
            manager.add(HistoryItem::new("Email", "Formal", &format!("in {i}"), "out")).unwrap();
        }

        let reopened = HistoryManager::open(path, 3).unwrap();
        let originals: Vec<_> = reopened.get_all().iter().map(|e| e.original_preview.as_str()).collect();
        assert_eq!(originals, vec!["in 4", "in 3", "in 2"]);
    }

    #[test]
    fn test_clear_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut manager = HistoryManager::open(path.clone(), MAX_HISTORY_LEN).unwrap();
        manager.add(HistoryItem::new("SEO", "Concise", "a", "b")).unwrap();
        manager.clear().unwrap();

        assert!(HistoryManager::open(path, MAX_HISTORY_LEN).unwrap().get_all().is_empty());
    }
}
