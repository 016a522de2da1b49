//! Backend command interface
//!
//! Every operation the session controller needs from the outside world.
//! Implementations may be slow and may fail; failures carry a message that
//! is shown to the user verbatim.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AppSettings;
use crate::history::HistoryItem;
use crate::presets::Presets;

/// Failure of a backend command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// Whether the message points at a missing or invalid credential
    pub fn is_api_key_problem(&self) -> bool {
        mentions_api_key(&self.message)
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

/// Case-insensitive check for "api key" in an error message
pub fn mentions_api_key(message: &str) -> bool {
    message.to_lowercase().contains("api key")
}

/// One rewrite request, built fresh for each submit or regenerate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationRequest {
    pub category: String,
    pub style: String,
    pub extra_instructions: String,
    pub text: String,
}

/// The command surface behind the controller
#[async_trait]
pub trait Backend: Send + Sync {
    /// Rewrite `request.text`, returning the new text
    async fn optimize_text(&self, request: &OptimizationRequest) -> Result<String, BackendError>;

    async fn get_presets(&self) -> Result<Presets, BackendError>;

    async fn has_api_key(&self) -> Result<bool, BackendError>;

    async fn set_api_key(&self, key: &str) -> Result<(), BackendError>;

    async fn get_settings(&self) -> Result<AppSettings, BackendError>;

    /// Persist settings, returning what was stored
    async fn set_settings(&self, settings: AppSettings) -> Result<AppSettings, BackendError>;

    async fn get_history(&self) -> Result<Vec<HistoryItem>, BackendError>;

    async fn clear_history(&self) -> Result<(), BackendError>;
}
