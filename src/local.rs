//! Local command implementation
//!
//! Runs the whole command surface in-process: settings, history, quota and
//! the stored key live in JSON files, and completions go through an
//! `LlmClient`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, OptimizationRequest};
use crate::config::{load_global_prompt, AppSettings, EnvConfig, Paths};
use crate::credentials::{resolve_api_key, SecretStore};
use crate::history::{HistoryItem, HistoryManager, MAX_HISTORY_LEN};
use crate::llm::{build_system_prompt, build_user_message, CompletionRequest, LlmClient, OpenAiClient};
use crate::presets::Presets;
use crate::quota::{DailyQuota, QuotaCheck};

/// File-backed backend talking to an OpenAI-compatible API
pub struct LocalBackend {
    paths: Paths,
    env: EnvConfig,
    /// Directory searched for global prompt files
    prompt_dir: Option<PathBuf>,
    secrets: SecretStore,
    history: Mutex<HistoryManager>,
    quota: Mutex<DailyQuota>,
    /// Replaces the per-request OpenAI client when set
    client: Option<Arc<dyn LlmClient>>,
}

impl LocalBackend {
    pub fn new(paths: Paths, env: EnvConfig) -> Result<Self> {
        let history = HistoryManager::open(paths.history_file(), MAX_HISTORY_LEN)?;
        let quota = DailyQuota::new(paths.quota_file(), env.daily_quota);
        let secrets = SecretStore::new(paths.secrets_file());

        Ok(Self {
            prompt_dir: std::env::current_dir().ok(),
            paths,
            env,
            secrets,
            history: Mutex::new(history),
            quota: Mutex::new(quota),
            client: None,
        })
    }

    /// Platform directories and the process environment
    pub fn from_platform() -> Result<Self> {
        Self::new(Paths::platform()?, EnvConfig::from_env())
    }

    /// Use a fixed completion client instead of building one per request
    pub fn with_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_prompt_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.prompt_dir = dir;
        self
    }

    fn load_settings(&self) -> Result<AppSettings> {
        AppSettings::load(&self.paths.settings_file())
    }

    fn client_for(&self, settings: &AppSettings) -> Result<Arc<dyn LlmClient>, BackendError> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        let api_key = resolve_api_key(settings.provider_mode, &self.env, &self.secrets)?;
        let model = settings.model.clone().or_else(|| self.env.model.clone());
        let client = OpenAiClient::new(api_key, settings.api_base_url.clone(), model);
        debug!("Using model {}", client.model());
        Ok(Arc::new(client))
    }

    fn validate(&self, text: &str) -> Result<(), BackendError> {
        if text.is_empty() {
            return Err(BackendError::new("Enter some text to optimize."));
        }
        if text.chars().count() > self.env.input_max_chars {
            return Err(BackendError::new(format!(
                "Input too long. Limit is {} characters.",
                self.env.input_max_chars
            )));
        }
        Ok(())
    }

    fn consume_quota(&self) -> Result<(), BackendError> {
        let check = self.quota.lock().unwrap_or_else(|e| e.into_inner()).consume()?;
        match check {
            QuotaCheck::Exhausted { limit } => Err(BackendError::new(format!(
                "Daily quota reached ({} requests/day). Try again tomorrow.",
                limit
            ))),
            QuotaCheck::Granted { used } => {
                info!("Quota: {}/{} requests used today", used, self.env.daily_quota);
                Ok(())
            }
            QuotaCheck::Unlimited => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn optimize_text(&self, request: &OptimizationRequest) -> Result<String, BackendError> {
        let text = request.text.trim();
        self.validate(text)?;

        let settings = self.load_settings()?;
        let client = self.client_for(&settings)?;
        self.consume_quota()?;

        let global_prompt = self.prompt_dir.as_deref().and_then(load_global_prompt);
        let completion = CompletionRequest {
            system_prompt: build_system_prompt(
                global_prompt.as_deref(),
                self.env.language.as_deref(),
                Some(self.env.output_max_chars),
            ),
            user_message: build_user_message(
                &request.category,
                &request.style,
                &request.extra_instructions,
                text,
            ),
        };

        info!(
            "Optimizing {} chars ({} / {})",
            text.chars().count(),
            request.category,
            request.style
        );
        let result = client
            .complete(completion)
            .await
            .map_err(|e| BackendError::new(e.to_string()))?;

        let item = HistoryItem::new(&request.category, &request.style, text, &result.text);
        if let Err(e) = self.history.lock().unwrap_or_else(|e| e.into_inner()).add(item) {
            warn!("Failed to record history: {:#}", e);
        }

        Ok(result.text)
    }

    async fn get_presets(&self) -> Result<Presets, BackendError> {
        Ok(Presets::load_or_builtin(&self.paths.presets_file())?)
    }

    async fn has_api_key(&self) -> Result<bool, BackendError> {
        let settings = self.load_settings()?;
        Ok(resolve_api_key(settings.provider_mode, &self.env, &self.secrets).is_ok())
    }

    async fn set_api_key(&self, key: &str) -> Result<(), BackendError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(BackendError::new("Enter an API key."));
        }
        self.secrets.set_api_key(key)?;
        info!("API key saved");
        Ok(())
    }

    async fn get_settings(&self) -> Result<AppSettings, BackendError> {
        Ok(self.load_settings()?)
    }

    async fn set_settings(&self, settings: AppSettings) -> Result<AppSettings, BackendError> {
        let settings = settings.normalized();
        settings.save(&self.paths.settings_file())?;
        info!("Settings saved (provider mode: {})", settings.provider_mode);
        Ok(settings)
    }

    async fn get_history(&self) -> Result<Vec<HistoryItem>, BackendError> {
        Ok(self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_all()
            .to_vec())
    }

    async fn clear_history(&self) -> Result<(), BackendError> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderMode;
    use crate::llm::{CompletionResult, LlmError};

    struct StubClient {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LlmClient for StubClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult, LlmError> {
            self.requests.lock().unwrap().push(request);
            Ok(CompletionResult { text: "Dear team, thanks.".into() })
        }
    }

    fn request(text: &str) -> OptimizationRequest {
        OptimizationRequest {
            category: "Email".into(),
            style: "Formal".into(),
            extra_instructions: "".into(),
            text: text.into(),
        }
    }

    fn backend(dir: &tempfile::TempDir, env: EnvConfig) -> (LocalBackend, Arc<StubClient>) {
        let stub = Arc::new(StubClient { requests: Mutex::new(Vec::new()) });
        let backend = LocalBackend::new(Paths::rooted(dir.path()).unwrap(), env)
            .unwrap()
            .with_prompt_dir(None)
            .with_client(stub.clone());
        (backend, stub)
    }

    #[tokio::test]
    async fn test_optimize_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, stub) = backend(&dir, EnvConfig::default());

        let text = backend.optimize_text(&request("  hey team thx  ")).await.unwrap();
        assert_eq!(text, "Dear team, thanks.");

        let sent = stub.requests.lock().unwrap();
        assert!(sent[0].user_message.ends_with("hey team thx"));

        let history = backend.get_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].original_preview, "hey team thx");
        assert_eq!(history[0].optimized_preview, "Dear team, thanks.");

        backend.clear_history().await.unwrap();
        assert!(backend.get_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_optimize_validates_before_quota() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvConfig { input_max_chars: 5, daily_quota: 1, ..EnvConfig::default() };
        let (backend, stub) = backend(&dir, env);

        let err = backend.optimize_text(&request("   ")).await.unwrap_err();
        assert_eq!(err.message, "Enter some text to optimize.");
        let err = backend.optimize_text(&request("too long")).await.unwrap_err();
        assert_eq!(err.message, "Input too long. Limit is 5 characters.");

        backend.optimize_text(&request("ok")).await.unwrap();
        let err = backend.optimize_text(&request("again")).await.unwrap_err();
        assert!(err.message.starts_with("Daily quota reached (1 requests/day)"));
        assert_eq!(stub.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_api_key_state_follows_provider_mode() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvConfig { api_key: Some("sk-env".into()), ..EnvConfig::default() };
        let backend = LocalBackend::new(Paths::rooted(dir.path()).unwrap(), env).unwrap();

        assert!(backend.has_api_key().await.unwrap());

        let keychain = AppSettings { provider_mode: ProviderMode::Keychain, ..AppSettings::default() };
        backend.set_settings(keychain).await.unwrap();
        assert!(!backend.has_api_key().await.unwrap());

        backend.set_api_key(" sk-stored ").await.unwrap();
        assert!(backend.has_api_key().await.unwrap());
        assert!(backend.set_api_key("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_key_error_mentions_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(Paths::rooted(dir.path()).unwrap(), EnvConfig::default())
            .unwrap()
            .with_prompt_dir(None);

        let err = backend.optimize_text(&request("hello")).await.unwrap_err();
        assert!(err.is_api_key_problem());
    }

    #[tokio::test]
    async fn test_settings_are_normalized_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, _) = backend(&dir, EnvConfig::default());

        let saved = backend
            .set_settings(AppSettings {
                provider_mode: ProviderMode::Env,
                api_base_url: Some(" http://localhost:11434/v1 ".into()),
                model: Some("".into()),
            })
            .await
            .unwrap();
        assert_eq!(saved.api_base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(saved.model, None);
        assert_eq!(backend.get_settings().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_presets_default_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, _) = backend(&dir, EnvConfig::default());
        assert_eq!(backend.get_presets().await.unwrap(), Presets::builtin());
    }
}
