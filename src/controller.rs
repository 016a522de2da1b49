//! Session controller
//!
//! Sequences backend calls in response to user actions and feeds every
//! outcome through [`reduce`]. Operations take `&self` so the controller can
//! be shared between the UI thread and spawned tasks; the state mutex is
//! never held across an await.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, OptimizationRequest};
use crate::clipboard::Clipboard;
use crate::config::AppSettings;
use crate::session::{
    reduce, validate_api_key, validate_input, SessionError, SessionEvent, SessionState,
    SubmitKind, MAX_REGENERATIONS,
};

/// How long the "copied" indicator stays on
pub const COPY_FEEDBACK: Duration = Duration::from_secs(2);

type SharedState = Arc<Mutex<SessionState>>;

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn apply(state: &mut SessionState, event: SessionEvent) {
    *state = reduce(std::mem::take(state), event);
}

/// Pending reset of the "copied" flag. Dropping it cancels the reset.
struct CopyFeedbackTimer {
    handle: JoinHandle<()>,
}

impl CopyFeedbackTimer {
    fn start(runtime: &Handle, state: SharedState, window: Duration) -> Self {
        let handle = runtime.spawn(async move {
            tokio::time::sleep(window).await;
            apply(&mut lock(&state), SessionEvent::CopyExpired);
        });
        Self { handle }
    }
}

impl Drop for CopyFeedbackTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Owns the session state and talks to the backend
pub struct SessionController {
    backend: Arc<dyn Backend>,
    clipboard: Arc<dyn Clipboard>,
    state: SharedState,
    copy_timer: Mutex<Option<CopyFeedbackTimer>>,
    runtime: Handle,
    copy_feedback: Duration,
}

impl SessionController {
    pub fn new(backend: Arc<dyn Backend>, clipboard: Arc<dyn Clipboard>, runtime: Handle) -> Self {
        Self {
            backend,
            clipboard,
            state: Arc::new(Mutex::new(SessionState::default())),
            copy_timer: Mutex::new(None),
            runtime,
            copy_feedback: COPY_FEEDBACK,
        }
    }

    /// Copy of the current state for rendering
    pub fn snapshot(&self) -> SessionState {
        lock(&self.state).clone()
    }

    /// Apply a state transition directly
    pub fn dispatch(&self, event: SessionEvent) {
        apply(&mut lock(&self.state), event);
    }

    pub fn edit_text(&self, text: impl Into<String>) {
        self.dispatch(SessionEvent::TextEdited(text.into()));
        if !lock(&self.state).copied {
            self.cancel_copy_feedback();
        }
    }

    pub fn clear_text(&self) {
        self.dispatch(SessionEvent::TextCleared);
        self.cancel_copy_feedback();
    }

    pub fn select_category(&self, category: impl Into<String>) {
        self.dispatch(SessionEvent::CategorySelected(category.into()));
    }

    pub fn select_style(&self, style: impl Into<String>) {
        self.dispatch(SessionEvent::StyleSelected(style.into()));
    }

    pub fn edit_extra_instructions(&self, extra: impl Into<String>) {
        self.dispatch(SessionEvent::ExtraInstructionsEdited(extra.into()));
    }

    pub fn edit_api_key_input(&self, input: impl Into<String>) {
        self.dispatch(SessionEvent::ApiKeyInputEdited(input.into()));
    }

    /// Fetch everything the UI needs at startup. Failures only leave an
    /// advisory error behind.
    pub async fn initialize(&self) {
        let _ = tokio::join!(
            self.load_presets(),
            self.load_api_key_state(),
            self.load_settings(),
            self.load_history(),
        );
    }

    /// Rewrite `text` with the selected preset
    pub async fn optimize(&self, text: &str) -> Result<String, SessionError> {
        self.submit(SubmitKind::Optimize, text).await
    }

    /// Re-run the last submitted input, at most three times per input
    pub async fn regenerate(&self) -> Result<String, SessionError> {
        self.submit(SubmitKind::Regenerate, "").await
    }

    async fn submit(&self, kind: SubmitKind, text: &str) -> Result<String, SessionError> {
        let request = self.begin_submit(kind, text)?;

        match self.backend.optimize_text(&request).await {
            Ok(result) => {
                info!("{:?} succeeded: {} chars", kind, result.chars().count());
                self.cancel_copy_feedback();
                self.dispatch(SessionEvent::SubmitSucceeded { kind, text: result.clone() });
                let _ = self.load_history().await;
                Ok(result)
            }
            Err(err) => {
                warn!("{:?} failed: {}", kind, err);
                self.dispatch(SessionEvent::SubmitFailed(err.message.clone()));
                Err(err.into())
            }
        }
    }

    /// Guard, validate and mark the session as submitting, all under one lock
    fn begin_submit(&self, kind: SubmitKind, text: &str) -> Result<OptimizationRequest, SessionError> {
        let mut state = lock(&self.state);
        if state.is_loading() {
            return Err(SessionError::Busy);
        }

        let input = match kind {
            SubmitKind::Optimize => validate_input(text),
            SubmitKind::Regenerate if state.regen_count >= MAX_REGENERATIONS => Err(SessionError::Limit(
                "Regenerate limit reached. Edit the text to start over.".into(),
            )),
            SubmitKind::Regenerate if !state.has_result || state.last_input.is_empty() => {
                Err(SessionError::Validation("Nothing to regenerate yet.".into()))
            }
            SubmitKind::Regenerate => Ok(state.last_input.clone()),
        };

        let input = match input {
            Ok(input) => input,
            Err(err) => {
                apply(&mut state, SessionEvent::Rejected(err.to_string()));
                return Err(err);
            }
        };

        if !state.is_ready() {
            return Err(SessionError::NotReady);
        }

        let request = OptimizationRequest {
            category: state.category.clone(),
            style: state.style.clone(),
            extra_instructions: state.extra_instructions.clone(),
            text: input.clone(),
        };
        apply(&mut state, SessionEvent::SubmitStarted { input });
        Ok(request)
    }

    /// Put the current text on the clipboard and show feedback for two
    /// seconds. Returns whether anything was copied.
    pub fn copy(&self) -> bool {
        let text = lock(&self.state).text.clone();
        if text.trim().is_empty() {
            return false;
        }

        if let Err(e) = self.clipboard.set_text(&text) {
            debug!("Clipboard unavailable: {:#}", e);
            return false;
        }

        let mut timer = self.copy_timer.lock().unwrap_or_else(|e| e.into_inner());
        timer.take();
        self.dispatch(SessionEvent::Copied);
        *timer = Some(CopyFeedbackTimer::start(
            &self.runtime,
            Arc::clone(&self.state),
            self.copy_feedback,
        ));
        true
    }

    fn cancel_copy_feedback(&self) {
        self.copy_timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    pub async fn save_api_key(&self, key: &str) -> Result<(), SessionError> {
        let key = match validate_api_key(key) {
            Ok(key) => key,
            Err(err) => {
                self.dispatch(SessionEvent::Rejected(err.to_string()));
                return Err(err);
            }
        };

        match self.backend.set_api_key(&key).await {
            Ok(()) => {
                self.dispatch(SessionEvent::ApiKeySaved);
                Ok(())
            }
            Err(err) => {
                self.dispatch(SessionEvent::BackendFailed(err.message.clone()));
                Err(err.into())
            }
        }
    }

    pub async fn load_presets(&self) -> Result<(), SessionError> {
        match self.backend.get_presets().await {
            Ok(presets) => {
                self.dispatch(SessionEvent::PresetsLoaded(presets));
                Ok(())
            }
            Err(err) => {
                warn!("Failed to load presets: {}", err);
                self.load_failed(Some("Failed to load presets"), &err);
                Err(err.into())
            }
        }
    }

    pub async fn load_api_key_state(&self) -> Result<(), SessionError> {
        match self.backend.has_api_key().await {
            Ok(ready) => {
                self.dispatch(SessionEvent::ApiKeyStateLoaded(ready));
                Ok(())
            }
            Err(err) => {
                warn!("Failed to check API key: {}", err);
                self.load_failed(Some("Failed to check API key"), &err);
                Err(err.into())
            }
        }
    }

    pub async fn load_settings(&self) -> Result<(), SessionError> {
        match self.backend.get_settings().await {
            Ok(settings) => {
                self.dispatch(SessionEvent::SettingsLoaded(settings));
                Ok(())
            }
            Err(err) => {
                warn!("Failed to load settings: {}", err);
                self.load_failed(Some("Failed to load settings"), &err);
                Err(err.into())
            }
        }
    }

    pub fn edit_settings(&self, settings: AppSettings) {
        self.dispatch(SessionEvent::SettingsEdited(settings));
    }

    /// Persist the edited settings, then re-check the key since the provider
    /// mode decides where it comes from
    pub async fn save_settings(&self) -> Result<(), SessionError> {
        let draft = lock(&self.state).settings.clone().unwrap_or_default();

        match self.backend.set_settings(draft).await {
            Ok(saved) => {
                self.dispatch(SessionEvent::SettingsSaved(saved));
                self.load_api_key_state().await
            }
            Err(err) => {
                self.dispatch(SessionEvent::BackendFailed(err.message.clone()));
                Err(err.into())
            }
        }
    }

    pub async fn load_history(&self) -> Result<(), SessionError> {
        match self.backend.get_history().await {
            Ok(items) => {
                self.dispatch(SessionEvent::HistoryLoaded(items));
                Ok(())
            }
            Err(err) => {
                debug!("Failed to load history: {}", err);
                self.load_failed(None, &err);
                Err(err.into())
            }
        }
    }

    pub async fn clear_history(&self) -> Result<(), SessionError> {
        match self.backend.clear_history().await {
            Ok(()) => {
                self.dispatch(SessionEvent::HistoryCleared);
                Ok(())
            }
            Err(err) => {
                self.dispatch(SessionEvent::BackendFailed(err.message.clone()));
                Err(err.into())
            }
        }
    }

    fn load_failed(&self, advisory: Option<&str>, err: &BackendError) {
        self.dispatch(SessionEvent::LoadFailed {
            advisory: advisory.map(str::to_string),
            cause: err.message.clone(),
        });
    }

    /// Cancel outstanding timers
    pub fn shutdown(&self) {
        self.cancel_copy_feedback();
    }
}
