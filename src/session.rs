//! Session state and its reducer
//!
//! All workflow state lives in [`SessionState`]. It only changes through
//! [`reduce`], which takes the current state and a [`SessionEvent`] and
//! returns the next state, so the optimize/regenerate/copy cycle can be
//! exercised without a backend or a window.

use thiserror::Error;

use crate::backend::{mentions_api_key, BackendError};
use crate::config::AppSettings;
use crate::history::HistoryItem;
use crate::presets::Presets;

/// Maximum input length in characters, after trimming
pub const MAX_INPUT_CHARS: usize = 4000;

/// Regenerate attempts allowed per submitted input
pub const MAX_REGENERATIONS: u8 = 3;

/// Errors returned by controller operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Rejected locally, never sent to the backend
    #[error("{0}")]
    Validation(String),

    /// Regenerate cap reached
    #[error("{0}")]
    Limit(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("A request is already in progress.")]
    Busy,

    #[error("Presets and API key must be ready before optimizing.")]
    NotReady,
}

/// Where the optimize/regenerate cycle stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// What a submission was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKind {
    Optimize,
    Regenerate,
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Editable text buffer; holds the result after a successful optimize
    pub text: String,
    /// Trimmed input of the last submission, reused by regenerate
    pub last_input: String,
    pub has_result: bool,
    pub regen_count: u8,
    pub copied: bool,
    pub is_api_key_ready: bool,
    pub phase: Phase,
    /// A submission is waiting on the backend
    pub in_flight: bool,
    pub error: Option<String>,

    pub presets: Option<Presets>,
    pub category: String,
    pub style: String,
    pub extra_instructions: String,
    /// Key entry field shown while the key is not ready
    pub api_key_input: String,

    /// Editable copy of the backend settings
    pub settings: Option<AppSettings>,
    pub settings_saved: bool,
    pub history: Vec<HistoryItem>,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Presets loaded and key confirmed
    pub fn is_ready(&self) -> bool {
        self.presets.is_some() && self.is_api_key_ready
    }

    pub fn can_submit(&self) -> bool {
        self.is_ready() && !self.is_loading()
    }

    pub fn can_regenerate(&self) -> bool {
        self.can_submit() && self.has_result && self.regen_count < MAX_REGENERATIONS
    }

    pub fn regenerations_left(&self) -> u8 {
        MAX_REGENERATIONS.saturating_sub(self.regen_count)
    }
}

/// State transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    TextEdited(String),
    /// Empties the buffer and any error
    TextCleared,
    CategorySelected(String),
    StyleSelected(String),
    ExtraInstructionsEdited(String),
    ApiKeyInputEdited(String),

    /// Rejected before reaching the backend
    Rejected(String),
    SubmitStarted { input: String },
    SubmitSucceeded { kind: SubmitKind, text: String },
    SubmitFailed(String),
    /// A non-submit backend command failed
    BackendFailed(String),

    PresetsLoaded(Presets),
    ApiKeyStateLoaded(bool),
    ApiKeySaved,
    /// A fetch failed; the UI stays usable but degraded. `advisory` replaces
    /// the error line when set, `cause` is the backend message.
    LoadFailed { advisory: Option<String>, cause: String },

    Copied,
    CopyExpired,

    SettingsLoaded(AppSettings),
    SettingsEdited(AppSettings),
    SettingsSaved(AppSettings),

    HistoryLoaded(Vec<HistoryItem>),
    HistoryCleared,
}

/// Produce the next state
pub fn reduce(state: SessionState, event: SessionEvent) -> SessionState {
    let mut next = state;
    match event {
        SessionEvent::TextEdited(text) => {
            if text != next.text {
                next.text = text;
                next.has_result = false;
                next.regen_count = 0;
                next.copied = false;
                next.phase = Phase::Idle;
            }
        }
        SessionEvent::TextCleared => {
            next = reduce(next, SessionEvent::TextEdited(String::new()));
            next.error = None;
        }
        SessionEvent::CategorySelected(category) => next.category = category,
        SessionEvent::StyleSelected(style) => next.style = style,
        SessionEvent::ExtraInstructionsEdited(extra) => next.extra_instructions = extra,
        SessionEvent::ApiKeyInputEdited(input) => next.api_key_input = input,

        SessionEvent::Rejected(message) => next.error = Some(message),
        SessionEvent::SubmitStarted { input } => {
            next.phase = Phase::Submitting;
            next.in_flight = true;
            next.error = None;
            next.last_input = input;
        }
        // The buffer was edited while waiting; the user's text wins
        SessionEvent::SubmitSucceeded { .. } if next.phase != Phase::Submitting => {
            next.in_flight = false;
        }
        SessionEvent::SubmitSucceeded { kind, text } => {
            next.in_flight = false;
            next.phase = Phase::Succeeded;
            next.text = text;
            next.has_result = true;
            next.copied = false;
            next.regen_count = match kind {
                SubmitKind::Optimize => 0,
                SubmitKind::Regenerate => (next.regen_count + 1).min(MAX_REGENERATIONS),
            };
        }
        SessionEvent::SubmitFailed(message) => {
            next.in_flight = false;
            if next.phase == Phase::Submitting {
                next.phase = Phase::Failed;
            }
            next = reduce(next, SessionEvent::BackendFailed(message));
        }
        SessionEvent::BackendFailed(message) => {
            if mentions_api_key(&message) {
                next.is_api_key_ready = false;
            }
            next.error = Some(message);
        }

        SessionEvent::PresetsLoaded(presets) => {
            if !presets.categories.contains(&next.category) {
                next.category = presets.default_category().unwrap_or_default().to_string();
            }
            if !presets.styles.contains(&next.style) {
                next.style = presets.default_style().unwrap_or_default().to_string();
            }
            next.presets = Some(presets);
        }
        SessionEvent::ApiKeyStateLoaded(ready) => next.is_api_key_ready = ready,
        SessionEvent::ApiKeySaved => {
            next.is_api_key_ready = true;
            next.api_key_input.clear();
            next.error = None;
        }
        SessionEvent::LoadFailed { advisory, cause } => {
            if mentions_api_key(&cause) {
                next.is_api_key_ready = false;
            }
            if advisory.is_some() {
                next.error = advisory;
            }
        }

        SessionEvent::Copied => next.copied = true,
        SessionEvent::CopyExpired => next.copied = false,

        SessionEvent::SettingsLoaded(settings) => {
            next.settings = Some(settings);
            next.settings_saved = false;
        }
        SessionEvent::SettingsEdited(settings) => {
            next.settings = Some(settings);
            next.settings_saved = false;
        }
        SessionEvent::SettingsSaved(settings) => {
            next.settings = Some(settings);
            next.settings_saved = true;
        }

        SessionEvent::HistoryLoaded(items) => next.history = items,
        SessionEvent::HistoryCleared => next.history.clear(),
    }
    next
}

/// Trim and check submitted text
pub fn validate_input(text: &str) -> Result<String, SessionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SessionError::Validation("Enter some text to optimize.".into()));
    }
    if trimmed.chars().count() > MAX_INPUT_CHARS {
        return Err(SessionError::Validation(format!(
            "Input too long. Limit is {} characters.",
            MAX_INPUT_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim and check an API key entry
pub fn validate_api_key(key: &str) -> Result<String, SessionError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(SessionError::Validation("Enter an API key.".into()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: impl IntoIterator<Item = SessionEvent>) -> SessionState {
        events.into_iter().fold(SessionState::default(), reduce)
    }

    fn succeeded(kind: SubmitKind, text: &str) -> [SessionEvent; 2] {
        [
            SessionEvent::SubmitStarted { input: "in".into() },
            SessionEvent::SubmitSucceeded { kind, text: text.into() },
        ]
    }

    #[test]
    fn test_presets_select_first_entries() {
        let state = run([SessionEvent::PresetsLoaded(Presets {
            categories: vec!["A".into(), "B".into()],
            styles: vec!["X".into(), "Y".into()],
        })]);
        assert_eq!(state.category, "A");
        assert_eq!(state.style, "X");
    }

    #[test]
    fn test_presets_keep_valid_selection() {
        let state = run([
            SessionEvent::CategorySelected("B".into()),
            SessionEvent::StyleSelected("gone".into()),
            SessionEvent::PresetsLoaded(Presets {
                categories: vec!["A".into(), "B".into()],
                styles: vec!["X".into()],
            }),
        ]);
        assert_eq!(state.category, "B");
        assert_eq!(state.style, "X");
    }

    #[test]
    fn test_optimize_resets_and_regenerate_increments() {
        let mut state = run(succeeded(SubmitKind::Regenerate, "r1"));
        assert_eq!(state.regen_count, 1);

        for event in succeeded(SubmitKind::Optimize, "fresh") {
            state = reduce(state, event);
        }
        assert_eq!(state.regen_count, 0);
        assert!(state.has_result);
        assert_eq!(state.text, "fresh");
        assert_eq!(state.phase, Phase::Succeeded);
    }

    #[test]
    fn test_regen_count_never_exceeds_cap() {
        let mut state = SessionState::default();
        for _ in 0..5 {
            for event in succeeded(SubmitKind::Regenerate, "again") {
                state = reduce(state, event);
            }
        }
        assert_eq!(state.regen_count, MAX_REGENERATIONS);
    }

    #[test]
    fn test_editing_result_resets_cycle() {
        let mut state = run(succeeded(SubmitKind::Regenerate, "result"));
        state = reduce(state, SessionEvent::Copied);

        state = reduce(state, SessionEvent::TextEdited("result!".into()));
        assert!(!state.has_result);
        assert_eq!(state.regen_count, 0);
        assert!(!state.copied);
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn test_api_key_failure_clears_readiness() {
        let state = run([
            SessionEvent::ApiKeyStateLoaded(true),
            SessionEvent::SubmitStarted { input: "x".into() },
            SessionEvent::SubmitFailed("API error 401: Incorrect API KEY provided".into()),
        ]);
        assert!(!state.is_api_key_ready);
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.error.as_deref(), Some("API error 401: Incorrect API KEY provided"));

        let state = run([
            SessionEvent::ApiKeyStateLoaded(true),
            SessionEvent::BackendFailed("timeout".into()),
        ]);
        assert!(state.is_api_key_ready);
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn test_edit_during_submission_keeps_user_text() {
        let state = run([
            SessionEvent::SubmitStarted { input: "draft".into() },
            SessionEvent::TextEdited("my rewrite".into()),
        ]);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.is_loading());

        let state = reduce(
            state,
            SessionEvent::SubmitSucceeded { kind: SubmitKind::Optimize, text: "late".into() },
        );
        assert_eq!(state.text, "my rewrite");
        assert!(!state.has_result);
        assert!(!state.is_loading());
        assert_eq!(state.phase, Phase::Idle);

        let state = run([
            SessionEvent::ApiKeyStateLoaded(true),
            SessionEvent::SubmitStarted { input: "draft".into() },
            SessionEvent::TextEdited("edited".into()),
            SessionEvent::SubmitFailed("Invalid API key".into()),
        ]);
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.is_loading());
        assert!(!state.is_api_key_ready);
    }

    #[test]
    fn test_load_failure_with_key_problem_clears_readiness() {
        let state = run([
            SessionEvent::ApiKeyStateLoaded(true),
            SessionEvent::LoadFailed {
                advisory: Some("Failed to load presets".into()),
                cause: "Invalid API Key for preset service".into(),
            },
        ]);
        assert!(!state.is_api_key_ready);
        assert_eq!(state.error.as_deref(), Some("Failed to load presets"));

        let state = run([
            SessionEvent::ApiKeyStateLoaded(true),
            SessionEvent::Rejected("earlier".into()),
            SessionEvent::LoadFailed { advisory: None, cause: "disk full".into() },
        ]);
        assert!(state.is_api_key_ready);
        assert_eq!(state.error.as_deref(), Some("earlier"));
    }

    #[test]
    fn test_submit_clears_previous_error() {
        let state = run([
            SessionEvent::Rejected("Enter some text to optimize.".into()),
            SessionEvent::SubmitStarted { input: "hello".into() },
        ]);
        assert_eq!(state.error, None);
        assert!(state.is_loading());
        assert_eq!(state.last_input, "hello");
    }

    #[test]
    fn test_validate_input() {
        assert!(matches!(validate_input(" \n\t "), Err(SessionError::Validation(_))));
        assert!(matches!(
            validate_input(&"a".repeat(MAX_INPUT_CHARS + 1)),
            Err(SessionError::Validation(_))
        ));
        let padded = format!("  {}  ", "ü".repeat(MAX_INPUT_CHARS));
        assert_eq!(validate_input(&padded).unwrap().chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn test_api_key_saved_clears_input() {
        let state = run([
            SessionEvent::ApiKeyInputEdited("sk-123".into()),
            SessionEvent::ApiKeySaved,
        ]);
        assert!(state.is_api_key_ready);
        assert!(state.api_key_input.is_empty());
    }
}
