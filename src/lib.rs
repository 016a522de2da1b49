//! Contentizer - Text Optimizer
//!
//! Rewrites text for a chosen category and style through an
//! OpenAI-compatible API. The [`SessionController`] drives the
//! optimize/regenerate/copy workflow against any [`Backend`];
//! [`LocalBackend`] is the in-process implementation.

pub mod backend;
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod dashboard;
pub mod history;
pub mod llm;
pub mod local;
pub mod presets;
pub mod quota;
pub mod session;

pub use backend::{Backend, BackendError, OptimizationRequest};
pub use clipboard::{Clipboard, SystemClipboard};
pub use config::{AppSettings, ProviderMode};
pub use controller::SessionController;
pub use history::HistoryItem;
pub use local::LocalBackend;
pub use presets::Presets;
pub use session::{SessionError, SessionState};
