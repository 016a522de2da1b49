//! Completion client
//!
//! `LlmClient` is the seam between the local backend and a text-generation
//! provider. `OpenAiClient` speaks the OpenAI-compatible chat completions API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 4096;

/// Prompt pair sent to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
}

/// Result of a single non-streaming completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// A text-generation provider
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult, LlmError>;
}

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.into()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: request.system_prompt },
                ChatMessage { role: "user", content: request.user_message },
            ],
            max_tokens: MAX_TOKENS,
        };

        debug!("POST {} (model {})", url, self.model);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(CompletionResult { text })
    }
}

/// System prompt for the copy editor
pub fn build_system_prompt(
    global_prompt: Option<&str>,
    language: Option<&str>,
    output_max_chars: Option<usize>,
) -> String {
    let mut parts = vec![
        "You are a professional copy editor.".to_string(),
        "Improve the user's text according to the selected category and style.".to_string(),
        "Return ONLY the improved text. Do not add explanations, preamble, or markdown unless the input already uses markdown.".to_string(),
    ];

    if let Some(lang) = language.map(str::trim).filter(|l| !l.is_empty()) {
        parts.push(format!("Write the output in {}.", lang));
    }

    if let Some(max_chars) = output_max_chars {
        parts.push(format!("Keep the output concise and under {} characters.", max_chars));
    }

    if let Some(extra) = global_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        parts.push(format!("Global instructions: {}", extra));
    }

    parts.join("\n")
}

/// User message carrying the preset, extra instructions and the text itself
pub fn build_user_message(category: &str, style: &str, extra_instructions: &str, original_text: &str) -> String {
    let mut parts = vec![format!("Category: {}", category), format!("Style: {}", style)];
    if !extra_instructions.trim().is_empty() {
        parts.push(format!("Extra instructions: {}", extra_instructions.trim()));
    }
    parts.push("---".into());
    parts.push("Original text to optimize:".into());
    parts.push(original_text.trim().to_string());
    parts.join("\n\n")
}
