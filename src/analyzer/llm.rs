//! LLM text-completion client contract (spec §4.7, §6 "LLM text-completion").
//!
//! Prompt content itself is out of scope; only the request/response
//! contract is implemented here. Callers pass deterministic, fully-formed
//! prompts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Injected dependency (spec §9 "Ambient-singleton clients -> explicit
/// injection"): analyzer, store writer, and resolver refresher all take
/// this as a constructor argument rather than reaching for a global.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, String>;
}

pub struct OpenAiLikeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiLikeClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiLikeClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage { role: "user", content: prompt.to_string() }],
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| "no choices in LLM response".to_string())
    }
}

/// Strip a leading/trailing pair of straight or curly quotes, a common LLM
/// title-completion artifact (spec §4.7 "Title generation").
pub fn strip_surrounding_quotes(text: &str) -> String {
    let trimmed = text.trim();
    let quote_pairs = [('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}')];
    for (open, close) in quote_pairs {
        if trimmed.starts_with(open) && trimmed.ends_with(close) && trimmed.len() >= 2 {
            return trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()].to_string();
        }
    }
    trimmed.to_string()
}
