// ABOUTME: OpenAI-compatible backend: a moderation check, then one chat completion.
// ABOUTME: Speaks the /moderations and /chat/completions endpoints over reqwest.

use crate::completion::{AiError, Completion};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// System prompt used when none is configured.
pub const DEFAULT_PROMPT: &str = "This is a conversation with an AI assistant. The assistant is helpful, creative, clever, and very friendly. You are in a Matrix channel. The audience for this conversation is mostly technical.";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 100;

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// An empty prompt keeps the default.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.trim().is_empty() {
            self.system_prompt = prompt;
        }
        self
    }
}

// Custom Debug impl to redact the API key
impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: BTreeMap<String, bool>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Fail with [`AiError::Flagged`] when any moderation result is flagged.
    pub async fn moderate(&self, input: &str) -> Result<(), AiError> {
        let resp: ModerationResponse = self
            .post_json("/moderations", &ModerationRequest { input })
            .await?;

        let mut categories = Vec::new();
        let mut flagged = false;
        for result in resp.results.into_iter().filter(|r| r.flagged) {
            flagged = true;
            categories.extend(
                result
                    .categories
                    .into_iter()
                    .filter_map(|(name, hit)| hit.then_some(name)),
            );
        }

        if flagged {
            tracing::warn!(categories = ?categories, "Moderation flagged input");
            return Err(AiError::Flagged { categories });
        }
        Ok(())
    }

    /// One chat completion with the configured system prompt, no moderation.
    pub async fn chat(&self, input: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
        };

        let resp: ChatResponse = self.post_json("/chat/completions", &request).await?;
        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AiError::EmptyResponse)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, AiError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!(url = %url, model = %self.config.model, "OpenAI request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "OpenAI API error");
            return Err(AiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Completion for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn prompt(&self, input: &str) -> Result<String, AiError> {
        tracing::debug!(
            prompt_len = input.len(),
            model = %self.config.model,
            "Prompting"
        );
        self.moderate(input).await?;
        self.chat(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::new("sk-test");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.max_tokens, 100);
        assert_eq!(config.system_prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_empty_prompt_keeps_default() {
        let config = OpenAiConfig::new("sk-test").with_prompt("   ");
        assert_eq!(config.system_prompt, DEFAULT_PROMPT);

        let config = OpenAiConfig::new("sk-test").with_prompt("Be terse.");
        assert_eq!(config.system_prompt, "Be terse.");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = OpenAiConfig::new("sk-test").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = OpenAiClient::new(OpenAiConfig::new("sk-very-secret"));
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            max_tokens: 100,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["max_tokens"], 100);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
    }
}
