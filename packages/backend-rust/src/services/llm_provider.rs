use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{env_bool, env_string, env_u64};

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "gemma3:4b";
const GROQ_API_ENDPOINT: &str = "https://api.groq.com/openai/v1";
const GROQ_MODEL: &str = "llama-3.1-70b-versatile";
const OPENAI_API_ENDPOINT: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    Groq,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Hosted providers accept `response_format: json_object`.
    pub fn supports_json_mode(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

#[derive(Debug, Clone)]
pub struct ContentProviderConfig {
    pub kind: ProviderKind,
    pub api_endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    /// Set when Ollama was picked only because no hosted key was present.
    pub fallback: bool,
}

impl ContentProviderConfig {
    /// Ollama when `USE_OLLAMA` is not `false`, then Groq, then OpenAI, and
    /// Ollama again when no key is present.
    pub fn from_env() -> Self {
        let timeout =
            Duration::from_millis(env_u64("LLM_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT_MS));
        let ollama = || {
            Self::ollama(
                env_string("OLLAMA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
                env_string("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                timeout,
            )
        };

        select_provider(
            env_bool("USE_OLLAMA").unwrap_or(true),
            env_string("GROQ_API_KEY"),
            env_string("OPENAI_API_KEY"),
            timeout,
            ollama,
        )
    }

    pub fn ollama(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            kind: ProviderKind::Ollama,
            api_endpoint: normalize_endpoint(&base_url.into()),
            api_key: None,
            model: model.into(),
            timeout,
            fallback: false,
        }
    }

    pub fn hosted(kind: ProviderKind, api_key: String, timeout: Duration) -> Self {
        let (api_endpoint, model) = match kind {
            ProviderKind::Groq => (GROQ_API_ENDPOINT, GROQ_MODEL),
            ProviderKind::OpenAi | ProviderKind::Ollama => (OPENAI_API_ENDPOINT, OPENAI_MODEL),
        };
        Self {
            kind,
            api_endpoint: api_endpoint.to_string(),
            api_key: Some(api_key),
            model: model.to_string(),
            timeout,
            fallback: false,
        }
    }
}

fn select_provider(
    use_ollama: bool,
    groq_key: Option<String>,
    openai_key: Option<String>,
    timeout: Duration,
    ollama: impl FnOnce() -> ContentProviderConfig,
) -> ContentProviderConfig {
    if use_ollama {
        return ollama();
    }
    if let Some(key) = groq_key {
        return ContentProviderConfig::hosted(ProviderKind::Groq, key, timeout);
    }
    if let Some(key) = openai_key {
        return ContentProviderConfig::hosted(ProviderKind::OpenAi, key, timeout);
    }
    ContentProviderConfig {
        fallback: true,
        ..ollama()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub json_mode: bool,
}

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyChoices,
}

/// OpenAI-compatible chat completions client. One request per call, bounded
/// by the configured timeout.
#[derive(Clone)]
pub struct LLMProvider {
    config: ContentProviderConfig,
    client: reqwest::Client,
}

impl LLMProvider {
    pub fn new(config: ContentProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn config(&self) -> &ContentProviderConfig {
        &self.config
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LLMError> {
        let url = format!("{}/chat/completions", self.config.api_endpoint);
        let mut payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": options.temperature,
            "stream": false
        });
        if options.json_mode && self.config.kind.supports_json_mode() {
            payload["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        debug!(provider = self.config.kind.as_str(), model = %self.config.model, "chat completion");

        // Ollama ignores the key but its OpenAI shim still wants the header.
        let api_key = self.config.api_key.as_deref().unwrap_or("ollama");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LLMError::HttpStatus { status, body });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, body = %String::from_utf8_lossy(&bytes), "unparseable chat response");
            LLMError::Json(e)
        })
    }

    pub async fn complete_with_system(
        &self,
        system: &str,
        user: &str,
        options: ChatOptions,
    ) -> Result<String, LLMError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let response = self.chat(&messages, options).await?;
        response
            .first_content()
            .map(|s| s.to_string())
            .ok_or(LLMError::EmptyChoices)
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") || trimmed.contains("/v1/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("http://localhost:11434"), "http://localhost:11434/v1");
        assert_eq!(normalize_endpoint("http://localhost:11434/v1/"), "http://localhost:11434/v1");
    }

    #[test]
    fn test_hosted_models() {
        let groq =
            ContentProviderConfig::hosted(ProviderKind::Groq, "k".into(), Duration::from_secs(1));
        assert_eq!(groq.model, "llama-3.1-70b-versatile");
        assert!(groq.api_endpoint.starts_with("https://api.groq.com"));

        let openai =
            ContentProviderConfig::hosted(ProviderKind::OpenAi, "k".into(), Duration::from_secs(1));
        assert_eq!(openai.model, "gpt-4o-mini");
    }

    #[test]
    fn test_select_provider_order_and_fallback() {
        let timeout = Duration::from_secs(1);
        let local =
            || ContentProviderConfig::ollama("http://localhost:11434", "gemma3:4b", timeout);

        let cfg = select_provider(true, Some("g".into()), None, timeout, local);
        assert_eq!(cfg.kind, ProviderKind::Ollama);
        assert!(!cfg.fallback);

        let cfg = select_provider(false, Some("g".into()), Some("o".into()), timeout, local);
        assert_eq!(cfg.kind, ProviderKind::Groq);

        let cfg = select_provider(false, None, Some("o".into()), timeout, local);
        assert_eq!(cfg.kind, ProviderKind::OpenAi);
        assert_eq!(cfg.api_key.as_deref(), Some("o"));

        let cfg = select_provider(false, None, None, timeout, local);
        assert_eq!(cfg.kind, ProviderKind::Ollama);
        assert!(cfg.fallback);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn test_json_mode_only_for_hosted() {
        assert!(!ProviderKind::Ollama.supports_json_mode());
        assert!(ProviderKind::Groq.supports_json_mode());
        assert!(ProviderKind::OpenAi.supports_json_mode());
    }

    #[test]
    fn test_first_content_skips_null() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(resp.first_content().is_none());
    }
}
