//! Generative summarization providers.
//!
//! Defines [`SummarizeError`] and the built-in [`Summarizer`] implementations:
//! - **[`DisabledSummarizer`]**: always fails; used when `provider = "disabled"`.
//! - **[`GeminiSummarizer`]**: Google Generative Language `generateContent`.
//! - **[`OpenAISummarizer`]**: OpenAI chat completions.
//!
//! # Failure policy
//!
//! Exactly one attempt is made per call. There is no retry, backoff, or
//! partial-result salvage: a failed attempt surfaces immediately so the
//! caller can show it.
//!
//! | Situation | Error |
//! |-----------|-------|
//! | transport error, non-2xx status, missing API key | [`SummarizeError::ProviderFailure`] |
//! | 2xx with no text (blocked, empty candidates) | [`SummarizeError::NoResponse`] |
//! | caller lacked an input (e.g. transcript) | [`SummarizeError::Unavailable`] |

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::SummarizerConfig;
use crate::traits::Summarizer;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const NO_RESPONSE: &str = "No response received.";
const SYSTEM_PROMPT: &str =
    "You are an assistant that reads videos and articles and reports their content clearly.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummarizeError {
    /// Empty or blocked response; carries the provider's feedback verbatim.
    #[error("{0}")]
    NoResponse(String),

    /// Transport, auth, or quota failure; carries the provider's error text.
    #[error("{0}")]
    ProviderFailure(String),

    /// A required input was missing before the provider was called.
    #[error("{0}")]
    Unavailable(String),
}

impl SummarizeError {
    /// Text shown to the user in place of a summary.
    pub fn display_text(&self) -> String {
        match self {
            Self::NoResponse(feedback) => {
                format!("An error occurred while summarizing: {}", feedback)
            }
            Self::ProviderFailure(raw) => format!("An error occurred while summarizing: {}", raw),
            Self::Unavailable(what) => format!("Cannot summarize: {}", what),
        }
    }
}

/// Map a build-time prompt problem to [`SummarizeError::Unavailable`].
impl From<crate::prompt::PromptError> for SummarizeError {
    fn from(err: crate::prompt::PromptError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

// ============ Disabled ============

pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn summarize(&self, _prompt: &str) -> Result<String, SummarizeError> {
        Err(SummarizeError::ProviderFailure(
            "summarizer is disabled".to_string(),
        ))
    }
}

// ============ Gemini ============

/// Summarizer backed by `POST {base}/models/{model}:generateContent`.
pub struct GeminiSummarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    key_var: String,
}

impl GeminiSummarizer {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            key_var: "GOOGLE_AI_STUDIO_API_KEY".to_string(),
        })
    }

    pub fn from_config(config: &SummarizerConfig) -> Result<Self> {
        let key_var = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| "GOOGLE_AI_STUDIO_API_KEY".to_string());
        let mut summarizer = Self::new(
            config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL),
            config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL),
            std::env::var(&key_var).ok(),
            config.timeout_secs,
        )?;
        summarizer.key_var = key_var;
        Ok(summarizer)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn summarize(&self, prompt: &str) -> Result<String, SummarizeError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SummarizeError::ProviderFailure(format!("{} not set", self.key_var))
        })?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        tracing::info!(model = %self.model, prompt_len = prompt.len(), "requesting Gemini summary");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| SummarizeError::ProviderFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SummarizeError::ProviderFailure(format!(
                "Gemini API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SummarizeError::ProviderFailure(e.to_string()))?;
        parse_gemini_response(&json)
    }
}

/// Extract the generated text, or the feedback explaining why there is none.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String, SummarizeError> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    let text: String = candidate
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    let block_reason = json
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str());
    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(|r| r.as_str())
        .filter(|r| *r != "STOP");

    let feedback = block_reason.or(finish_reason).unwrap_or(NO_RESPONSE);
    Err(SummarizeError::NoResponse(feedback.to_string()))
}

// ============ OpenAI ============

/// Summarizer backed by `POST {base}/chat/completions`.
pub struct OpenAISummarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    key_var: String,
}

impl OpenAISummarizer {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            key_var: "OPENAI_API_KEY".to_string(),
        })
    }

    pub fn from_config(config: &SummarizerConfig) -> Result<Self> {
        let key_var = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| "OPENAI_API_KEY".to_string());
        let mut summarizer = Self::new(
            config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
            config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
            std::env::var(&key_var).ok(),
            config.timeout_secs,
        )?;
        summarizer.key_var = key_var;
        Ok(summarizer)
    }
}

#[async_trait]
impl Summarizer for OpenAISummarizer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn summarize(&self, prompt: &str) -> Result<String, SummarizeError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SummarizeError::ProviderFailure(format!("{} not set", self.key_var))
        })?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });

        tracing::info!(model = %self.model, prompt_len = prompt.len(), "requesting OpenAI summary");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SummarizeError::ProviderFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SummarizeError::ProviderFailure(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SummarizeError::ProviderFailure(e.to_string()))?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String, SummarizeError> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    let content = choice
        .and_then(|c| c.pointer("/message/content"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    if !content.trim().is_empty() {
        return Ok(content.to_string());
    }

    let feedback = choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(|r| r.as_str())
        .filter(|r| *r != "stop")
        .unwrap_or(NO_RESPONSE);
    Err(SummarizeError::NoResponse(feedback.to_string()))
}

/// Create the [`Summarizer`] named by `[summarizer].provider`.
///
/// | Config Value | Summarizer |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledSummarizer`] |
/// | `"gemini"` | [`GeminiSummarizer`] |
/// | `"openai"` | [`OpenAISummarizer`] |
pub fn create_summarizer(config: &SummarizerConfig) -> Result<Arc<dyn Summarizer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledSummarizer)),
        "gemini" => Ok(Arc::new(GeminiSummarizer::from_config(config)?)),
        "openai" => Ok(Arc::new(OpenAISummarizer::from_config(config)?)),
        other => bail!("Unknown summarizer provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gemini_joins_parts() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Hello world");
    }

    #[test]
    fn test_gemini_block_reason_verbatim() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(
            parse_gemini_response(&json),
            Err(SummarizeError::NoResponse("SAFETY".to_string()))
        );
    }

    #[test]
    fn test_gemini_finish_reason_when_no_parts() {
        let json = json!({ "candidates": [{ "finishReason": "RECITATION" }] });
        assert_eq!(
            parse_gemini_response(&json),
            Err(SummarizeError::NoResponse("RECITATION".to_string()))
        );
    }

    #[test]
    fn test_gemini_empty_object() {
        assert_eq!(
            parse_gemini_response(&json!({})),
            Err(SummarizeError::NoResponse(NO_RESPONSE.to_string()))
        );
    }

    #[test]
    fn test_openai_content() {
        let json = json!({
            "choices": [{ "message": { "content": "summary" }, "finish_reason": "stop" }]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "summary");
    }

    #[test]
    fn test_openai_content_filter() {
        let json = json!({
            "choices": [{ "message": { "content": null }, "finish_reason": "content_filter" }]
        });
        assert_eq!(
            parse_openai_response(&json),
            Err(SummarizeError::NoResponse("content_filter".to_string()))
        );
    }

    #[tokio::test]
    async fn test_disabled_fails() {
        let err = DisabledSummarizer.summarize("x").await.unwrap_err();
        assert!(matches!(err, SummarizeError::ProviderFailure(_)));
    }

    #[tokio::test]
    async fn test_missing_key_is_provider_failure() {
        let s = GeminiSummarizer::new("http://127.0.0.1:1", "m", None, 1).unwrap();
        let err = s.summarize("x").await.unwrap_err();
        assert_eq!(
            err,
            SummarizeError::ProviderFailure("GOOGLE_AI_STUDIO_API_KEY not set".to_string())
        );
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = SummarizerConfig {
            provider: "bard".to_string(),
            ..SummarizerConfig::default()
        };
        assert!(create_summarizer(&config).is_err());
    }
}
