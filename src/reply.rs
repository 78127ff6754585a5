//! Conversational reply service boundary.
//!
//! The reply service is an opaque text-in/text-out collaborator: an
//! OpenAI-compatible chat-completions endpoint (OpenRouter by default).
//! It is the only dependency with unbounded, network-dependent latency, so
//! the client carries a per-request timeout budget. There is deliberately
//! no retry loop: a failed call surfaces immediately as
//! [`Error::ChatServiceUnavailable`] and any retry policy belongs to the
//! operator of the endpoint, not to the serving core.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::models::ChatTurn;

/// An external conversational reply service.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Produce the assistant's next reply given the system instruction and
    /// the full ordered turn history.
    async fn reply(&self, system_prompt: &str, turns: &[ChatTurn]) -> Result<String>;
}

/// Client for an OpenAI-compatible `POST /chat/completions` endpoint.
pub struct ChatCompletionsProvider {
    url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    /// Build the client from configuration. The API key is read from the
    /// environment variable named by `chat.api_key_env`.
    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("chat.model must be set to use the chat service"))?;

        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url: config.url.clone(),
            model,
            api_key,
            max_tokens: config.max_reply_tokens,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl ReplyProvider for ChatCompletionsProvider {
    async fn reply(&self, system_prompt: &str, turns: &[ChatTurn]) -> Result<String> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
        for turn in turns {
            messages.push(serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ChatServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::ChatServiceUnavailable(format!(
                "reply service returned {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ChatServiceUnavailable(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                Error::ChatServiceUnavailable(
                    "reply service returned no message content".to_string(),
                )
            })
    }
}
