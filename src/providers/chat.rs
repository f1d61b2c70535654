//! Chat-completion collaborator.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{truncate_body, ProviderError};
use crate::types::{Role, Turn};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Generation knobs forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Anything that can turn a conversation into one assistant turn.
#[async_trait]
pub trait ChatCollaborator: Send + Sync {
    async fn complete(
        &self,
        turns: &[Turn],
        params: &GenerationParams,
    ) -> Result<Turn, ProviderError>;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiChatClient {
    pub const TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn request_body(turns: &[Turn], params: &GenerationParams) -> Value {
        serde_json::json!({
            "model": params.model,
            "messages": turns,
            "stream": false,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        })
    }

    fn parse_reply(json: &Value) -> Result<Turn, ProviderError> {
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::Malformed("no choices[0].message.content".into()))?;
        Ok(Turn::new(Role::Assistant, content))
    }
}

#[async_trait]
impl ChatCollaborator for OpenAiChatClient {
    async fn complete(
        &self,
        turns: &[Turn],
        params: &GenerationParams,
    ) -> Result<Turn, ProviderError> {
        log::debug!(
            "chat completion: model={}, messages={}",
            params.model,
            turns.len()
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(turns, params))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            log::error!("chat provider returned {}: {}", status, truncate_body(&text));
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", e, truncate_body(&text))))?;
        let reply = Self::parse_reply(&json)?;
        log::debug!("chat completion reply length: {}", reply.content.len());
        Ok(reply)
    }
}
