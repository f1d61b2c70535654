//! Text-to-speech collaborator and the voice catalogue.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{truncate_body, ProviderError};

/// Synthesis settings for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisParams {
    pub voice: String,
    /// Speed ratio, 1.0 is normal.
    pub speed: f32,
    pub volume: f32,
    pub pitch: f32,
}

/// Anything that can synthesize speech.
#[async_trait]
pub trait SpeechCollaborator: Send + Sync {
    /// Encoded audio (mp3 for the bundled client).
    async fn synthesize(&self, text: &str, params: &SynthesisParams)
        -> Result<Vec<u8>, ProviderError>;
}

/// A selectable voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub language: &'static str,
}

const VOICES: [(&str, &str); 6] = [
    ("alloy", "Alloy"),
    ("echo", "Echo"),
    ("fable", "Fable"),
    ("onyx", "Onyx"),
    ("nova", "Nova"),
    ("shimmer", "Shimmer"),
];

/// Voices the TTS endpoint accepts.
pub fn available_voices() -> Vec<VoiceInfo> {
    VOICES
        .iter()
        .map(|&(id, name)| VoiceInfo {
            id,
            name,
            language: "multilingual",
        })
        .collect()
}

/// OpenAI-compatible `/audio/speech` client.
#[derive(Debug, Clone)]
pub struct OpenAiSpeechClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSpeechClient {
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn request_body(&self, text: &str, params: &SynthesisParams) -> serde_json::Value {
        // The endpoint takes speed only; volume and pitch ride along for
        // providers that understand them.
        serde_json::json!({
            "model": self.model,
            "input": text.trim(),
            "voice": params.voice,
            "speed": params.speed.clamp(0.25, 4.0),
            "volume": params.volume,
            "pitch": params.pitch,
            "response_format": "mp3",
        })
    }
}

#[async_trait]
impl SpeechCollaborator for OpenAiSpeechClient {
    async fn synthesize(
        &self,
        text: &str,
        params: &SynthesisParams,
    ) -> Result<Vec<u8>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::Malformed("empty synthesis input".into()));
        }
        log::debug!(
            "tts request: chars={}, voice={}, speed={}",
            text.chars().count(),
            params.voice,
            params.speed
        );

        let response = self
            .http
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text, params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(ProviderError::Malformed("empty audio body".into()));
        }
        log::info!("tts synthesized {} bytes", audio.len());
        Ok(audio.to_vec())
    }
}
