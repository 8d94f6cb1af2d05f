//! ElevenLabs text-to-speech provider
//!
//! Synthesizes pronunciation audio via the ElevenLabs TTS API. The
//! voice id comes from the per-language `VoiceConfig`; the `engine`
//! field selects the model.

use crate::config::LexideckConfig;
use crate::provider::{AudioSynthesisProvider, MediaHandle, ProviderError, ProviderStatus, VoiceConfig};
use crate::providers::{classify_http_error, classify_status, http_client};
use async_trait::async_trait;
use lexideck_core::{DeckError, Fingerprint, Result};
use std::path::{Path, PathBuf};

const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// ElevenLabs TTS backend
pub struct ElevenLabsProvider {
    api_key: String,
    api_url: String,
    media_dir: PathBuf,
}

impl ElevenLabsProvider {
    /// Create a provider from config
    pub fn from_config(config: &LexideckConfig, media_dir: &Path) -> Result<Self> {
        let api_key = config
            .api_key("elevenlabs")
            .ok_or_else(|| {
                DeckError::ConfigError(
                    "ElevenLabs API key not configured. Set LEXIDECK_ELEVENLABS_API_KEY or add to .lexideck/config.toml".to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("elevenlabs")
            .unwrap_or(DEFAULT_ELEVENLABS_URL)
            .to_string();

        Ok(Self {
            api_key,
            api_url,
            media_dir: media_dir.to_path_buf(),
        })
    }

    fn model_for(voice: &VoiceConfig) -> &'static str {
        match voice.engine.as_str() {
            "neural" => "eleven_multilingual_v2",
            _ => "eleven_monolingual_v1",
        }
    }
}

#[async_trait]
impl AudioSynthesisProvider for ElevenLabsProvider {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn health_check(&self) -> ProviderStatus {
        if self.api_key.is_empty() {
            return ProviderStatus::NoApiKey;
        }
        ProviderStatus::Available
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> std::result::Result<MediaHandle, ProviderError> {
        let url = format!("{}/{}", self.api_url, voice.voice_id);
        let payload = serde_json::json!({
            "text": text,
            "model_id": Self::model_for(voice),
            "language_code": voice.language_code,
        });

        let response = http_client()
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify_http_error("elevenlabs", e))?;

        if !response.status().is_success() {
            return Err(classify_status("elevenlabs", response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_http_error("elevenlabs", e))?;

        std::fs::create_dir_all(&self.media_dir).map_err(|e| {
            ProviderError::permanent("elevenlabs", format!("cannot create media dir: {}", e))
        })?;

        let stem = Fingerprint::from_bytes(format!("{}|{}", text, voice.voice_id).as_bytes());
        let output_path = self.media_dir.join(format!("{}.mp3", stem));
        std::fs::write(&output_path, &bytes).map_err(|e| {
            ProviderError::permanent("elevenlabs", format!("failed to write audio: {}", e))
        })?;

        Ok(MediaHandle {
            uri: output_path.to_string_lossy().to_string(),
            content_hash: Some(Fingerprint::from_bytes(&bytes).to_hex()),
        })
    }
}

/// Parse an ElevenLabs error response body
pub fn parse_elevenlabs_error(json: &str) -> Result<String> {
    let response: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| DeckError::ConfigError(format!("invalid JSON: {}", e)))?;

    let message = response
        .get("detail")
        .and_then(|d| d.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| response.get("detail").and_then(|d| d.as_str()))
        .unwrap_or("Unknown error")
        .to_string();

    Ok(message)
}
