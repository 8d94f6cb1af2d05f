//! Flux image generation provider (fal.ai)
//!
//! The costly second image stage: generates an image from a prompt,
//! enriched with the deck's style guide (prefix/suffix, palette,
//! negative prompt) when one is configured.

use crate::config::LexideckConfig;
use crate::provider::{ImageGenerationProvider, MediaHandle, ProviderError, ProviderStatus};
use crate::providers::{classify_http_error, classify_status, http_client};
use crate::style::StyleGuide;
use async_trait::async_trait;
use lexideck_core::{DeckError, Fingerprint, Result};
use std::path::{Path, PathBuf};

const DEFAULT_FLUX_URL: &str = "https://queue.fal.run/fal-ai/flux/dev";
const IMAGE_WIDTH: u32 = 1024;
const IMAGE_HEIGHT: u32 = 768;

/// Flux provider for AI image generation via fal.ai
pub struct FluxProvider {
    api_key: String,
    api_url: String,
    media_dir: PathBuf,
}

impl FluxProvider {
    /// Create a provider from config
    pub fn from_config(config: &LexideckConfig, media_dir: &Path) -> Result<Self> {
        let api_key = config
            .api_key("flux")
            .ok_or_else(|| {
                DeckError::ConfigError(
                    "Flux API key not configured. Set LEXIDECK_FLUX_API_KEY or add to .lexideck/config.toml".to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("flux")
            .unwrap_or(DEFAULT_FLUX_URL)
            .to_string();

        Ok(Self {
            api_key,
            api_url,
            media_dir: media_dir.to_path_buf(),
        })
    }

    /// Pull the generated image URL out of a completion response
    fn image_url(body: &serde_json::Value) -> Option<&str> {
        body.get("images")?
            .as_array()?
            .first()?
            .get("url")?
            .as_str()
    }

    fn build_payload(prompt: &str, style: Option<&StyleGuide>) -> serde_json::Value {
        let enriched = match style {
            Some(style) => style.enrich_prompt(prompt),
            None => prompt.to_string(),
        };
        let mut payload = serde_json::json!({
            "prompt": enriched,
            "image_size": {
                "width": IMAGE_WIDTH,
                "height": IMAGE_HEIGHT
            },
            "num_images": 1,
            "enable_safety_checker": false
        });
        if let Some(negative) = style.and_then(|s| s.negative()) {
            payload["negative_prompt"] = serde_json::Value::String(negative.to_string());
        }
        payload
    }
}

#[async_trait]
impl ImageGenerationProvider for FluxProvider {
    fn name(&self) -> &str {
        "flux"
    }

    async fn health_check(&self) -> ProviderStatus {
        if self.api_key.is_empty() {
            return ProviderStatus::NoApiKey;
        }
        ProviderStatus::Available
    }

    async fn generate(
        &self,
        prompt: &str,
        style: Option<&StyleGuide>,
    ) -> std::result::Result<MediaHandle, ProviderError> {
        let payload = Self::build_payload(prompt, style);

        let response = http_client()
            .post(&self.api_url)
            .header("Authorization", format!("Key {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify_http_error("flux", e))?;

        if !response.status().is_success() {
            return Err(classify_status("flux", response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| classify_http_error("flux", e))?;

        let image_url = Self::image_url(&body).ok_or_else(|| {
            ProviderError::permanent("flux", "response contained no image".to_string())
        })?;

        let image = http_client()
            .get(image_url)
            .send()
            .await
            .map_err(|e| classify_http_error("flux", e))?;
        if !image.status().is_success() {
            return Err(classify_status("flux", image.status()));
        }
        let bytes = image
            .bytes()
            .await
            .map_err(|e| classify_http_error("flux", e))?;

        std::fs::create_dir_all(&self.media_dir).map_err(|e| {
            ProviderError::permanent("flux", format!("cannot create media dir: {}", e))
        })?;

        let stem = Fingerprint::from_bytes(payload.to_string().as_bytes());
        let output_path = self.media_dir.join(format!("{}.png", stem));
        std::fs::write(&output_path, &bytes).map_err(|e| {
            ProviderError::permanent("flux", format!("failed to write image: {}", e))
        })?;

        Ok(MediaHandle {
            uri: output_path.to_string_lossy().to_string(),
            content_hash: Some(Fingerprint::from_bytes(&bytes).to_hex()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_extraction() {
        let body = serde_json::json!({
            "images": [{ "url": "https://fal.example/out.png", "width": 1024 }]
        });
        assert_eq!(
            FluxProvider::image_url(&body),
            Some("https://fal.example/out.png")
        );
    }

    #[test]
    fn test_image_url_missing() {
        let body = serde_json::json!({ "images": [] });
        assert_eq!(FluxProvider::image_url(&body), None);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = LexideckConfig::default();
        assert!(FluxProvider::from_config(&config, std::env::temp_dir().as_path()).is_err());
    }

    #[test]
    fn test_payload_without_style() {
        let payload = FluxProvider::build_payload("a dog in a park", None);
        assert_eq!(payload["prompt"], "a dog in a park");
        assert!(payload.get("negative_prompt").is_none());
    }

    #[test]
    fn test_payload_applies_style_guide() {
        let style = StyleGuide {
            name: "berlin-street".to_string(),
            prompt_prefix: Some("Candid street photography".to_string()),
            negative_prompt: Some("cartoon, watermark".to_string()),
            ..Default::default()
        };
        let payload = FluxProvider::build_payload("a dog in a park", Some(&style));
        let prompt = payload["prompt"].as_str().unwrap();
        assert!(prompt.contains("Candid street photography"));
        assert!(prompt.contains("a dog in a park"));
        assert_eq!(payload["negative_prompt"], "cartoon, watermark");
    }
}
