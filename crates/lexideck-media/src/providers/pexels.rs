//! Pexels image search provider
//!
//! The cheap first image stage: searches stock photography and downloads
//! the top hit.

use crate::config::LexideckConfig;
use crate::provider::{ImageSearchProvider, MediaHandle, ProviderError, ProviderStatus};
use crate::providers::{classify_http_error, classify_status, http_client};
use async_trait::async_trait;
use lexideck_core::{DeckError, Fingerprint, Result};
use std::path::{Path, PathBuf};

const DEFAULT_PEXELS_URL: &str = "https://api.pexels.com/v1/search";

/// Pexels stock photo search backend
pub struct PexelsProvider {
    api_key: String,
    api_url: String,
    media_dir: PathBuf,
}

impl PexelsProvider {
    /// Create a provider from config
    pub fn from_config(config: &LexideckConfig, media_dir: &Path) -> Result<Self> {
        let api_key = config
            .api_key("pexels")
            .ok_or_else(|| {
                DeckError::ConfigError(
                    "Pexels API key not configured. Set LEXIDECK_PEXELS_API_KEY or add to .lexideck/config.toml".to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("pexels")
            .unwrap_or(DEFAULT_PEXELS_URL)
            .to_string();

        Ok(Self {
            api_key,
            api_url,
            media_dir: media_dir.to_path_buf(),
        })
    }

    /// Pull the top photo URL out of a search response
    fn top_photo_url(body: &serde_json::Value) -> Option<&str> {
        body.get("photos")?
            .as_array()?
            .first()?
            .get("src")?
            .get("large")?
            .as_str()
    }
}

#[async_trait]
impl ImageSearchProvider for PexelsProvider {
    fn name(&self) -> &str {
        "pexels"
    }

    async fn health_check(&self) -> ProviderStatus {
        if self.api_key.is_empty() {
            return ProviderStatus::NoApiKey;
        }
        ProviderStatus::Available
    }

    async fn search(&self, query: &str) -> std::result::Result<MediaHandle, ProviderError> {
        let response = http_client()
            .get(&self.api_url)
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("per_page", "1")])
            .send()
            .await
            .map_err(|e| classify_http_error("pexels", e))?;

        if !response.status().is_success() {
            return Err(classify_status("pexels", response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| classify_http_error("pexels", e))?;

        let photo_url = Self::top_photo_url(&body).ok_or_else(|| {
            ProviderError::permanent("pexels", format!("no results for query '{}'", query))
        })?;

        let image = http_client()
            .get(photo_url)
            .send()
            .await
            .map_err(|e| classify_http_error("pexels", e))?;
        if !image.status().is_success() {
            return Err(classify_status("pexels", image.status()));
        }
        let bytes = image
            .bytes()
            .await
            .map_err(|e| classify_http_error("pexels", e))?;

        std::fs::create_dir_all(&self.media_dir).map_err(|e| {
            ProviderError::permanent("pexels", format!("cannot create media dir: {}", e))
        })?;

        let stem = Fingerprint::from_bytes(query.as_bytes());
        let output_path = self.media_dir.join(format!("{}.jpg", stem));
        std::fs::write(&output_path, &bytes).map_err(|e| {
            ProviderError::permanent("pexels", format!("failed to write image: {}", e))
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
    fn test_top_photo_url() {
        let body = serde_json::json!({
            "photos": [
                { "src": { "large": "https://images.example/dog-large.jpg" } },
                { "src": { "large": "https://images.example/dog2.jpg" } }
            ]
        });
        assert_eq!(
            PexelsProvider::top_photo_url(&body),
            Some("https://images.example/dog-large.jpg")
        );
    }

    #[test]
    fn test_top_photo_url_empty_results() {
        let body = serde_json::json!({ "photos": [] });
        assert_eq!(PexelsProvider::top_photo_url(&body), None);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = LexideckConfig::default();
        assert!(PexelsProvider::from_config(&config, std::env::temp_dir().as_path()).is_err());
    }
}
