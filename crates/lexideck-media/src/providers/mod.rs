//! Provider registry
//!
//! Maps provider names to concrete backends. The pipeline receives the
//! boxed capability and never learns which backend it got.

pub mod elevenlabs;
pub mod flux;
pub mod judge;
pub mod mock;
pub mod pexels;

use crate::config::LexideckConfig;
use crate::provider::{
    AudioSynthesisProvider, ImageGenerationProvider, ImageSearchProvider, MediaScorer,
    ProviderError,
};
use lexideck_core::{DeckError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Create an audio synthesis backend by name
pub fn create_audio_provider(
    name: &str,
    config: &LexideckConfig,
    media_dir: &Path,
) -> Result<Arc<dyn AudioSynthesisProvider>> {
    match name {
        "mock" => Ok(Arc::new(mock::MockAudioProvider::new(media_dir))),
        "elevenlabs" => Ok(Arc::new(elevenlabs::ElevenLabsProvider::from_config(
            config, media_dir,
        )?)),
        _ => Err(unknown_provider(name, "mock, elevenlabs")),
    }
}

/// Create an image search backend by name
pub fn create_image_search_provider(
    name: &str,
    config: &LexideckConfig,
    media_dir: &Path,
) -> Result<Arc<dyn ImageSearchProvider>> {
    match name {
        "mock" => Ok(Arc::new(mock::MockImageSearchProvider::new(media_dir))),
        "pexels" => Ok(Arc::new(pexels::PexelsProvider::from_config(
            config, media_dir,
        )?)),
        _ => Err(unknown_provider(name, "mock, pexels")),
    }
}

/// Create an image generation backend by name
pub fn create_image_generation_provider(
    name: &str,
    config: &LexideckConfig,
    media_dir: &Path,
) -> Result<Arc<dyn ImageGenerationProvider>> {
    match name {
        "mock" => Ok(Arc::new(mock::MockImageGenerationProvider::new(media_dir))),
        "flux" => Ok(Arc::new(flux::FluxProvider::from_config(
            config, media_dir,
        )?)),
        _ => Err(unknown_provider(name, "mock, flux")),
    }
}

/// Create a scorer backend by name
pub fn create_scorer(name: &str, config: &LexideckConfig) -> Result<Arc<dyn MediaScorer>> {
    match name {
        "mock" => Ok(Arc::new(mock::ScriptedScorer::constant(0.9))),
        "judge" => Ok(Arc::new(judge::JudgeScorer::from_config(config)?)),
        _ => Err(unknown_provider(name, "mock, judge")),
    }
}

/// List all available provider names, by capability
pub fn available_providers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("audio", "mock, elevenlabs"),
        ("image-search", "mock, pexels"),
        ("image-generation", "mock, flux"),
        ("scorer", "mock, judge"),
    ]
}

fn unknown_provider(name: &str, available: &str) -> DeckError {
    DeckError::ConfigError(format!(
        "unknown provider '{}'. Available: {}",
        name, available
    ))
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

/// Classify a reqwest failure as transient (retryable) or permanent
pub(crate) fn classify_http_error(provider: &str, err: reqwest::Error) -> ProviderError {
    let transient = err.is_timeout()
        || err.is_connect()
        || err
            .status()
            .map(|s| matches!(s.as_u16(), 429 | 500 | 502 | 503 | 504))
            .unwrap_or(false);
    ProviderError {
        provider: provider.to_string(),
        message: err.to_string(),
        transient,
    }
}

/// Classify a non-success HTTP status
pub(crate) fn classify_status(provider: &str, status: reqwest::StatusCode) -> ProviderError {
    let transient = matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504);
    ProviderError {
        provider: provider.to_string(),
        message: format!("unexpected status {}", status),
        transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_error() {
        let config = LexideckConfig::default();
        let dir = std::env::temp_dir();
        assert!(create_audio_provider("nope", &config, &dir).is_err());
        assert!(create_image_search_provider("nope", &config, &dir).is_err());
        assert!(create_image_generation_provider("nope", &config, &dir).is_err());
        assert!(create_scorer("nope", &config).is_err());
    }

    #[test]
    fn test_mock_backends_need_no_keys() {
        let config = LexideckConfig::default();
        let dir = std::env::temp_dir();
        assert!(create_audio_provider("mock", &config, &dir).is_ok());
        assert!(create_image_search_provider("mock", &config, &dir).is_ok());
        assert!(create_image_generation_provider("mock", &config, &dir).is_ok());
        assert!(create_scorer("mock", &config).is_ok());
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status("x", reqwest::StatusCode::TOO_MANY_REQUESTS).transient);
        assert!(classify_status("x", reqwest::StatusCode::BAD_GATEWAY).transient);
        assert!(!classify_status("x", reqwest::StatusCode::UNAUTHORIZED).transient);
    }
}
