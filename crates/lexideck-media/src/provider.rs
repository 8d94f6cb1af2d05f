//! Provider capability traits and shared request/result types
//!
//! One trait per capability; the pipeline depends only on these shapes
//! and never branches on which backend is behind them.

use crate::style::StyleGuide;
use async_trait::async_trait;
use lexideck_core::DeckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of media (or text) a candidate belongs to.
///
/// Evaluation thresholds are configured per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Image,
    CardText,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Image => write!(f, "image"),
            MediaKind::CardText => write!(f, "card_text"),
        }
    }
}

/// Opaque storage reference returned by providers.
///
/// The pipeline treats the uri as a handle; only the exporter ever
/// dereferences it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    /// Local path or URL of the produced media
    pub uri: String,
    /// Content hash (sha256 hex) when the backend computed one
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Voice parameters for audio synthesis (per-language configuration)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Provider voice id (e.g. "Marlene")
    pub voice_id: String,
    /// BCP-47 language code (e.g. "de-DE")
    pub language_code: String,
    /// Synthesis engine/model selector
    #[serde(default = "default_engine")]
    pub engine: String,
}

fn default_engine() -> String {
    "standard".to_string()
}

/// A media artifact awaiting evaluation
#[derive(Debug, Clone)]
pub struct MediaCandidate {
    pub kind: MediaKind,
    pub handle: MediaHandle,
    /// Name of the provider that produced it
    pub provider: String,
    /// The prompt/query/text that produced it, for the scorer's context
    pub prompt: String,
}

/// An accepted (or flagged best-of fallback) media result attached to a
/// record's build context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub handle: MediaHandle,
    pub provider: String,
    /// Evaluation score this asset was admitted with
    pub score: f64,
    /// Index of the acquisition stage that produced it
    pub stage: usize,
    /// True when no stage met its threshold and this is the best-of
    /// fallback candidate
    #[serde(default)]
    pub below_threshold: bool,
}

/// Result of a single evaluation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Score in [0.0, 1.0]
    pub score: f64,
    /// Whether the score met the configured threshold
    pub accepted: bool,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Status returned by a provider health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    Unavailable(String),
    NoApiKey,
}

/// A provider call failure. `transient` marks failures worth retrying
/// (timeouts, connection resets, 429/5xx).
#[derive(Debug, Clone, Error)]
#[error("provider '{provider}' failed: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
    pub transient: bool,
}

impl ProviderError {
    pub fn transient(provider: &str, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            message: message.into(),
            transient: true,
        }
    }

    pub fn permanent(provider: &str, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            message: message.into(),
            transient: false,
        }
    }
}

impl From<ProviderError> for DeckError {
    fn from(err: ProviderError) -> Self {
        DeckError::Provider {
            provider: err.provider,
            message: err.message,
            transient: err.transient,
        }
    }
}

/// The scorer itself failed to produce a score. Distinct from a
/// low-score rejection: callers retry this, they fall back on that.
#[derive(Debug, Clone, Error)]
#[error("evaluation failed: {0}")]
pub struct EvaluationError(pub String);

impl From<EvaluationError> for DeckError {
    fn from(err: EvaluationError) -> Self {
        DeckError::Evaluation(err.0)
    }
}

/// Text-to-speech capability
#[async_trait]
pub trait AudioSynthesisProvider: Send + Sync {
    /// Provider name (e.g. "elevenlabs", "mock")
    fn name(&self) -> &str;

    /// Check availability (API key set, service reachable)
    async fn health_check(&self) -> ProviderStatus;

    /// Synthesize speech for the given text
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<MediaHandle, ProviderError>;
}

/// Stock image search capability (the cheap first stage)
#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn health_check(&self) -> ProviderStatus;

    /// Search for an image matching the query
    async fn search(&self, query: &str) -> Result<MediaHandle, ProviderError>;
}

/// AI image generation capability (the costly second stage)
#[async_trait]
pub trait ImageGenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn health_check(&self) -> ProviderStatus;

    /// Generate an image for the prompt, styled by the deck's guide
    /// when one is configured
    async fn generate(
        &self,
        prompt: &str,
        style: Option<&StyleGuide>,
    ) -> Result<MediaHandle, ProviderError>;
}

/// Pluggable quality scorer behind the evaluation gate
#[async_trait]
pub trait MediaScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Score a candidate in [0.0, 1.0]. The gate applies the threshold;
    /// scorers return `accepted = false` and let the gate decide.
    async fn score(
        &self,
        candidate: &MediaCandidate,
        kind: MediaKind,
    ) -> Result<EvaluationResult, EvaluationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_display() {
        assert_eq!(MediaKind::Audio.to_string(), "audio");
        assert_eq!(MediaKind::CardText.to_string(), "card_text");
    }

    #[test]
    fn test_provider_error_transiency() {
        let e = ProviderError::transient("pexels", "timeout");
        assert!(e.transient);
        let e = ProviderError::permanent("pexels", "bad key");
        assert!(!e.transient);
    }

    #[test]
    fn test_provider_error_into_deck_error() {
        let e: DeckError = ProviderError::transient("flux", "503").into();
        match e {
            DeckError::Provider { transient, .. } => assert!(transient),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_media_asset_serde_roundtrip() {
        let asset = MediaAsset {
            kind: MediaKind::Image,
            handle: MediaHandle {
                uri: "media/hund.png".to_string(),
                content_hash: Some("abc".to_string()),
            },
            provider: "flux".to_string(),
            score: 0.85,
            stage: 1,
            below_threshold: false,
        };
        let json = serde_json::to_string(&asset).unwrap();
        let parsed: MediaAsset = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.handle.uri, "media/hund.png");
        assert_eq!(parsed.stage, 1);
    }
}
