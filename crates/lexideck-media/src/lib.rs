//! Lexideck Media - Provider capability interfaces and backends
//!
//! Defines the polymorphic boundaries the build pipeline consumes
//! (audio synthesis, image search, image generation, scoring) together
//! with concrete HTTP backends (ElevenLabs, Pexels, Flux, an HTTP
//! judge) and local mock backends, plus the style guide and layered
//! configuration the backends draw from.

pub mod config;
pub mod provider;
pub mod providers;
pub mod style;

pub use config::{BuildConfig, CacheMode, GenerationConfig, LexideckConfig, Thresholds};
pub use provider::{
    AudioSynthesisProvider, EvaluationError, EvaluationResult, ImageGenerationProvider,
    ImageSearchProvider, MediaAsset, MediaCandidate, MediaHandle, MediaKind, MediaScorer,
    ProviderError, ProviderStatus, VoiceConfig,
};
pub use style::StyleGuide;
