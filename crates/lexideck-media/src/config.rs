//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `LEXIDECK_{PROVIDER}_API_KEY`
//! 2. Project-local: `.lexideck/config.toml`
//! 3. Global: `~/.lexideck/config.toml`

use crate::provider::{MediaKind, VoiceConfig};
use lexideck_core::{DeckError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Per-kind evaluation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_audio_threshold")]
    pub audio: f64,
    #[serde(default = "default_image_threshold")]
    pub image: f64,
    #[serde(default = "default_card_text_threshold")]
    pub card_text: f64,
}

fn default_audio_threshold() -> f64 {
    0.7
}
fn default_image_threshold() -> f64 {
    0.75
}
fn default_card_text_threshold() -> f64 {
    0.8
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            audio: default_audio_threshold(),
            image: default_image_threshold(),
            card_text: default_card_text_threshold(),
        }
    }
}

impl Thresholds {
    pub fn for_kind(&self, kind: MediaKind) -> f64 {
        match kind {
            MediaKind::Audio => self.audio,
            MediaKind::Image => self.image,
            MediaKind::CardText => self.card_text,
        }
    }
}

/// Generation defaults: which backends serve each capability, stage
/// composition, and which record fields drive enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_audio_provider")]
    pub audio_provider: String,
    #[serde(default = "default_image_search_provider")]
    pub image_search_provider: String,
    #[serde(default = "default_image_generation_provider")]
    pub image_generation_provider: String,
    #[serde(default = "default_scorer")]
    pub scorer: String,
    /// Ordered image acquisition stages ("search", "generate")
    #[serde(default = "default_image_stages")]
    pub image_stages: Vec<String>,
    /// Record fields synthesized as separate audio segments
    #[serde(default = "default_audio_fields")]
    pub audio_fields: Vec<String>,
    /// Record field the image query is built from
    #[serde(default = "default_image_query_field")]
    pub image_query_field: String,
    /// Style guide name for the generation stage
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_audio_provider() -> String {
    "elevenlabs".to_string()
}
fn default_image_search_provider() -> String {
    "pexels".to_string()
}
fn default_image_generation_provider() -> String {
    "flux".to_string()
}
fn default_scorer() -> String {
    "judge".to_string()
}
fn default_image_stages() -> Vec<String> {
    vec!["search".to_string(), "generate".to_string()]
}
fn default_audio_fields() -> Vec<String> {
    vec!["word".to_string(), "example".to_string()]
}
fn default_image_query_field() -> String {
    "word".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            audio_provider: default_audio_provider(),
            image_search_provider: default_image_search_provider(),
            image_generation_provider: default_image_generation_provider(),
            scorer: default_scorer(),
            image_stages: default_image_stages(),
            audio_fields: default_audio_fields(),
            image_query_field: default_image_query_field(),
            style: None,
            thresholds: Thresholds::default(),
        }
    }
}

/// How long the synthesis cache outlives a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    Memory,
    Disk,
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Memory
    }
}

/// Build-run policy: failure handling, concurrency, retries, caching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Abort the whole run on the first per-item failure
    #[serde(default)]
    pub strict: bool,
    /// Upper bound on records enriched concurrently
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,
    /// Concurrent in-flight calls allowed per provider
    #[serde(default = "default_provider_concurrency")]
    pub provider_concurrency: usize,
    /// Attempts per provider call (1 = no retry)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    /// Base delay for exponential backoff, in milliseconds
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default)]
    pub cache_mode: CacheMode,
    /// Index file location for `cache_mode = "disk"`
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_worker_limit() -> usize {
    8
}
fn default_provider_concurrency() -> usize {
    4
}
fn default_retry_attempts() -> usize {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_cache_dir() -> String {
    ".lexideck/cache".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            strict: false,
            worker_limit: default_worker_limit(),
            provider_concurrency: default_provider_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
            cache_mode: CacheMode::default(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexideckConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub build: BuildConfig,
    /// Per-language voice configuration, keyed by language tag
    #[serde(default)]
    pub voices: HashMap<String, VoiceConfig>,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct LexideckConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub build: BuildConfig,
    pub voices: HashMap<String, VoiceConfig>,
}

impl LexideckConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = LexideckConfigFile::default();

        // Layer 1: Global config (~/.lexideck/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        // Layer 2: Project-local config (.lexideck/config.toml)
        let local_path = PathBuf::from(".lexideck/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        // Layer 3: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(Self::from_file(config))
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(Self::from_file(config))
    }

    fn from_file(file: LexideckConfigFile) -> Self {
        Self {
            providers: file.providers,
            generation: file.generation,
            build: file.build,
            voices: file.voices,
        }
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_key.as_deref())
    }

    /// Get API URL for a provider (or its default)
    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Check if a provider is enabled
    pub fn is_enabled(&self, provider_name: &str) -> bool {
        self.providers
            .get(provider_name)
            .map(|p| p.enabled)
            .unwrap_or(true)
    }

    /// Voice configuration for a record language, if configured
    pub fn voice_for(&self, language: &str) -> Option<&VoiceConfig> {
        self.voices.get(language)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".lexideck").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<LexideckConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let config: LexideckConfigFile = toml::from_str(&content).map_err(|e| {
            DeckError::ConfigError(format!("failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    fn merge_into(base: &mut LexideckConfigFile, overlay: LexideckConfigFile) {
        for (name, provider) in overlay.providers {
            let entry = base.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            entry.enabled = provider.enabled;
        }
        for (language, voice) in overlay.voices {
            base.voices.insert(language, voice);
        }
        // Generation and build sections replace wholesale: later layers
        // own the whole policy when they declare one.
        base.generation = overlay.generation;
        base.build = overlay.build;
    }

    fn apply_env_overrides(config: &mut LexideckConfigFile) {
        let provider_names = ["elevenlabs", "pexels", "flux", "judge"];
        for name in &provider_names {
            let env_key = format!("LEXIDECK_{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&env_key) {
                let entry = config.providers.entry(name.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
    }
}
