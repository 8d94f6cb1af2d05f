//! Style guide system for enriching generation prompts
//!
//! A style guide defines the cultural/visual vocabulary (prompt framing,
//! palette words, negative prompt) the image generation stage uses so a
//! deck's imagery stays coherent.

use lexideck_core::{DeckError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A style guide that enriches generation prompts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleGuide {
    /// Style name (e.g. "berlin-street")
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Prompt prefix prepended to all generation prompts
    #[serde(default)]
    pub prompt_prefix: Option<String>,
    /// Prompt suffix appended to all generation prompts
    #[serde(default)]
    pub prompt_suffix: Option<String>,
    /// Negative prompt (things to avoid)
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Mood/palette descriptors woven into the prompt
    #[serde(default)]
    pub palette: Vec<String>,
}

/// TOML file wrapper
#[derive(Debug, Deserialize)]
struct StyleFile {
    style: StyleGuide,
}

impl StyleGuide {
    /// Load a style guide from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: StyleFile = toml::from_str(&content).map_err(|e| {
            DeckError::ConfigError(format!(
                "failed to parse style guide {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(file.style)
    }

    /// Find and load a style guide by name, searching standard locations
    pub fn find(name: &str) -> Result<Self> {
        let candidates = [
            format!("styles/{}.style.toml", name),
            format!(".lexideck/styles/{}.style.toml", name),
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(DeckError::ConfigError(format!(
            "style guide '{}' not found (searched: {})",
            name,
            candidates.join(", ")
        )))
    }

    /// Enrich a generation prompt with style context
    pub fn enrich_prompt(&self, base_prompt: &str) -> String {
        let mut parts = Vec::new();

        if let Some(ref prefix) = self.prompt_prefix {
            parts.push(prefix.clone());
        }

        parts.push(base_prompt.to_string());

        if !self.palette.is_empty() {
            parts.push(format!("Mood: {}", self.palette.join(", ")));
        }

        if let Some(ref suffix) = self.prompt_suffix {
            parts.push(suffix.clone());
        }

        parts.join(". ")
    }

    /// Get the negative prompt (if any)
    pub fn negative(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }
}
