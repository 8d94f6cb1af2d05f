//! Error types for lexideck

use thiserror::Error;

/// The main error type for lexideck operations
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("invalid phase transition: {operation} requires phase {required}, but the pipeline is in {current}")]
    InvalidPhaseTransition {
        operation: String,
        required: String,
        current: String,
    },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("record validation error [{record}]: {reason}")]
    RecordValidation { record: String, reason: String },

    #[error("strict mode abort [{record}]: {reason}")]
    StrictAbort { record: String, reason: String },

    #[error("provider '{provider}' failed: {message}")]
    Provider {
        provider: String,
        message: String,
        transient: bool,
    },

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("cache entry for fingerprint {0} is corrupt")]
    CacheCorruption(String),

    #[error("card build error: {0}")]
    CardBuild(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("build cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for lexideck operations
pub type Result<T> = std::result::Result<T, DeckError>;

impl From<toml::de::Error> for DeckError {
    fn from(err: toml::de::Error) -> Self {
        DeckError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for DeckError {
    fn from(err: toml::ser::Error) -> Self {
        DeckError::TomlSerError(err.to_string())
    }
}
