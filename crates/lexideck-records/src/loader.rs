//! Record loading with per-row validation
//!
//! Loaders yield every valid record plus a row error for each malformed
//! entry; a bad row never aborts the batch. Strict-mode policy lives in
//! the pipeline, not here.

use crate::Record;
use indexmap::IndexMap;
use lexideck_core::{DeckError, RecordId, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A per-row validation failure, reported without aborting the load
#[derive(Debug, Clone)]
pub struct RowError {
    /// Identifier of the offending row: its declared id, or its index
    /// when no id was parseable
    pub row: String,
    pub reason: String,
}

/// Result of one load call: valid records plus deferred row errors
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub records: Vec<Record>,
    pub errors: Vec<RowError>,
}

/// Capability interface for record sources
pub trait RecordLoader: Send + Sync {
    /// Load all records, collecting per-row failures instead of
    /// propagating them
    fn load(&self) -> Result<LoadOutcome>;
}

/// Raw row shape as it appears in a records TOML file
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    fields: IndexMap<String, String>,
}

/// TOML file wrapper
#[derive(Debug, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    records: Vec<RawRecord>,
}

/// Loads records from a `*.records.toml` file
pub struct TomlRecordLoader {
    path: PathBuf,
}

impl TomlRecordLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn validate(index: usize, raw: RawRecord) -> std::result::Result<Record, RowError> {
        let row_label = raw
            .id
            .clone()
            .unwrap_or_else(|| format!("row {}", index + 1));

        let id = match raw.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(RowError {
                    row: row_label,
                    reason: "missing record id".to_string(),
                })
            }
        };
        let language = match raw.language {
            Some(lang) if !lang.trim().is_empty() => lang,
            _ => {
                return Err(RowError {
                    row: row_label,
                    reason: "missing language tag".to_string(),
                })
            }
        };
        if raw.fields.is_empty() {
            return Err(RowError {
                row: row_label,
                reason: "record has no fields".to_string(),
            });
        }
        if let Some((name, _)) = raw.fields.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(RowError {
                row: row_label,
                reason: format!("field '{}' is empty", name),
            });
        }

        Ok(Record::new(RecordId::new(id), &language, raw.fields))
    }
}

impl RecordLoader for TomlRecordLoader {
    fn load(&self) -> Result<LoadOutcome> {
        let content = std::fs::read_to_string(&self.path)?;
        let file: RecordsFile = toml::from_str(&content).map_err(|e| {
            DeckError::ConfigError(format!(
                "failed to parse records file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut outcome = LoadOutcome::default();
        for (index, raw) in file.records.into_iter().enumerate() {
            match Self::validate(index, raw) {
                Ok(record) => outcome.records.push(record),
                Err(err) => {
                    tracing::warn!(row = %err.row, reason = %err.reason, "skipping malformed record");
                    outcome.errors.push(err);
                }
            }
        }

        Ok(outcome)
    }
}
