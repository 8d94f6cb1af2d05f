//! Build phases and the shared build context
//!
//! The pipeline moves through five phases in one direction only. Every
//! operation names the phase it requires; calling it in any other phase
//! fails without touching the context.

use lexideck_core::{DeckError, RecordId, Result};
use lexideck_media::MediaAsset;
use lexideck_records::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle phase of a deck build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelinePhase {
    Initialized,
    DataLoaded,
    MediaEnriched,
    CardsBuilt,
    DeckExported,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Initialized => "initialized",
            PipelinePhase::DataLoaded => "data-loaded",
            PipelinePhase::MediaEnriched => "media-enriched",
            PipelinePhase::CardsBuilt => "cards-built",
            PipelinePhase::DeckExported => "deck-exported",
        };
        write!(f, "{}", name)
    }
}

/// A per-item problem recorded instead of aborting the build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredFailure {
    /// The record (or input row) the failure belongs to
    pub record: RecordId,
    /// Phase during which the failure occurred
    pub phase: PipelinePhase,
    pub reason: String,
}

/// Counters reported by each completed phase operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: PipelinePhase,
    pub processed: usize,
    pub succeeded: usize,
    pub deferred: usize,
}

/// State shared across the build: records, their attached media, the
/// current phase, and the append-only deferred failure list.
///
/// Owned by the orchestrator; enrichment workers never touch it
/// directly, their results are folded in after the concurrency barrier.
#[derive(Debug)]
pub struct BuildContext {
    records: Vec<Record>,
    assets: HashMap<RecordId, Vec<MediaAsset>>,
    phase: PipelinePhase,
    deferred: Vec<DeferredFailure>,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildContext {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            assets: HashMap::new(),
            phase: PipelinePhase::Initialized,
            deferred: Vec::new(),
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Fail unless the context is in exactly `required`.
    ///
    /// The returned error carries the operation name for the caller's
    /// diagnostics; the context is left untouched.
    pub fn require_phase(&self, operation: &str, required: PipelinePhase) -> Result<()> {
        if self.phase() != required {
            return Err(DeckError::InvalidPhaseTransition {
                operation: operation.to_string(),
                required: required.to_string(),
                current: self.phase().to_string(),
            });
        }
        Ok(())
    }

    /// Advance to the next phase. Phases only move forward.
    pub fn advance_to(&mut self, phase: PipelinePhase) {
        debug_assert!(self.phase < phase);
        self.phase = phase;
    }

    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Attach a record's media in one step, after its whole acquisition
    /// completed. Never called twice for the same record.
    pub fn attach_assets(&mut self, record: RecordId, assets: Vec<MediaAsset>) {
        debug_assert!(!self.assets.contains_key(&record));
        self.assets.insert(record, assets);
    }

    pub fn assets_for(&self, record: &RecordId) -> &[MediaAsset] {
        self.assets.get(record).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn defer(&mut self, record: RecordId, phase: PipelinePhase, reason: impl Into<String>) {
        self.deferred.push(DeferredFailure {
            record,
            phase,
            reason: reason.into(),
        });
    }

    pub fn deferred(&self) -> &[DeferredFailure] {
        &self.deferred
    }
}
