//! The deck pipeline orchestrator
//!
//! Owns the build context and drives the four phase operations in
//! order: `load_data`, `enrich_media`, `build_cards`, `export_deck`.
//! Each operation checks its required phase first; on a mismatch the
//! context is untouched. Per-item failures defer by default; in strict
//! mode the first one aborts the operation before any phase transition.

use crate::cache::SynthesisCache;
use crate::context::{BuildContext, DeferredFailure, PhaseSummary, PipelinePhase};
use crate::enrich::EnrichmentCoordinator;
use lexideck_core::{DeckError, RecordId, Result};
use lexideck_deck::{Card, CardBuilder, DeckExporter, ExportArtifact};
use lexideck_media::{CacheMode, LexideckConfig};
use lexideck_records::RecordLoader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Final accounting of a full `run()`
#[derive(Debug)]
pub struct BuildReport {
    pub summaries: Vec<PhaseSummary>,
    pub deferred: Vec<DeferredFailure>,
    pub artifact: ExportArtifact,
}

impl BuildReport {
    /// True when every item made it through every phase
    pub fn is_clean(&self) -> bool {
        self.deferred.is_empty()
    }
}

pub struct DeckPipeline {
    context: BuildContext,
    loader: Box<dyn RecordLoader>,
    coordinator: EnrichmentCoordinator,
    card_builder: Box<dyn CardBuilder>,
    exporter: Box<dyn DeckExporter>,
    cache: Arc<SynthesisCache>,
    deck_name: String,
    strict: bool,
    cache_mode: CacheMode,
    cache_dir: PathBuf,
    cards: Vec<Card>,
    artifact: Option<ExportArtifact>,
}

impl DeckPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deck_name: &str,
        loader: Box<dyn RecordLoader>,
        coordinator: EnrichmentCoordinator,
        card_builder: Box<dyn CardBuilder>,
        exporter: Box<dyn DeckExporter>,
        cache: Arc<SynthesisCache>,
        config: &LexideckConfig,
    ) -> Self {
        Self {
            context: BuildContext::new(),
            loader,
            coordinator,
            card_builder,
            exporter,
            cache,
            deck_name: deck_name.to_string(),
            strict: config.build.strict,
            cache_mode: config.build.cache_mode,
            cache_dir: PathBuf::from(&config.build.cache_dir),
            cards: Vec::new(),
            artifact: None,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.context.phase()
    }

    pub fn deferred(&self) -> &[DeferredFailure] {
        self.context.deferred()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Phase 1: load and validate records
    pub fn load_data(&mut self) -> Result<PhaseSummary> {
        self.context
            .require_phase("load_data", PipelinePhase::Initialized)?;

        let outcome = self.loader.load()?;

        if self.strict {
            if let Some(err) = outcome.errors.first() {
                return Err(DeckError::RecordValidation {
                    record: err.row.clone(),
                    reason: err.reason.clone(),
                });
            }
        }

        let processed = outcome.records.len() + outcome.errors.len();
        let succeeded = outcome.records.len();
        let deferred = outcome.errors.len();

        for err in outcome.errors {
            self.context.defer(
                RecordId::new(err.row),
                PipelinePhase::DataLoaded,
                err.reason,
            );
        }
        self.context.set_records(outcome.records);
        self.context.advance_to(PipelinePhase::DataLoaded);

        info!(processed, succeeded, deferred, "data loaded");
        Ok(PhaseSummary {
            phase: PipelinePhase::DataLoaded,
            processed,
            succeeded,
            deferred,
        })
    }

    /// Phase 2: acquire media for every record
    pub async fn enrich_media(&mut self) -> Result<PhaseSummary> {
        self.context
            .require_phase("enrich_media", PipelinePhase::DataLoaded)?;

        let results = self.coordinator.enrich(self.context.records()).await;

        if self.strict {
            if let Some(result) = results.iter().find(|r| !r.failures.is_empty()) {
                return Err(DeckError::StrictAbort {
                    record: result.record.to_string(),
                    reason: result.failures[0].clone(),
                });
            }
        }

        let processed = results.len();
        let mut succeeded = 0;
        let mut deferred = 0;
        for result in results {
            if result.failures.is_empty() {
                succeeded += 1;
            } else {
                deferred += 1;
                for failure in result.failures {
                    self.context
                        .defer(result.record.clone(), PipelinePhase::MediaEnriched, failure);
                }
            }
            if !result.assets.is_empty() {
                self.context.attach_assets(result.record, result.assets);
            }
        }
        self.context.advance_to(PipelinePhase::MediaEnriched);

        info!(
            processed,
            succeeded,
            deferred,
            cache_hits = self.cache.hits(),
            "media enriched"
        );
        Ok(PhaseSummary {
            phase: PipelinePhase::MediaEnriched,
            processed,
            succeeded,
            deferred,
        })
    }

    /// Phase 3: assemble cards from records and their media
    pub fn build_cards(&mut self) -> Result<PhaseSummary> {
        self.context
            .require_phase("build_cards", PipelinePhase::MediaEnriched)?;

        let mut cards = Vec::new();
        let mut failures: Vec<(RecordId, String)> = Vec::new();
        for record in self.context.records() {
            let assets = self.context.assets_for(record.id());
            match self.card_builder.build(record, assets) {
                Ok(card) => cards.push(card),
                Err(e) => {
                    if self.strict {
                        return Err(e);
                    }
                    failures.push((record.id().clone(), e.to_string()));
                }
            }
        }

        let processed = cards.len() + failures.len();
        let succeeded = cards.len();
        let deferred = failures.len();
        for (record, reason) in failures {
            self.context
                .defer(record, PipelinePhase::CardsBuilt, reason);
        }
        self.cards = cards;
        self.context.advance_to(PipelinePhase::CardsBuilt);

        info!(processed, succeeded, deferred, "cards built");
        Ok(PhaseSummary {
            phase: PipelinePhase::CardsBuilt,
            processed,
            succeeded,
            deferred,
        })
    }

    /// Phase 4: write the deck out
    pub async fn export_deck(&mut self) -> Result<PhaseSummary> {
        self.context
            .require_phase("export_deck", PipelinePhase::CardsBuilt)?;

        let artifact = self.exporter.export(&self.deck_name, &self.cards).await?;
        let card_count = artifact.card_count;
        self.artifact = Some(artifact);
        self.context.advance_to(PipelinePhase::DeckExported);

        Ok(PhaseSummary {
            phase: PipelinePhase::DeckExported,
            processed: card_count,
            succeeded: card_count,
            deferred: 0,
        })
    }

    /// Drive all four phases and report the outcome
    pub async fn run(&mut self) -> Result<BuildReport> {
        let summaries = vec![
            self.load_data()?,
            self.enrich_media().await?,
            self.build_cards()?,
            self.export_deck().await?,
        ];

        if self.cache_mode == CacheMode::Disk {
            if let Err(e) = self.cache.flush_to_disk(&self.cache_dir) {
                warn!(error = %e, "could not persist synthesis cache");
            }
        }

        let artifact = self
            .artifact
            .clone()
            .ok_or_else(|| DeckError::Export("export produced no artifact".to_string()))?;

        Ok(BuildReport {
            summaries,
            deferred: self.context.deferred().to_vec(),
            artifact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::EvaluationGate;
    use lexideck_deck::{DirectoryExporter, FieldTemplateCardBuilder};
    use lexideck_media::providers::mock::{
        MockAudioProvider, MockFailure, MockImageGenerationProvider, MockImageSearchProvider,
        ScriptedScorer,
    };
    use lexideck_media::{Thresholds, VoiceConfig};
    use lexideck_records::TomlRecordLoader;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicBool;

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("lexideck_pipeline_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_records(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("deck.records.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const VALID_RECORDS: &str = r#"
[[records]]
id = "noun-001"
language = "de"
[records.fields]
word = "Hund"
translation = "dog"

[[records]]
id = "noun-002"
language = "de"
[records.fields]
word = "Katze"
translation = "cat"
"#;

    const MIXED_RECORDS: &str = r#"
[[records]]
id = "noun-001"
language = "de"
[records.fields]
word = "Hund"
translation = "dog"

[[records]]
id = "broken-row"
[records.fields]
word = "Katze"
"#;

    fn pipeline(dir: &Path, records: &str, strict: bool) -> DeckPipeline {
        let records_path = write_records(dir, records);

        let mut config = LexideckConfig::default();
        config.build.strict = strict;
        config.build.worker_limit = 1;
        config.build.retry_attempts = 1;
        config.generation.audio_fields = vec!["word".to_string()];
        config.voices.insert(
            "de".to_string(),
            VoiceConfig {
                voice_id: "Marlene".to_string(),
                language_code: "de-DE".to_string(),
                engine: "standard".to_string(),
            },
        );

        let media_dir = dir.join("media");
        let cache = Arc::new(SynthesisCache::new());
        let gate = Arc::new(EvaluationGate::new(
            Arc::new(ScriptedScorer::constant(0.9)),
            Thresholds::default(),
        ));
        let coordinator = EnrichmentCoordinator::new(
            Arc::new(MockAudioProvider::new(&media_dir)),
            Arc::new(MockImageSearchProvider::new(&media_dir)),
            Arc::new(MockImageGenerationProvider::new(&media_dir)),
            gate,
            Arc::clone(&cache),
            &config,
            None,
            Arc::new(AtomicBool::new(false)),
        );

        DeckPipeline::new(
            "test-deck",
            Box::new(TomlRecordLoader::new(records_path)),
            coordinator,
            Box::new(FieldTemplateCardBuilder::new("{word}", "{translation}")),
            Box::new(DirectoryExporter::new(dir.join("out"))),
            cache,
            &config,
        )
    }

    #[tokio::test]
    async fn test_full_run_produces_deck() {
        let dir = temp_dir();
        let mut p = pipeline(&dir, VALID_RECORDS, false);

        let report = p.run().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.summaries.len(), 4);
        assert_eq!(report.artifact.card_count, 2);
        assert!(report.artifact.path.join("deck.json").exists());
        assert_eq!(p.phase(), PipelinePhase::DeckExported);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_operations_out_of_order_leave_state_unchanged() {
        let dir = temp_dir();
        let mut p = pipeline(&dir, VALID_RECORDS, false);

        let err = p.enrich_media().await.unwrap_err();
        assert!(matches!(err, DeckError::InvalidPhaseTransition { .. }));
        assert_eq!(p.phase(), PipelinePhase::Initialized);
        assert!(p.deferred().is_empty());

        assert!(p.build_cards().is_err());
        assert!(p.export_deck().await.is_err());
        assert_eq!(p.phase(), PipelinePhase::Initialized);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_operations_cannot_repeat() {
        let dir = temp_dir();
        let mut p = pipeline(&dir, VALID_RECORDS, false);

        p.load_data().unwrap();
        let err = p.load_data().unwrap_err();
        assert!(matches!(err, DeckError::InvalidPhaseTransition { .. }));
        assert_eq!(p.phase(), PipelinePhase::DataLoaded);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_malformed_row_defers_and_build_continues() {
        let dir = temp_dir();
        let mut p = pipeline(&dir, MIXED_RECORDS, false);

        let report = p.run().await.unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.artifact.card_count, 1);
        assert_eq!(report.deferred.len(), 1);
        assert_eq!(report.deferred[0].record, RecordId::new("broken-row"));
        assert_eq!(report.deferred[0].phase, PipelinePhase::DataLoaded);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_strict_load_aborts_before_phase_transition() {
        let dir = temp_dir();
        let mut p = pipeline(&dir, MIXED_RECORDS, true);

        let err = p.load_data().unwrap_err();
        assert!(matches!(err, DeckError::RecordValidation { .. }));
        assert_eq!(p.phase(), PipelinePhase::Initialized);
        assert!(p.deferred().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_strict_enrichment_failure_aborts_with_strict_error() {
        let dir = temp_dir();
        let records_path = write_records(&dir, VALID_RECORDS);
        let mut config = LexideckConfig::default();
        config.build.strict = true;
        config.build.worker_limit = 1;
        config.build.retry_attempts = 1;
        config.generation.audio_fields = vec![];

        let cache = Arc::new(SynthesisCache::new());
        let gate = Arc::new(EvaluationGate::new(
            Arc::new(ScriptedScorer::constant(0.9)),
            Thresholds::default(),
        ));
        let media_dir = dir.join("media");
        let coordinator = EnrichmentCoordinator::new(
            Arc::new(MockAudioProvider::new(&media_dir)),
            Arc::new(MockImageSearchProvider::failing(
                &media_dir,
                MockFailure::Permanent,
            )),
            Arc::new(MockImageGenerationProvider::failing(
                &media_dir,
                MockFailure::Permanent,
            )),
            gate,
            Arc::clone(&cache),
            &config,
            None,
            Arc::new(AtomicBool::new(false)),
        );
        let mut p = DeckPipeline::new(
            "test-deck",
            Box::new(TomlRecordLoader::new(records_path)),
            coordinator,
            Box::new(FieldTemplateCardBuilder::new("{word}", "{translation}")),
            Box::new(DirectoryExporter::new(dir.join("out"))),
            cache,
            &config,
        );

        p.load_data().unwrap();
        let err = p.enrich_media().await.unwrap_err();
        // a provider failure under strict mode is not a validation error
        assert!(matches!(err, DeckError::StrictAbort { .. }));
        assert_eq!(p.phase(), PipelinePhase::DataLoaded);
        assert!(p.deferred().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_card_build_failure_defers_record() {
        let dir = temp_dir();
        // the template wants a field the records don't have
        let records_path = write_records(&dir, VALID_RECORDS);
        let mut config = LexideckConfig::default();
        config.build.worker_limit = 1;
        config.generation.audio_fields = vec![];
        config.generation.image_stages = vec![];

        let cache = Arc::new(SynthesisCache::new());
        let gate = Arc::new(EvaluationGate::new(
            Arc::new(ScriptedScorer::constant(0.9)),
            Thresholds::default(),
        ));
        let media_dir = dir.join("media");
        let coordinator = EnrichmentCoordinator::new(
            Arc::new(MockAudioProvider::new(&media_dir)),
            Arc::new(MockImageSearchProvider::new(&media_dir)),
            Arc::new(MockImageGenerationProvider::new(&media_dir)),
            gate,
            Arc::clone(&cache),
            &config,
            None,
            Arc::new(AtomicBool::new(false)),
        );
        let mut p = DeckPipeline::new(
            "test-deck",
            Box::new(TomlRecordLoader::new(records_path)),
            coordinator,
            Box::new(FieldTemplateCardBuilder::new("{word}", "{gender}")),
            Box::new(DirectoryExporter::new(dir.join("out"))),
            cache,
            &config,
        );

        let report = p.run().await.unwrap();
        assert_eq!(report.artifact.card_count, 0);
        assert_eq!(report.deferred.len(), 2);
        assert!(report
            .deferred
            .iter()
            .all(|d| d.phase == PipelinePhase::CardsBuilt));

        std::fs::remove_dir_all(&dir).ok();
    }
}
