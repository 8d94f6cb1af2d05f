//! Lexideck Pipeline - The deck build pipeline core
//!
//! A strictly ordered phase machine (`DeckPipeline`) that loads
//! vocabulary records, enriches them with media through staged provider
//! acquisition, assembles cards, and exports the deck. Quality is
//! enforced by an `EvaluationGate` in front of every candidate, repeat
//! synthesis requests are deduplicated by the `SynthesisCache`, and the
//! `EnrichmentCoordinator` fans records out across bounded concurrent
//! workers.

pub mod cache;
pub mod context;
pub mod enrich;
pub mod gate;
pub mod orchestrator;
pub mod retry;

pub use cache::{StageOutcome, SynthesisCache};
pub use context::{BuildContext, DeferredFailure, PhaseSummary, PipelinePhase};
pub use enrich::{EnrichmentCoordinator, RecordEnrichment};
pub use gate::EvaluationGate;
pub use orchestrator::{BuildReport, DeckPipeline};
pub use retry::RetryPolicy;
