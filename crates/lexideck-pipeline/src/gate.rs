//! The evaluation gate
//!
//! Every candidate passes through here before it may be attached to a
//! record. The gate owns the per-kind thresholds and delegates scoring
//! to the pluggable `MediaScorer`; it keeps no call history. A scorer
//! transport failure is an `EvaluationError`, which callers retry; a
//! low score is a rejection, which callers fall back on.

use lexideck_media::{
    EvaluationError, EvaluationResult, MediaCandidate, MediaKind, MediaScorer, Thresholds,
};
use std::sync::Arc;
use tracing::debug;

pub struct EvaluationGate {
    scorer: Arc<dyn MediaScorer>,
    thresholds: Thresholds,
}

impl EvaluationGate {
    pub fn new(scorer: Arc<dyn MediaScorer>, thresholds: Thresholds) -> Self {
        Self { scorer, thresholds }
    }

    pub fn threshold_for(&self, kind: MediaKind) -> f64 {
        self.thresholds.for_kind(kind)
    }

    /// Score a candidate and apply the kind's threshold
    pub async fn evaluate(
        &self,
        candidate: &MediaCandidate,
        kind: MediaKind,
    ) -> Result<EvaluationResult, EvaluationError> {
        let mut result = self.scorer.score(candidate, kind).await?;
        let threshold = self.thresholds.for_kind(kind);
        result.accepted = result.score >= threshold;

        debug!(
            kind = %kind,
            provider = %candidate.provider,
            score = result.score,
            threshold,
            accepted = result.accepted,
            "candidate evaluated"
        );

        Ok(result)
    }
}
