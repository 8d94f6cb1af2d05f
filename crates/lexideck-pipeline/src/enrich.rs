//! The enrichment coordinator
//!
//! Fans records out across a bounded set of concurrent workers and runs
//! staged media acquisition for each: audio synthesis per configured
//! field, then the ordered image stage list (search before generation
//! by default). Within one record the stages run strictly in order; the
//! first stage whose candidate passes the gate wins. If every stage is
//! rejected, the highest-scoring candidate is attached flagged as below
//! threshold; if no stage produced a scored candidate at all, the
//! record defers with nothing attached.
//!
//! Workers return their results to the caller, which folds them into
//! the build context after the barrier. Nothing here mutates shared
//! build state.

use crate::cache::{StageOutcome, SynthesisCache};
use crate::gate::EvaluationGate;
use crate::retry::RetryPolicy;
use futures::stream::{self, StreamExt};
use lexideck_core::{Fingerprint, RecordId};
use lexideck_media::{
    AudioSynthesisProvider, EvaluationError, ImageGenerationProvider, ImageSearchProvider,
    LexideckConfig, MediaAsset, MediaCandidate, MediaKind, ProviderError, StyleGuide, VoiceConfig,
};
use lexideck_records::Record;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// One record's enrichment result, recombined by id at the barrier
#[derive(Debug)]
pub struct RecordEnrichment {
    pub record: RecordId,
    /// Attached atomically: empty unless the whole acquisition ran
    pub assets: Vec<MediaAsset>,
    pub failures: Vec<String>,
}

pub struct EnrichmentCoordinator {
    audio: Arc<dyn AudioSynthesisProvider>,
    image_search: Arc<dyn ImageSearchProvider>,
    image_generation: Arc<dyn ImageGenerationProvider>,
    gate: Arc<EvaluationGate>,
    cache: Arc<SynthesisCache>,
    retry: RetryPolicy,
    worker_limit: usize,
    audio_fields: Vec<String>,
    image_query_field: String,
    image_stages: Vec<String>,
    voices: HashMap<String, VoiceConfig>,
    style: Option<StyleGuide>,
    /// One concurrency budget per provider name
    semaphores: HashMap<String, Arc<Semaphore>>,
    cancel: Arc<AtomicBool>,
}

impl EnrichmentCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        audio: Arc<dyn AudioSynthesisProvider>,
        image_search: Arc<dyn ImageSearchProvider>,
        image_generation: Arc<dyn ImageGenerationProvider>,
        gate: Arc<EvaluationGate>,
        cache: Arc<SynthesisCache>,
        config: &LexideckConfig,
        style: Option<StyleGuide>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let mut semaphores = HashMap::new();
        let limit = config.build.provider_concurrency.max(1);
        for name in [audio.name(), image_search.name(), image_generation.name()] {
            semaphores
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(limit)));
        }

        Self {
            audio,
            image_search,
            image_generation,
            gate,
            cache,
            retry: RetryPolicy::from_config(&config.build),
            worker_limit: config.build.worker_limit.max(1),
            audio_fields: config.generation.audio_fields.clone(),
            image_query_field: config.generation.image_query_field.clone(),
            image_stages: config.generation.image_stages.clone(),
            voices: config.voices.clone(),
            style,
            semaphores,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Enrich all records concurrently, bounded by the worker limit.
    /// Results arrive out of completion order; callers key on record id.
    pub async fn enrich(&self, records: &[Record]) -> Vec<RecordEnrichment> {
        stream::iter(records)
            .map(|record| self.enrich_record(record))
            .buffer_unordered(self.worker_limit)
            .collect()
            .await
    }

    /// Run the full acquisition for one record. Assets are returned only
    /// if the record ran to completion; a cancellation mid-record
    /// attaches nothing.
    async fn enrich_record(&self, record: &Record) -> RecordEnrichment {
        let mut assets = Vec::new();
        let mut failures = Vec::new();

        for field in &self.audio_fields {
            if self.cancelled() {
                return Self::interrupted(record);
            }
            let Some(text) = record.field(field) else {
                continue;
            };
            match self.acquire_audio(record, text).await {
                Ok(outcome) => match outcome {
                    StageOutcome::Accepted(asset) => assets.push(asset),
                    StageOutcome::Rejected(mut asset) => {
                        // single-stage kind: the rejected candidate is
                        // also the best-of fallback
                        asset.below_threshold = true;
                        warn!(record = %record.id(), field = %field, score = asset.score, "audio below threshold, attaching flagged fallback");
                        assets.push(asset);
                    }
                    StageOutcome::ProviderFailed(e) => {
                        failures.push(format!("audio '{}': {}", field, e));
                    }
                    StageOutcome::EvaluationFailed(e) => {
                        failures.push(format!("audio '{}': {}", field, e));
                    }
                },
                Err(reason) => failures.push(reason),
            }
        }

        if self.cancelled() {
            return Self::interrupted(record);
        }

        // an empty stage list means the deck carries no images at all
        if !self.image_stages.is_empty() {
            match record.field(&self.image_query_field) {
                Some(query) => match self.acquire_image(record, query).await {
                    Some(result) => match result {
                        ImageAcquisition::Done(asset) => assets.push(asset),
                        ImageAcquisition::Exhausted(reasons) => {
                            failures.push(format!("image: {}", reasons.join("; ")));
                        }
                    },
                    None => return Self::interrupted(record),
                },
                None => {
                    failures.push(format!(
                        "image: record has no '{}' field",
                        self.image_query_field
                    ));
                }
            }
        }

        RecordEnrichment {
            record: record.id().clone(),
            assets,
            failures,
        }
    }

    fn interrupted(record: &Record) -> RecordEnrichment {
        RecordEnrichment {
            record: record.id().clone(),
            assets: Vec::new(),
            failures: vec!["build cancelled before enrichment completed".to_string()],
        }
    }

    /// Synthesize one audio segment through the cache
    async fn acquire_audio(
        &self,
        record: &Record,
        text: &str,
    ) -> Result<StageOutcome, String> {
        let voice = self.voices.get(record.language()).ok_or_else(|| {
            format!(
                "audio: no voice configured for language '{}'",
                record.language()
            )
        })?;

        let params = serde_json::json!({
            "text": text,
            "voice_id": voice.voice_id,
            "language_code": voice.language_code,
            "engine": voice.engine,
        });
        let fingerprint = Fingerprint::of_request(self.audio.name(), &params, 0);

        let outcome = self
            .cache
            .get_or_compute(fingerprint, || self.synthesize_and_score(text, voice))
            .await;
        Ok(outcome)
    }

    async fn synthesize_and_score(&self, text: &str, voice: &VoiceConfig) -> StageOutcome {
        let handle = {
            let Ok(_permit) = self.semaphore(self.audio.name()).acquire().await else {
                return StageOutcome::ProviderFailed(ProviderError::permanent(
                    self.audio.name(),
                    "provider concurrency limiter closed",
                ));
            };
            match self
                .retry
                .run(
                    "synthesize",
                    || self.audio.synthesize(text, voice),
                    |e: &ProviderError| e.transient,
                )
                .await
            {
                Ok(handle) => handle,
                Err(e) => return StageOutcome::ProviderFailed(e),
            }
        };

        let candidate = MediaCandidate {
            kind: MediaKind::Audio,
            handle,
            provider: self.audio.name().to_string(),
            prompt: text.to_string(),
        };
        self.score_candidate(candidate, MediaKind::Audio, 0).await
    }

    /// Walk the ordered image stage list. `None` means the record was
    /// interrupted by cancellation.
    async fn acquire_image(&self, record: &Record, query: &str) -> Option<ImageAcquisition> {
        let mut scored: Vec<MediaAsset> = Vec::new();
        let mut reasons: Vec<String> = Vec::new();

        for (stage, name) in self.image_stages.iter().enumerate() {
            if self.cancelled() {
                return None;
            }

            let outcome = match name.as_str() {
                "search" => self.search_and_score(query, stage).await,
                "generate" => self.generate_and_score(query, stage).await,
                other => {
                    reasons.push(format!("unknown stage '{}'", other));
                    continue;
                }
            };

            match outcome {
                StageOutcome::Accepted(asset) => {
                    debug!(record = %record.id(), stage, "image stage accepted");
                    return Some(ImageAcquisition::Done(asset));
                }
                StageOutcome::Rejected(asset) => {
                    debug!(record = %record.id(), stage, score = asset.score, "image stage rejected, escalating");
                    reasons.push(format!("stage {} scored {:.2}", stage, asset.score));
                    scored.push(asset);
                }
                StageOutcome::ProviderFailed(e) => {
                    reasons.push(format!("stage {}: {}", stage, e));
                }
                StageOutcome::EvaluationFailed(e) => {
                    reasons.push(format!("stage {}: {}", stage, e));
                }
            }
        }

        // Only scored candidates compete for best-of
        let best = scored
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score));
        match best {
            Some(mut asset) => {
                asset.below_threshold = true;
                warn!(record = %record.id(), score = asset.score, stage = asset.stage, "no image stage met threshold, attaching best-of fallback");
                Some(ImageAcquisition::Done(asset))
            }
            None => Some(ImageAcquisition::Exhausted(reasons)),
        }
    }

    async fn search_and_score(&self, query: &str, stage: usize) -> StageOutcome {
        let params = serde_json::json!({ "query": query });
        let fingerprint = Fingerprint::of_request(self.image_search.name(), &params, stage);

        self.cache
            .get_or_compute(fingerprint, || async move {
                let handle = {
                    let Ok(_permit) = self.semaphore(self.image_search.name()).acquire().await
                    else {
                        return StageOutcome::ProviderFailed(ProviderError::permanent(
                            self.image_search.name(),
                            "provider concurrency limiter closed",
                        ));
                    };
                    match self
                        .retry
                        .run(
                            "image-search",
                            || self.image_search.search(query),
                            |e: &ProviderError| e.transient,
                        )
                        .await
                    {
                        Ok(handle) => handle,
                        Err(e) => return StageOutcome::ProviderFailed(e),
                    }
                };

                let candidate = MediaCandidate {
                    kind: MediaKind::Image,
                    handle,
                    provider: self.image_search.name().to_string(),
                    prompt: query.to_string(),
                };
                self.score_candidate(candidate, MediaKind::Image, stage).await
            })
            .await
    }

    async fn generate_and_score(&self, query: &str, stage: usize) -> StageOutcome {
        // the style feeds the fingerprint: the same prompt under a
        // different style is a different request
        let params = serde_json::json!({
            "prompt": query,
            "style": self.style.as_ref().map(|s| s.name.as_str()),
        });
        let fingerprint = Fingerprint::of_request(self.image_generation.name(), &params, stage);

        self.cache
            .get_or_compute(fingerprint, || async move {
                let handle = {
                    let Ok(_permit) =
                        self.semaphore(self.image_generation.name()).acquire().await
                    else {
                        return StageOutcome::ProviderFailed(ProviderError::permanent(
                            self.image_generation.name(),
                            "provider concurrency limiter closed",
                        ));
                    };
                    match self
                        .retry
                        .run(
                            "image-generate",
                            || self.image_generation.generate(query, self.style.as_ref()),
                            |e: &ProviderError| e.transient,
                        )
                        .await
                    {
                        Ok(handle) => handle,
                        Err(e) => return StageOutcome::ProviderFailed(e),
                    }
                };

                let candidate = MediaCandidate {
                    kind: MediaKind::Image,
                    handle,
                    provider: self.image_generation.name().to_string(),
                    prompt: query.to_string(),
                };
                self.score_candidate(candidate, MediaKind::Image, stage).await
            })
            .await
    }

    /// Evaluate a candidate through the gate. Scorer transport failures
    /// retry like transient provider errors.
    async fn score_candidate(
        &self,
        candidate: MediaCandidate,
        kind: MediaKind,
        stage: usize,
    ) -> StageOutcome {
        let result = self
            .retry
            .run(
                "score",
                || self.gate.evaluate(&candidate, kind),
                |_: &EvaluationError| true,
            )
            .await;

        match result {
            Ok(evaluation) => {
                let asset = MediaAsset {
                    kind,
                    handle: candidate.handle,
                    provider: candidate.provider,
                    score: evaluation.score,
                    stage,
                    below_threshold: false,
                };
                if evaluation.accepted {
                    StageOutcome::Accepted(asset)
                } else {
                    StageOutcome::Rejected(asset)
                }
            }
            Err(e) => StageOutcome::EvaluationFailed(e),
        }
    }

    fn semaphore(&self, provider: &str) -> &Semaphore {
        // every provider name was registered in the constructor
        self.semaphores
            .get(provider)
            .map(|s| s.as_ref())
            .unwrap_or_else(|| {
                static FALLBACK: Semaphore = Semaphore::const_new(1);
                &FALLBACK
            })
    }
}

enum ImageAcquisition {
    Done(MediaAsset),
    Exhausted(Vec<String>),
}
