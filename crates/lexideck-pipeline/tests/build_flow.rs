//! End-to-end deck build against mock backends

use lexideck_deck::{DirectoryExporter, FieldTemplateCardBuilder};
use lexideck_media::providers::mock::{
    MockAudioProvider, MockImageGenerationProvider, MockImageSearchProvider, ScriptedScorer,
};
use lexideck_media::{LexideckConfig, Thresholds, VoiceConfig};
use lexideck_pipeline::{DeckPipeline, EnrichmentCoordinator, EvaluationGate, PipelinePhase, SynthesisCache};
use lexideck_records::TomlRecordLoader;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lexideck_build_flow_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

const RECORDS: &str = r#"
[[records]]
id = "noun-001"
language = "de"
[records.fields]
word = "Hund"
translation = "dog"
example = "Der Hund schläft."

[[records]]
id = "noun-002"
language = "de"
[records.fields]
word = "Katze"
translation = "cat"
example = "Die Katze miaut."

[[records]]
id = "noun-003"
language = "de"
[records.fields]
word = "Hund"
translation = "dog (duplicate)"
example = "Der Hund schläft."
"#;

fn test_config() -> LexideckConfig {
    let mut config = LexideckConfig::default();
    config.build.worker_limit = 4;
    config.build.retry_attempts = 1;
    config.voices.insert(
        "de".to_string(),
        VoiceConfig {
            voice_id: "Marlene".to_string(),
            language_code: "de-DE".to_string(),
            engine: "standard".to_string(),
        },
    );
    config
}

struct Harness {
    dir: PathBuf,
    audio: Arc<MockAudioProvider>,
    search: Arc<MockImageSearchProvider>,
    cache: Arc<SynthesisCache>,
    pipeline: DeckPipeline,
}

fn harness(records: &str, config: LexideckConfig) -> Harness {
    let dir = temp_dir();
    let records_path = dir.join("deck.records.toml");
    let mut f = std::fs::File::create(&records_path).unwrap();
    f.write_all(records.as_bytes()).unwrap();

    let media_dir = dir.join("media");
    let audio = Arc::new(MockAudioProvider::new(&media_dir));
    let search = Arc::new(MockImageSearchProvider::new(&media_dir));
    let generate = Arc::new(MockImageGenerationProvider::new(&media_dir));
    let cache = Arc::new(SynthesisCache::new());
    let gate = Arc::new(EvaluationGate::new(
        Arc::new(ScriptedScorer::constant(0.9)),
        Thresholds::default(),
    ));
    let coordinator = EnrichmentCoordinator::new(
        Arc::clone(&audio) as _,
        Arc::clone(&search) as _,
        generate,
        gate,
        Arc::clone(&cache),
        &config,
        None,
        Arc::new(AtomicBool::new(false)),
    );
    let pipeline = DeckPipeline::new(
        "german-a1",
        Box::new(TomlRecordLoader::new(records_path)),
        coordinator,
        Box::new(FieldTemplateCardBuilder::new(
            "{word}",
            "{translation} — {example}",
        )),
        Box::new(DirectoryExporter::new(dir.join("decks"))),
        Arc::clone(&cache),
        &config,
    );

    Harness {
        dir,
        audio,
        search,
        cache,
        pipeline,
    }
}

fn cleanup(dir: &Path) {
    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn full_build_exports_every_record() {
    let mut h = harness(RECORDS, test_config());

    let report = h.pipeline.run().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.artifact.card_count, 3);
    assert_eq!(h.pipeline.phase(), PipelinePhase::DeckExported);

    let deck_json = std::fs::read_to_string(report.artifact.path.join("deck.json")).unwrap();
    let deck: serde_json::Value = serde_json::from_str(&deck_json).unwrap();
    assert_eq!(deck["name"], "german-a1");
    assert_eq!(deck["cards"].as_array().unwrap().len(), 3);
    // every exported media uri is deck-relative and present on disk
    for card in deck["cards"].as_array().unwrap() {
        for asset in card["media"].as_array().unwrap() {
            let uri = asset["handle"]["uri"].as_str().unwrap();
            assert!(uri.starts_with("media/"));
            assert!(report.artifact.path.join(uri).exists());
        }
    }

    cleanup(&h.dir);
}

#[tokio::test]
async fn duplicate_synthesis_requests_are_served_from_cache() {
    let mut h = harness(RECORDS, test_config());

    h.pipeline.run().await.unwrap();

    // "Hund" and "Der Hund schläft." appear in two records each; the
    // cache collapses them to one synthesis per distinct text
    assert_eq!(h.audio.calls(), 4);
    assert!(h.cache.hits() >= 2);
    // image queries: "Hund" twice, "Katze" once -> two searches
    assert_eq!(h.search.calls(), 2);

    cleanup(&h.dir);
}

#[tokio::test]
async fn phases_can_be_driven_individually() {
    let mut h = harness(RECORDS, test_config());

    let s1 = h.pipeline.load_data().unwrap();
    assert_eq!(s1.processed, 3);
    assert_eq!(h.pipeline.phase(), PipelinePhase::DataLoaded);

    let s2 = h.pipeline.enrich_media().await.unwrap();
    assert_eq!(s2.succeeded, 3);

    let s3 = h.pipeline.build_cards().unwrap();
    assert_eq!(s3.succeeded, 3);
    assert_eq!(h.pipeline.cards().len(), 3);

    let s4 = h.pipeline.export_deck().await.unwrap();
    assert_eq!(s4.processed, 3);
    assert_eq!(h.pipeline.phase(), PipelinePhase::DeckExported);

    cleanup(&h.dir);
}

#[tokio::test]
async fn skipping_a_phase_is_rejected_without_side_effects() {
    let mut h = harness(RECORDS, test_config());

    h.pipeline.load_data().unwrap();
    // jumping straight to cards must fail and not move the phase
    assert!(h.pipeline.build_cards().is_err());
    assert_eq!(h.pipeline.phase(), PipelinePhase::DataLoaded);
    assert!(h.pipeline.cards().is_empty());

    cleanup(&h.dir);
}
