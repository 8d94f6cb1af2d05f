//! lexideck - flashcard deck builder
//!
//! Builds language-learning decks from vocabulary record files:
//! synthesizes pronunciation audio, acquires illustrative images through
//! staged search/generation, gates everything on a quality scorer, and
//! exports the finished deck.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexideck_deck::{DirectoryExporter, FieldTemplateCardBuilder};
use lexideck_media::{providers, CacheMode, LexideckConfig, StyleGuide};
use lexideck_pipeline::{DeckPipeline, EnrichmentCoordinator, EvaluationGate, SynthesisCache};
use lexideck_records::TomlRecordLoader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

const EXIT_CLEAN: i32 = 0;
const EXIT_FATAL: i32 = 1;
const EXIT_DEFERRED: i32 = 2;

#[derive(Parser)]
#[command(name = "lexideck")]
#[command(about = "Build flashcard decks with synthesized audio and images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a deck from a records file
    Build {
        /// Path to the records TOML file
        records: PathBuf,
        /// Deck name (also the export directory name)
        #[arg(long)]
        deck: String,
        /// Export root directory
        #[arg(long, default_value = "decks")]
        output: PathBuf,
        /// Directory where synthesized media lands before export
        #[arg(long, default_value = ".lexideck/media")]
        media_dir: PathBuf,
        /// Abort on the first per-record failure
        #[arg(long)]
        strict: bool,
        /// Use the offline mock backends for every capability
        #[arg(long)]
        mock: bool,
        /// Front card template, `{field}` placeholders
        #[arg(long, default_value = "{word}")]
        front: String,
        /// Back card template
        #[arg(long, default_value = "{translation}")]
        back: String,
    },
    /// Check provider configuration and availability
    Doctor,
    /// List the available provider backends
    Providers,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lexideck=info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Build {
            records,
            deck,
            output,
            media_dir,
            strict,
            mock,
            front,
            back,
        } => {
            build(
                records, &deck, &output, &media_dir, strict, mock, &front, &back,
            )
            .await
        }
        Commands::Doctor => doctor().await,
        Commands::Providers => {
            for (capability, names) in providers::available_providers() {
                println!("{:<18} {}", capability, names);
            }
            Ok(EXIT_CLEAN)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn build(
    records: PathBuf,
    deck: &str,
    output: &std::path::Path,
    media_dir: &std::path::Path,
    strict: bool,
    mock: bool,
    front: &str,
    back: &str,
) -> Result<i32> {
    let mut config = LexideckConfig::load().context("loading configuration")?;
    if strict {
        config.build.strict = true;
    }
    if mock {
        config.generation.audio_provider = "mock".to_string();
        config.generation.image_search_provider = "mock".to_string();
        config.generation.image_generation_provider = "mock".to_string();
        config.generation.scorer = "mock".to_string();
    }

    let audio = providers::create_audio_provider(&config.generation.audio_provider, &config, media_dir)?;
    let image_search = providers::create_image_search_provider(
        &config.generation.image_search_provider,
        &config,
        media_dir,
    )?;
    let image_generation = providers::create_image_generation_provider(
        &config.generation.image_generation_provider,
        &config,
        media_dir,
    )?;
    let scorer = providers::create_scorer(&config.generation.scorer, &config)?;

    let style = match &config.generation.style {
        Some(name) => Some(StyleGuide::find(name)?),
        None => None,
    };

    let cache = Arc::new(match config.build.cache_mode {
        CacheMode::Disk => SynthesisCache::load_from_disk(&config.build.cache_dir),
        CacheMode::Memory => SynthesisCache::new(),
    });

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight records");
            cancel_signal.store(true, Ordering::SeqCst);
        }
    });

    let gate = Arc::new(EvaluationGate::new(
        scorer,
        config.generation.thresholds.clone(),
    ));
    let coordinator = EnrichmentCoordinator::new(
        audio,
        image_search,
        image_generation,
        gate,
        Arc::clone(&cache),
        &config,
        style,
        cancel,
    );

    let mut pipeline = DeckPipeline::new(
        deck,
        Box::new(TomlRecordLoader::new(records)),
        coordinator,
        Box::new(FieldTemplateCardBuilder::new(front, back)),
        Box::new(DirectoryExporter::new(output)),
        cache,
        &config,
    );

    let report = pipeline.run().await.context("deck build failed")?;

    info!(
        deck = deck,
        cards = report.artifact.card_count,
        media = report.artifact.media_count,
        path = %report.artifact.path.display(),
        "build complete"
    );

    if report.is_clean() {
        Ok(EXIT_CLEAN)
    } else {
        for failure in &report.deferred {
            warn!(record = %failure.record, phase = %failure.phase, "{}", failure.reason);
        }
        warn!(
            deferred = report.deferred.len(),
            "build completed with deferred failures"
        );
        Ok(EXIT_DEFERRED)
    }
}

async fn doctor() -> Result<i32> {
    let config = LexideckConfig::load().context("loading configuration")?;
    let media_dir = std::env::temp_dir();

    println!("lexideck doctor\n");
    let mut problems = 0;

    match providers::create_audio_provider(&config.generation.audio_provider, &config, &media_dir) {
        Ok(p) => {
            let status = p.health_check().await;
            println!("audio ({}): {:?}", p.name(), status);
        }
        Err(e) => {
            problems += 1;
            println!("audio ({}): {}", config.generation.audio_provider, e);
        }
    }

    match providers::create_image_search_provider(
        &config.generation.image_search_provider,
        &config,
        &media_dir,
    ) {
        Ok(p) => {
            let status = p.health_check().await;
            println!("image search ({}): {:?}", p.name(), status);
        }
        Err(e) => {
            problems += 1;
            println!(
                "image search ({}): {}",
                config.generation.image_search_provider, e
            );
        }
    }

    match providers::create_image_generation_provider(
        &config.generation.image_generation_provider,
        &config,
        &media_dir,
    ) {
        Ok(p) => {
            let status = p.health_check().await;
            println!("image generation ({}): {:?}", p.name(), status);
        }
        Err(e) => {
            problems += 1;
            println!(
                "image generation ({}): {}",
                config.generation.image_generation_provider, e
            );
        }
    }

    match providers::create_scorer(&config.generation.scorer, &config) {
        Ok(p) => println!("scorer ({}): configured", p.name()),
        Err(e) => {
            problems += 1;
            println!("scorer ({}): {}", config.generation.scorer, e);
        }
    }

    if problems == 0 {
        println!("\nall capabilities configured");
        Ok(EXIT_CLEAN)
    } else {
        println!("\n{} capability problem(s)", problems);
        Ok(EXIT_FATAL)
    }
}
