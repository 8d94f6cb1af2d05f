//! Mock backends for testing and offline builds
//!
//! Generate real bytes locally (silence WAV, solid-colour PNG) without
//! any network calls. Every mock counts its invocations so tests can
//! assert cache and coalescing behaviour, and can be switched into a
//! failing mode to exercise fallback paths.

use crate::provider::{
    AudioSynthesisProvider, EvaluationError, EvaluationResult, ImageGenerationProvider,
    ImageSearchProvider, MediaCandidate, MediaHandle, MediaKind, MediaScorer, ProviderError,
    ProviderStatus, VoiceConfig,
};
use crate::style::StyleGuide;
use async_trait::async_trait;
use lexideck_core::Fingerprint;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// How a mock should fail, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    None,
    Transient,
    Permanent,
}

fn mock_failure(provider: &str, mode: MockFailure) -> Option<ProviderError> {
    match mode {
        MockFailure::None => None,
        MockFailure::Transient => Some(ProviderError::transient(provider, "mock transient failure")),
        MockFailure::Permanent => Some(ProviderError::permanent(provider, "mock permanent failure")),
    }
}

/// Mock TTS backend writing silence WAV files
pub struct MockAudioProvider {
    media_dir: PathBuf,
    calls: AtomicUsize,
    failure: MockFailure,
}

impl MockAudioProvider {
    pub fn new<P: AsRef<Path>>(media_dir: P) -> Self {
        Self {
            media_dir: media_dir.as_ref().to_path_buf(),
            calls: AtomicUsize::new(0),
            failure: MockFailure::None,
        }
    }

    pub fn failing<P: AsRef<Path>>(media_dir: P, failure: MockFailure) -> Self {
        Self {
            failure,
            ..Self::new(media_dir)
        }
    }

    /// Number of synthesize calls observed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSynthesisProvider for MockAudioProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> ProviderStatus {
        ProviderStatus::Available
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<MediaHandle, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = mock_failure("mock", self.failure) {
            return Err(err);
        }

        let stem = Fingerprint::from_bytes(format!("{}|{}", text, voice.voice_id).as_bytes());
        let path = self.media_dir.join(format!("{}.wav", stem));
        write_silence_wav(&path, 1.0)
            .map_err(|e| ProviderError::permanent("mock", e.to_string()))?;

        Ok(MediaHandle {
            uri: path.to_string_lossy().to_string(),
            content_hash: std::fs::read(&path)
                .ok()
                .map(|b| Fingerprint::from_bytes(&b).to_hex()),
        })
    }
}

/// Mock image search backend writing solid-colour PNGs
pub struct MockImageSearchProvider {
    media_dir: PathBuf,
    calls: AtomicUsize,
    failure: MockFailure,
}

impl MockImageSearchProvider {
    pub fn new<P: AsRef<Path>>(media_dir: P) -> Self {
        Self {
            media_dir: media_dir.as_ref().to_path_buf(),
            calls: AtomicUsize::new(0),
            failure: MockFailure::None,
        }
    }

    pub fn failing<P: AsRef<Path>>(media_dir: P, failure: MockFailure) -> Self {
        Self {
            failure,
            ..Self::new(media_dir)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSearchProvider for MockImageSearchProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> ProviderStatus {
        ProviderStatus::Available
    }

    async fn search(&self, query: &str) -> Result<MediaHandle, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = mock_failure("mock", self.failure) {
            return Err(err);
        }

        let stem = Fingerprint::from_bytes(query.as_bytes());
        let path = self.media_dir.join(format!("{}.png", stem));
        write_solid_png(&path, query, 64, 64)
            .map_err(|e| ProviderError::permanent("mock", e))?;

        Ok(MediaHandle {
            uri: path.to_string_lossy().to_string(),
            content_hash: std::fs::read(&path)
                .ok()
                .map(|b| Fingerprint::from_bytes(&b).to_hex()),
        })
    }
}

/// Mock image generation backend writing solid-colour PNGs
pub struct MockImageGenerationProvider {
    media_dir: PathBuf,
    calls: AtomicUsize,
    failure: MockFailure,
}

impl MockImageGenerationProvider {
    pub fn new<P: AsRef<Path>>(media_dir: P) -> Self {
        Self {
            media_dir: media_dir.as_ref().to_path_buf(),
            calls: AtomicUsize::new(0),
            failure: MockFailure::None,
        }
    }

    pub fn failing<P: AsRef<Path>>(media_dir: P, failure: MockFailure) -> Self {
        Self {
            failure,
            ..Self::new(media_dir)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerationProvider for MockImageGenerationProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> ProviderStatus {
        ProviderStatus::Available
    }

    async fn generate(
        &self,
        prompt: &str,
        _style: Option<&StyleGuide>,
    ) -> Result<MediaHandle, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = mock_failure("mock", self.failure) {
            return Err(err);
        }

        let stem = Fingerprint::from_bytes(prompt.as_bytes());
        let path = self.media_dir.join(format!("{}.png", stem));
        write_solid_png(&path, prompt, 128, 96)
            .map_err(|e| ProviderError::permanent("mock", e))?;

        Ok(MediaHandle {
            uri: path.to_string_lossy().to_string(),
            content_hash: std::fs::read(&path)
                .ok()
                .map(|b| Fingerprint::from_bytes(&b).to_hex()),
        })
    }
}

/// A scorer that replays a scripted sequence of scores, then a default.
///
/// Lets tests force "stage 1 rejected, stage 2 accepted" shapes without
/// a remote judge.
pub struct ScriptedScorer {
    scores: Mutex<VecDeque<f64>>,
    default: f64,
    calls: AtomicUsize,
}

impl ScriptedScorer {
    /// Replays `scores` in order, then returns `default` forever
    pub fn new(scores: Vec<f64>, default: f64) -> Self {
        Self {
            scores: Mutex::new(scores.into()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns the same score
    pub fn constant(score: f64) -> Self {
        Self::new(Vec::new(), score)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaScorer for ScriptedScorer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn score(
        &self,
        _candidate: &MediaCandidate,
        _kind: MediaKind,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = self
            .scores
            .lock()
            .ok()
            .and_then(|mut scripted| scripted.pop_front())
            .unwrap_or(self.default);
        Ok(EvaluationResult {
            score: score.clamp(0.0, 1.0),
            accepted: false,
            rationale: None,
        })
    }
}

/// A scorer whose transport always fails, for `EvaluationError` paths
pub struct UnavailableScorer;

#[async_trait]
impl MediaScorer for UnavailableScorer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn score(
        &self,
        _candidate: &MediaCandidate,
        _kind: MediaKind,
    ) -> Result<EvaluationResult, EvaluationError> {
        Err(EvaluationError("mock scorer offline".to_string()))
    }
}

/// Write a WAV file of silence
fn write_silence_wav(path: &Path, duration_secs: f64) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let sample_rate: u32 = 44100;
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let num_samples = (sample_rate as f64 * duration_secs) as u32;
    let data_size = num_samples * (bits_per_sample / 8) as u32 * num_channels as u32;

    let mut file = std::fs::File::create(path)?;
    use std::io::Write;

    // RIFF header
    file.write_all(b"RIFF")?;
    file.write_all(&(36 + data_size).to_le_bytes())?;
    file.write_all(b"WAVE")?;

    // fmt chunk
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?; // PCM
    file.write_all(&num_channels.to_le_bytes())?;
    file.write_all(&sample_rate.to_le_bytes())?;
    let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
    file.write_all(&byte_rate.to_le_bytes())?;
    let block_align = num_channels * (bits_per_sample / 8);
    file.write_all(&block_align.to_le_bytes())?;
    file.write_all(&bits_per_sample.to_le_bytes())?;

    // data chunk
    file.write_all(b"data")?;
    file.write_all(&data_size.to_le_bytes())?;
    file.write_all(&vec![0u8; data_size as usize])?;

    Ok(())
}

/// Write a solid-colour PNG with the colour derived from the seed text
fn write_solid_png(path: &Path, seed: &str, width: u32, height: u32) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let hash_val = seed
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let r = ((hash_val >> 16) & 0xFF) as u8;
    let g = ((hash_val >> 8) & 0xFF) as u8;
    let b = (hash_val & 0xFF) as u8;

    let mut img_data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..(width * height) {
        img_data.extend_from_slice(&[r, g, b, 255]);
    }

    let img = image::RgbaImage::from_raw(width, height, img_data)
        .ok_or_else(|| "failed to create image buffer".to_string())?;
    img.save(path).map_err(|e| e.to_string())?;
    Ok(())
}
