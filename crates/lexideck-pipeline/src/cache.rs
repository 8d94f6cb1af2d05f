//! The synthesis cache
//!
//! Keyed by request fingerprint. Two jobs run here: suppressing repeat
//! provider calls for identical requests across the run, and coalescing
//! concurrent identical requests so exactly one provider invocation
//! serves all of them.
//!
//! Only accepted outcomes are retained as reusable entries. A rejected
//! or failed outcome is still shared with callers that were waiting on
//! the same in-flight computation, but the next independent request for
//! that fingerprint recomputes.

use dashmap::DashMap;
use lexideck_core::{DeckError, Fingerprint};
use lexideck_media::{EvaluationError, MediaAsset, ProviderError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// What one acquisition stage produced for one fingerprint.
///
/// Cloneable so one computation's outcome can be handed to every
/// coalesced waiter.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Scored at or above the threshold
    Accepted(MediaAsset),
    /// Scored below the threshold; kept around as best-of material
    Rejected(MediaAsset),
    ProviderFailed(ProviderError),
    EvaluationFailed(EvaluationError),
}

impl StageOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StageOutcome::Accepted(_))
    }

    /// The scored candidate, if this outcome produced one
    pub fn scored_asset(&self) -> Option<&MediaAsset> {
        match self {
            StageOutcome::Accepted(a) | StageOutcome::Rejected(a) => Some(a),
            _ => None,
        }
    }
}

enum Slot {
    /// A previously accepted result, reusable without a provider call
    Ready(MediaAsset),
    /// A computation in progress; waiters receive its outcome
    InFlight(watch::Receiver<Option<StageOutcome>>),
}

/// On-disk index shape for `CacheMode::Disk`
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndexFile {
    #[serde(default)]
    entries: Vec<CacheEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    fingerprint: String,
    asset: MediaAsset,
}

#[derive(Default)]
pub struct SynthesisCache {
    slots: DashMap<Fingerprint, Slot>,
    hits: AtomicUsize,
}

impl SynthesisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted entries from `dir/index.toml`.
    ///
    /// A corrupt index or a corrupt row never fails the build: the
    /// affected fingerprints just recompute.
    pub fn load_from_disk<P: AsRef<Path>>(dir: P) -> Self {
        let cache = Self::new();
        let index_path = dir.as_ref().join("index.toml");
        let content = match std::fs::read_to_string(&index_path) {
            Ok(c) => c,
            Err(_) => return cache,
        };

        let index: CacheIndexFile = match toml::from_str(&content) {
            Ok(i) => i,
            Err(e) => {
                warn!(path = %index_path.display(), error = %e, "cache index unreadable, starting empty");
                return cache;
            }
        };

        for entry in index.entries {
            let Some(fingerprint) = Fingerprint::from_hex(&entry.fingerprint) else {
                let err = DeckError::CacheCorruption(entry.fingerprint.clone());
                warn!(error = %err, "bypassing cache entry");
                continue;
            };
            if !Path::new(&entry.asset.handle.uri).exists() {
                debug!(fingerprint = %fingerprint, "cached media file missing, entry skipped");
                continue;
            }
            cache.slots.insert(fingerprint, Slot::Ready(entry.asset));
        }
        cache
    }

    /// Persist the accepted entries to `dir/index.toml`
    pub fn flush_to_disk<P: AsRef<Path>>(&self, dir: P) -> lexideck_core::Result<()> {
        let entries: Vec<CacheEntry> = self
            .slots
            .iter()
            .filter_map(|item| match item.value() {
                Slot::Ready(asset) => Some(CacheEntry {
                    fingerprint: item.key().to_hex(),
                    asset: asset.clone(),
                }),
                Slot::InFlight(_) => None,
            })
            .collect();

        std::fs::create_dir_all(dir.as_ref())?;
        let toml = toml::to_string_pretty(&CacheIndexFile { entries })?;
        std::fs::write(dir.as_ref().join("index.toml"), toml)?;
        Ok(())
    }

    /// Number of reusable (accepted) entries
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|item| matches!(item.value(), Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests served without a provider call
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Drop every entry. The only way entries leave the cache.
    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Return the outcome for `fingerprint`, computing it at most once
    /// across concurrent callers.
    ///
    /// A stored accepted entry returns immediately. If another caller
    /// is already computing the same fingerprint, this call awaits that
    /// computation's outcome instead of invoking `compute`.
    pub async fn get_or_compute<F, Fut>(&self, fingerprint: Fingerprint, compute: F) -> StageOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StageOutcome>,
    {
        let tx = match self.slots.entry(fingerprint) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                match occupied.get() {
                    Slot::Ready(asset) => {
                        self.hits.fetch_add(1, Ordering::SeqCst);
                        debug!(fingerprint = %fingerprint, "cache hit");
                        return StageOutcome::Accepted(asset.clone());
                    }
                    Slot::InFlight(rx) => {
                        let mut rx = rx.clone();
                        drop(occupied);
                        return self.await_in_flight(fingerprint, &mut rx, compute).await;
                    }
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(Slot::InFlight(rx));
                tx
            }
        };

        let outcome = compute().await;
        // Waiters get the outcome either way; only acceptance is stored.
        let _ = tx.send(Some(outcome.clone()));
        match &outcome {
            StageOutcome::Accepted(asset) => {
                self.slots
                    .insert(fingerprint, Slot::Ready(asset.clone()));
            }
            _ => {
                self.slots.remove(&fingerprint);
            }
        }
        outcome
    }

    /// Wait for another caller's in-flight computation. If its sender
    /// vanished without an outcome, take over and compute directly.
    async fn await_in_flight<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        rx: &mut watch::Receiver<Option<StageOutcome>>,
        compute: F,
    ) -> StageOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StageOutcome>,
    {
        loop {
            if let Some(outcome) = rx.borrow().clone() {
                self.hits.fetch_add(1, Ordering::SeqCst);
                debug!(fingerprint = %fingerprint, "coalesced with in-flight request");
                return outcome;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }

        warn!(fingerprint = %fingerprint, "in-flight computation vanished, recomputing");
        self.slots
            .remove_if(&fingerprint, |_, slot| matches!(slot, Slot::InFlight(_)));
        let outcome = compute().await;
        if let StageOutcome::Accepted(asset) = &outcome {
            self.slots
                .insert(fingerprint, Slot::Ready(asset.clone()));
        }
        outcome
    }
}
