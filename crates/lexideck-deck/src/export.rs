//! Deck export
//!
//! The exporter is the only component that dereferences media handles.
//! The directory exporter writes a `deck.json` index and copies every
//! referenced media file into a `media/` subdirectory, rewriting the
//! card's handles to the copied relative paths.

use crate::card::Card;
use async_trait::async_trait;
use lexideck_core::{DeckError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What an export produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportArtifact {
    /// Root of the exported deck
    pub path: PathBuf,
    pub card_count: usize,
    pub media_count: usize,
}

/// Deck export capability
#[async_trait]
pub trait DeckExporter: Send + Sync {
    fn name(&self) -> &str;

    /// Write the finished deck somewhere and return what was written
    async fn export(&self, deck_name: &str, cards: &[Card]) -> Result<ExportArtifact>;
}

/// Serialized shape of `deck.json`
#[derive(Debug, Serialize, Deserialize)]
struct DeckIndex {
    name: String,
    exported_at: String,
    card_count: usize,
    cards: Vec<Card>,
}

/// Exports a deck as a directory: `deck.json` plus copied media
pub struct DirectoryExporter {
    output_dir: PathBuf,
}

impl DirectoryExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Copy one media file into the deck's media directory, returning
    /// the deck-relative path it was stored under
    fn copy_media(&self, deck_dir: &Path, uri: &str) -> Result<String> {
        let source = Path::new(uri);
        let file_name = source
            .file_name()
            .ok_or_else(|| DeckError::Export(format!("media uri '{}' has no file name", uri)))?;

        let media_dir = deck_dir.join("media");
        std::fs::create_dir_all(&media_dir)?;

        let dest = media_dir.join(file_name);
        std::fs::copy(source, &dest)
            .map_err(|e| DeckError::Export(format!("cannot copy media '{}': {}", uri, e)))?;

        Ok(format!("media/{}", file_name.to_string_lossy()))
    }
}

#[async_trait]
impl DeckExporter for DirectoryExporter {
    fn name(&self) -> &str {
        "directory"
    }

    async fn export(&self, deck_name: &str, cards: &[Card]) -> Result<ExportArtifact> {
        let deck_dir = self.output_dir.join(deck_name);
        std::fs::create_dir_all(&deck_dir)?;

        let mut media_count = 0;
        let mut exported_cards = Vec::with_capacity(cards.len());
        for card in cards {
            let mut card = card.clone();
            for asset in &mut card.media {
                let relative = self.copy_media(&deck_dir, &asset.handle.uri)?;
                debug!(record = %card.record_id, uri = %relative, "copied media");
                asset.handle.uri = relative;
                media_count += 1;
            }
            exported_cards.push(card);
        }

        let index = DeckIndex {
            name: deck_name.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            card_count: exported_cards.len(),
            cards: exported_cards,
        };

        let json = serde_json::to_string_pretty(&index)
            .map_err(|e| DeckError::Export(format!("cannot serialize deck index: {}", e)))?;
        std::fs::write(deck_dir.join("deck.json"), json)?;

        info!(
            deck = deck_name,
            cards = index.card_count,
            media = media_count,
            "deck exported"
        );

        Ok(ExportArtifact {
            path: deck_dir,
            card_count: index.card_count,
            media_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use lexideck_core::RecordId;
    use lexideck_media::{MediaAsset, MediaHandle, MediaKind};
    use lexideck_records::Record;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lexideck_export_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn card_with_media(dir: &Path) -> Card {
        let media_path = dir.join("hund.mp3");
        std::fs::write(&media_path, b"fake mp3 bytes").unwrap();

        let mut fields = IndexMap::new();
        fields.insert("word".to_string(), "Hund".to_string());
        let record = Record::new(RecordId::new("noun-001"), "de", fields);

        Card {
            record_id: record.id().clone(),
            front: "Hund".to_string(),
            back: "dog".to_string(),
            media: vec![MediaAsset {
                kind: MediaKind::Audio,
                handle: MediaHandle {
                    uri: media_path.to_string_lossy().to_string(),
                    content_hash: None,
                },
                provider: "mock".to_string(),
                score: 0.9,
                stage: 0,
                below_threshold: false,
            }],
        }
    }

    #[tokio::test]
    async fn test_export_writes_index_and_media() {
        let dir = temp_dir();
        let exporter = DirectoryExporter::new(&dir);
        let card = card_with_media(&dir);

        let artifact = exporter.export("german-a1", &[card]).await.unwrap();
        assert_eq!(artifact.card_count, 1);
        assert_eq!(artifact.media_count, 1);

        let index: DeckIndex =
            serde_json::from_str(&std::fs::read_to_string(artifact.path.join("deck.json")).unwrap())
                .unwrap();
        assert_eq!(index.name, "german-a1");
        assert_eq!(index.cards[0].media[0].handle.uri, "media/hund.mp3");
        assert!(artifact.path.join("media/hund.mp3").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_export_empty_deck() {
        let dir = temp_dir();
        let exporter = DirectoryExporter::new(&dir);

        let artifact = exporter.export("empty", &[]).await.unwrap();
        assert_eq!(artifact.card_count, 0);
        assert_eq!(artifact.media_count, 0);
        assert!(artifact.path.join("deck.json").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_media_file_is_export_error() {
        let dir = temp_dir();
        let exporter = DirectoryExporter::new(&dir);
        let mut card = card_with_media(&dir);
        card.media[0].handle.uri = dir.join("does-not-exist.mp3").to_string_lossy().to_string();

        let err = exporter.export("broken", &[card]).await.unwrap_err();
        assert!(matches!(err, DeckError::Export(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
