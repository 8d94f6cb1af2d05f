//! Lexideck Deck - Card assembly and deck export
//!
//! Turns enriched records into flashcards and writes the finished deck
//! out through a pluggable exporter.

pub mod card;
pub mod export;

pub use card::{Card, CardBuilder, FieldTemplateCardBuilder};
pub use export::{DeckExporter, DirectoryExporter, ExportArtifact};
