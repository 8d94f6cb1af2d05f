//! Card assembly
//!
//! A `CardBuilder` turns one record plus its attached media into a
//! flashcard. The field-template builder substitutes `{field}`
//! placeholders from the record's fields; a missing field fails that
//! record's card, which the pipeline defers like any other per-record
//! failure.

use lexideck_core::{DeckError, RecordId, Result};
use lexideck_media::MediaAsset;
use lexideck_records::Record;
use serde::{Deserialize, Serialize};

/// A finished flashcard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub record_id: RecordId,
    pub front: String,
    pub back: String,
    /// Media attached to this card, in enrichment order
    pub media: Vec<MediaAsset>,
}

/// Card assembly capability
pub trait CardBuilder: Send + Sync {
    fn build(&self, record: &Record, assets: &[MediaAsset]) -> Result<Card>;
}

/// Builds cards by substituting `{field}` placeholders in a front and
/// back template with the record's field values.
pub struct FieldTemplateCardBuilder {
    front_template: String,
    back_template: String,
}

impl FieldTemplateCardBuilder {
    pub fn new(front_template: &str, back_template: &str) -> Self {
        Self {
            front_template: front_template.to_string(),
            back_template: back_template.to_string(),
        }
    }

    /// Substitute every `{field}` placeholder, failing on the first
    /// placeholder the record cannot satisfy
    fn render(template: &str, record: &Record) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                DeckError::CardBuild(format!("unclosed placeholder in template '{}'", template))
            })?;
            let name = &after[..close];
            let value = record.field(name).ok_or_else(|| {
                DeckError::CardBuild(format!(
                    "record '{}' has no field '{}'",
                    record.id(),
                    name
                ))
            })?;
            out.push_str(value);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Default for FieldTemplateCardBuilder {
    fn default() -> Self {
        Self::new("{word}", "{translation}")
    }
}

impl CardBuilder for FieldTemplateCardBuilder {
    fn build(&self, record: &Record, assets: &[MediaAsset]) -> Result<Card> {
        let front = Self::render(&self.front_template, record)?;
        let back = Self::render(&self.back_template, record)?;

        if front.trim().is_empty() {
            return Err(DeckError::CardBuild(format!(
                "record '{}' produced an empty card front",
                record.id()
            )));
        }

        Ok(Card {
            record_id: record.id().clone(),
            front,
            back,
            media: assets.to_vec(),
        })
    }
}
