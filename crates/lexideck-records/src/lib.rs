//! Lexideck Records - Vocabulary record model and loading
//!
//! Records are immutable language-tagged field maps loaded from TOML
//! record files. Malformed rows are reported individually so one bad
//! entry never aborts a whole batch.

mod loader;
mod record;

pub use loader::{LoadOutcome, RecordLoader, RowError, TomlRecordLoader};
pub use record::Record;
