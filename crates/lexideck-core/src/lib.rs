//! Lexideck Core - Foundational types for the deck build pipeline
//!
//! This crate provides the types every other lexideck crate depends on:
//! - `RecordId` - Stable record identifiers
//! - `Fingerprint` - SHA-256 based request fingerprinting
//! - Error types and Result alias

mod error;
mod fingerprint;
mod id;

pub use error::{DeckError, Result};
pub use fingerprint::Fingerprint;
pub use id::RecordId;
