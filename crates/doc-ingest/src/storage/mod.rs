//! Persistent storage
//!
//! Provides SQLite-based persistence for reader profiles.

mod profiles;

pub use profiles::{ProfileStore, UpsertOutcome};
