//! # Transcript Storage
//!
//! The transcript lives in one named slot of a [`KeyValueStore`] as a JSON array of
//! [`crate::types::Message`] records.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`KeyValueStore`] | get / set / clear over named slots |
//! | [`MemoryStore`] | in-process store (default, tests) |
//! | [`FileStore`] | one JSON file per slot under a directory |
//! | [`TranscriptStore`] | ordered transcript with sequence ids, persisted on every change |

pub mod backend;
pub mod transcript;

pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use transcript::TranscriptStore;
