//! State trait definitions

use crate::source::{Item, SourceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while saving or restoring adapter state
#[derive(Debug, Error)]
pub enum StateError {
    #[error("No saved state for source key: {key}")]
    MissingSourceState { key: String },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;

/// Converts a source's items for one page to and from a JSON blob.
///
/// Placeholder items are stripped before `save` sees them when the source
/// is wrapped in placeholders; `restore` must return items in page order.
pub trait ItemCodec: Send + Sync {
    fn save(&self, page: usize, items: &[Item]) -> StateResult<Value>;

    fn restore(&self, page: usize, blob: &Value) -> StateResult<Vec<Item>>;
}

/// Saved items of one source, keyed by page number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceState {
    pub pages: BTreeMap<usize, Value>,
}

/// Snapshot of an adapter: page layout plus every source's saved items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterState {
    pub initialized: bool,
    pub page_count: usize,
    pub current_page: Option<usize>,
    /// Keyed by [`source_key`].
    pub sources: BTreeMap<String, SourceState>,
}

impl AdapterState {
    pub fn source(&self, key: &str) -> Option<&SourceState> {
        self.sources.get(key)
    }
}

/// Key under which a source's state is saved.
///
/// Combines the source's name with its registration id, so two instances
/// of the same kind of source keep separate state.
pub fn source_key(name: &str, id: SourceId) -> String {
    format!("source:{}:{}", name, id.index())
}

/// Trait for snapshot storage backends
///
/// Implementations must be thread-safe (Send + Sync).
pub trait StateStore: Send + Sync {
    /// Create or replace the snapshot stored under `key`
    fn save(&self, key: &str, state: &AdapterState) -> StateResult<()>;

    /// Load the snapshot stored under `key`
    fn load(&self, key: &str) -> StateResult<Option<AdapterState>>;

    /// Delete a snapshot; returns whether it existed
    fn delete(&self, key: &str) -> StateResult<bool>;

    /// List stored snapshot keys, sorted
    fn keys(&self) -> StateResult<Vec<String>>;
}

/// Extension trait for stores that can be opened from a path
pub trait OpenStore: StateStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StateResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StateResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_key_combines_name_and_id() {
        assert_eq!(source_key("letters", SourceId(2)), "source:letters:2");
    }

    #[test]
    fn adapter_state_serializes_to_json() {
        let mut state = AdapterState {
            initialized: true,
            page_count: 2,
            current_page: Some(1),
            ..Default::default()
        };
        let mut pages = BTreeMap::new();
        pages.insert(0, serde_json::json!(["a", "b"]));
        state
            .sources
            .insert(source_key("letters", SourceId(0)), SourceState { pages });

        let json = serde_json::to_string(&state).unwrap();
        let back: AdapterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert!(back.source("source:letters:0").is_some());
    }
}
