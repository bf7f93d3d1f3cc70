//! In-memory snapshot store

use super::traits::{AdapterState, OpenStore, StateResult, StateStore};
use dashmap::DashMap;
use std::path::Path;

/// Snapshot store backed by a concurrent map.
///
/// Snapshots live as long as the store; `open` ignores the path.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshots: DashMap<String, AdapterState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, key: &str, state: &AdapterState) -> StateResult<()> {
        self.snapshots.insert(key.to_string(), state.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> StateResult<Option<AdapterState>> {
        Ok(self.snapshots.get(key).map(|entry| entry.value().clone()))
    }

    fn delete(&self, key: &str) -> StateResult<bool> {
        Ok(self.snapshots.remove(key).is_some())
    }

    fn keys(&self) -> StateResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .snapshots
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

impl OpenStore for MemoryStateStore {
    fn open(_path: impl AsRef<Path>) -> StateResult<Self> {
        Ok(Self::new())
    }

    fn open_in_memory() -> StateResult<Self> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_delete() {
        let store = MemoryStateStore::new();
        let state = AdapterState {
            page_count: 3,
            ..Default::default()
        };

        store.save("main", &state).unwrap();
        store.save("aux", &AdapterState::default()).unwrap();

        assert_eq!(store.load("main").unwrap(), Some(state));
        assert_eq!(store.keys().unwrap(), vec!["aux", "main"]);
        assert!(store.delete("main").unwrap());
        assert!(!store.delete("main").unwrap());
        assert_eq!(store.len(), 1);
    }
}
