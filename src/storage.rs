//! Durable key-value storage

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Synchronous string-keyed store, durable across sessions.
///
/// The dashboard shell injects whatever the host profile provides; this
/// crate ships a file-backed implementation and an in-memory one. Readers
/// must tolerate absent and malformed values, so the trait never fails:
/// a corrupt value is returned as-is and rejected by the caller's parser.
pub trait KeyValueStore: Send + Sync {
    /// Get the value for `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> Option<String>;
    /// Set `key` to `value`, overwriting any prior value.
    fn set(&self, key: &str, value: &str);
}

/// In-memory store. Used in tests and as the default when the embedder
/// supplies no durable backend.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.into(), value.into());
    }
}

/// File-backed store: one JSON object per file, rewritten whole on every
/// set. Matches the whole-value overwrite policy of the sync core, so a
/// torn write can at worst lose the latest snapshot, never merge two.
pub struct FileStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading any existing contents. A missing
    /// or unreadable file starts empty; a corrupt file is discarded with a
    /// warning and overwritten on the next set.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Discarding corrupt store file {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            values: RwLock::new(values),
        }
    }

    fn flush(&self, values: &HashMap<String, String>) {
        let content = match serde_json::to_string_pretty(values) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to serialize store: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, content) {
            tracing::error!("Failed to write store file {}: {}", self.path.display(), e);
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.write();
        values.insert(key.into(), value.into());
        self.flush(&values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing"), None);

        store.set("k", "v1");
        assert_eq!(store.get("k"), Some("v1".into()));

        // Overwrite, no merge
        store.set("k", "v2");
        assert_eq!(store.get("k"), Some("v2".into()));
    }

    #[test]
    fn test_file_store_persists() {
        let path = std::env::temp_dir().join(format!("deskline-store-{}.json", uuid::Uuid::new_v4()));

        let store = FileStore::open(&path);
        store.set("taxonomy", r#"{"Hardware":{}}"#);
        drop(store);

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("taxonomy"), Some(r#"{"Hardware":{}}"#.into()));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_store_corrupt_file_starts_empty() {
        let path = std::env::temp_dir().join(format!("deskline-store-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "not json at all").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get("anything"), None);

        let _ = std::fs::remove_file(&path);
    }
}
