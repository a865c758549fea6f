use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use replypilot_core_types::{CandidateKey, ScopeKey};

use crate::{KeyNorm, StoragePort};

/// Namespace prefix for all persisted progress documents.
pub const STORAGE_PREFIX: &str = "replypilot.progress:";

/// Wire shape of the persisted record. Older layouts that carried raw keys
/// deserialize into the same shape and are normalized on load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressDocument {
    #[serde(default)]
    processed: Vec<String>,
}

/// In-memory mirror of one scope's processed set, backed by a storage
/// partition. Append-only during normal operation; shrinks only via an
/// explicit operator reset.
pub struct ProgressStore {
    storage: Arc<dyn StoragePort>,
    norm: KeyNorm,
    scope: ScopeKey,
    processed: BTreeSet<CandidateKey>,
    unsaved_adds: u32,
}

impl ProgressStore {
    /// Read the persisted record for `scope`. Absence and malformed JSON
    /// both load as an empty record; this never fails. Legacy raw keys are
    /// passed through normalization and deduplicated.
    pub fn load(storage: Arc<dyn StoragePort>, norm: KeyNorm, scope: ScopeKey) -> Self {
        let storage_key = format!("{STORAGE_PREFIX}{}", scope.as_str());
        let document = match storage.get(&storage_key) {
            Ok(Some(raw)) => match serde_json::from_str::<ProgressDocument>(&raw) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(scope = %scope, error = %err, "malformed progress record, starting empty");
                    ProgressDocument::default()
                }
            },
            Ok(None) => ProgressDocument::default(),
            Err(err) => {
                warn!(scope = %scope, error = %err, "progress record unreadable, starting empty");
                ProgressDocument::default()
            }
        };
        let processed: BTreeSet<CandidateKey> = document
            .processed
            .iter()
            .map(|raw| norm.normalize(raw))
            .collect();
        debug!(scope = %scope, entries = processed.len(), "progress record loaded");
        Self {
            storage,
            norm,
            scope,
            processed,
            unsaved_adds: 0,
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub fn normalize(&self, raw: &str) -> CandidateKey {
        self.norm.normalize(raw)
    }

    pub fn has(&self, key: &CandidateKey) -> bool {
        self.processed.contains(key)
    }

    /// Membership test for a raw key straight off the page.
    pub fn has_raw(&self, raw: &str) -> bool {
        self.processed.contains(&self.norm.normalize(raw))
    }

    /// Add a key and write the record back. Idempotent; returns whether the
    /// key was new.
    pub fn commit(&mut self, key: &CandidateKey) -> bool {
        let inserted = self.processed.insert(key.clone());
        if inserted {
            self.persist();
        }
        inserted
    }

    /// Add a key, persisting only every `persist_every` additions. Used by
    /// scan-heavy passes to bound loss on crash without a write per entry.
    pub fn adopt_batched(&mut self, key: &CandidateKey, persist_every: u32) -> bool {
        let inserted = self.processed.insert(key.clone());
        if inserted {
            self.unsaved_adds += 1;
            if persist_every > 0 && self.unsaved_adds >= persist_every {
                self.persist();
            }
        }
        inserted
    }

    /// Write the record back. Best-effort: storage failures (quota, denied
    /// partition) are logged and swallowed, never fatal to the run.
    pub fn persist(&mut self) {
        let document = ProgressDocument {
            processed: self
                .processed
                .iter()
                .map(|k| k.as_str().to_string())
                .collect(),
        };
        let serialized = match serde_json::to_string(&document) {
            Ok(s) => s,
            Err(err) => {
                warn!(scope = %self.scope, error = %err, "progress record serialization failed");
                return;
            }
        };
        if let Err(err) = self.storage.set(&self.storage_key(), &serialized) {
            warn!(scope = %self.scope, error = %err, "progress record write failed");
            return;
        }
        self.unsaved_adds = 0;
    }

    /// Persist if any batched additions are outstanding.
    pub fn flush(&mut self) {
        if self.unsaved_adds > 0 {
            self.persist();
        }
    }

    /// Operator reset: clears the persisted record and the in-memory mirror.
    pub fn reset(&mut self) {
        self.processed.clear();
        self.unsaved_adds = 0;
        if let Err(err) = self.storage.remove(&self.storage_key()) {
            warn!(scope = %self.scope, error = %err, "progress record removal failed");
        }
    }

    fn storage_key(&self) -> String {
        format!("{STORAGE_PREFIX}{}", self.scope.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStorage, StorageError};

    fn scope() -> ScopeKey {
        ScopeKey::from_page(Some("urn:site:activity:(1)"), "/posts/1")
    }

    fn store_with(storage: Arc<dyn StoragePort>) -> ProgressStore {
        ProgressStore::load(storage, KeyNorm::default(), scope())
    }

    #[test]
    fn absent_record_loads_empty() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_record_loads_empty_and_is_overwritten() {
        let storage = Arc::new(MemoryStorage::new());
        let key = format!("{STORAGE_PREFIX}urn:site:activity:(1)");
        storage.set(&key, "not json {").unwrap();

        let mut store = store_with(storage.clone());
        assert!(store.is_empty());

        store.commit(&store.normalize("urn:site:comment:(a,1)"));
        let raw = storage.get(&key).unwrap().expect("persisted");
        let doc: serde_json::Value = serde_json::from_str(&raw).expect("valid json now");
        assert_eq!(doc["processed"][0], "urn:site:comment:(a,1)");
    }

    #[test]
    fn legacy_keys_migrate_and_collapse_on_load() {
        let storage = Arc::new(MemoryStorage::new());
        let key = format!("{STORAGE_PREFIX}urn:site:activity:(1)");
        storage
            .set(
                &key,
                r#"{"processed":["wrapper urn:site:comment:(a,1) tail","urn:site:comment:(a,1)","  spaced   key "]}"#,
            )
            .unwrap();

        let store = store_with(storage);
        assert_eq!(store.len(), 2);
        assert!(store.has_raw("urn:site:comment:(a,1)"));
        assert!(store.has_raw("spaced key"));
    }

    #[test]
    fn commit_is_idempotent_and_monotonic() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        let key = store.normalize("c1");
        assert!(store.commit(&key));
        assert!(!store.commit(&key));
        assert_eq!(store.len(), 1);
        let other = store.normalize("c2");
        store.commit(&other);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn batched_adopts_persist_every_n() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = store_with(storage.clone());
        let storage_key = format!("{STORAGE_PREFIX}urn:site:activity:(1)");

        store.adopt_batched(&store.normalize("a"), 3);
        store.adopt_batched(&store.normalize("b"), 3);
        assert!(storage.get(&storage_key).unwrap().is_none());
        store.adopt_batched(&store.normalize("c"), 3);
        assert!(storage.get(&storage_key).unwrap().is_some());

        store.adopt_batched(&store.normalize("d"), 3);
        store.flush();
        let raw = storage.get(&storage_key).unwrap().unwrap();
        let doc: ProgressDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc.processed.len(), 4);
    }

    #[test]
    fn reset_clears_memory_and_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = store_with(storage.clone());
        store.commit(&store.normalize("c1"));
        store.reset();
        assert!(store.is_empty());
        let storage_key = format!("{STORAGE_PREFIX}urn:site:activity:(1)");
        assert!(storage.get(&storage_key).unwrap().is_none());
    }

    #[test]
    fn restart_sees_previous_commits() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let mut store = store_with(storage.clone());
            store.commit(&store.normalize("urn:site:comment:(a,1)"));
        }
        let store = store_with(storage);
        assert!(store.has_raw("legacy urn:site:comment:(a,1) text"));
    }

    struct DeniedStorage;

    impl StoragePort for DeniedStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let mut store = store_with(Arc::new(DeniedStorage));
        assert!(store.is_empty());
        assert!(store.commit(&store.normalize("c1")));
        assert!(store.has_raw("c1"));
        store.reset();
        assert!(store.is_empty());
    }
}
