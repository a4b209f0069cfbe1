use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::infra::{contracts::KeyValueStore, error::StorageError};

#[cfg(test)]
use crate::infra::{config::AppConfig, contracts::ConfigAdapter};

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct StubConfigAdapter;

#[cfg(test)]
impl ConfigAdapter for StubConfigAdapter {
    fn load(&self) -> anyhow::Result<AppConfig> {
        Ok(AppConfig::default())
    }
}

/// Process-local key-value store. Holds nothing across runs.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    slots: Mutex<HashMap<String, Vec<String>>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates a slot, bypassing the write counter.
    pub fn with_slot(self, slot: &str, values: &[&str]) -> Self {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(
                slot.to_owned(),
                values.iter().map(|value| (*value).to_owned()).collect(),
            );
        }
        self
    }

    /// While offline every read and write fails with [`StorageError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::Offline)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn read_set(&self, slot: &str) -> Result<Vec<String>, StorageError> {
        self.ensure_online()?;
        let slots = self.slots.lock().map_err(|_| StorageError::Offline)?;
        Ok(slots.get(slot).cloned().unwrap_or_default())
    }

    fn write_set(&self, slot: &str, values: &[String]) -> Result<(), StorageError> {
        self.ensure_online()?;
        let mut slots = self.slots.lock().map_err(|_| StorageError::Offline)?;
        slots.insert(slot.to_owned(), values.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_replaces_whole_slot() {
        let store = MemoryKeyValueStore::new().with_slot("blacklist", &["a", "b"]);

        store
            .write_set("blacklist", &["c".to_owned()])
            .expect("write should succeed");

        assert_eq!(store.read_set("blacklist").expect("read"), vec!["c"]);
        assert!(store.read_set("highlights").expect("read").is_empty());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn offline_store_rejects_reads_and_writes() {
        let store = MemoryKeyValueStore::new();
        store.set_offline(true);

        assert!(matches!(store.read_set("x"), Err(StorageError::Offline)));
        assert!(matches!(store.write_set("x", &[]), Err(StorageError::Offline)));
        assert_eq!(store.write_count(), 0);
    }
}
