//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryPreferenceStore`, which satisfies the `PreferenceStore`
//! contract without any external dependencies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory preference store backed by a `HashMap<key, StoredValue>`.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    writes: AtomicU64,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of successful writes (upserts, inserts and swaps).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> StorageResult<StoredValue> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn upsert(&self, key: &str, value: String) -> StorageResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let version = entries.get(key).map(|v| v.version + 1).unwrap_or(1);
        entries.insert(key.to_string(), StoredValue { value, version });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    async fn insert_if_absent(&self, key: &str, value: String) -> StorageResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(current) = entries.get(key) {
            return Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: 0,
                actual: current.version,
            });
        }
        entries.insert(key.to_string(), StoredValue { value, version: 1 });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: String,
    ) -> StorageResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let current = entries
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        if current.version != expected_version {
            return Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }
        current.version += 1;
        current.value = value;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(current.version)
    }
}
