//! Storage trait definitions for Buildcast
//!
//! The agent persists a handful of singleton settings (most importantly the
//! update preferences) in a durable key-value store. The contract is kept
//! deliberately small:
//! - `get`: read the value and its version token
//! - `upsert`: unconditional atomic write
//! - `insert_if_absent`: first write of a key, refused once the key exists
//! - `compare_and_swap`: write only if nobody else wrote since `get`
//!
//! In-memory fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A stored value together with its optimistic-concurrency version.
///
/// Versions start at 1 on the first write of a key and increase by exactly
/// one on every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    pub version: u64,
}

/// Durable key → value store.
///
/// Guarantees:
/// - `get` after a successful write observes that write (read-your-writes).
/// - Every write is atomic: readers never see a partially written value.
/// - `compare_and_swap` fails with `VersionConflict` instead of overwriting
///   a value that changed since `expected_version` was read.
/// - `insert_if_absent` fails with `VersionConflict` instead of overwriting
///   a value that appeared after a `get` returned `NotFound`.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Read the value stored under `key`. Returns `StorageError::NotFound` if absent.
    async fn get(&self, key: &str) -> StorageResult<StoredValue>;

    /// Create or overwrite `key`, returning the new version.
    async fn upsert(&self, key: &str, value: String) -> StorageResult<u64>;

    /// Create `key` at version 1 only if it does not exist yet.
    ///
    /// Returns `VersionConflict` (with `expected: 0`) if another writer
    /// created it first.
    async fn insert_if_absent(&self, key: &str, value: String) -> StorageResult<u64>;

    /// Overwrite `key` only if its current version equals `expected_version`.
    ///
    /// Returns `NotFound` if the key does not exist and `VersionConflict`
    /// if it was written in the meantime.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: String,
    ) -> StorageResult<u64>;
}
