//! SurrealDB-backed PreferenceStore implementation
//!
//! Each key is stored as its own record (`settings:<key>`), so every
//! operation below is a single-statement transaction.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::storage_traits::{PreferenceStore, StorageResult, StoredValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbSetting {
    key: String,
    value: String,
    version: i64,
}

impl DbSetting {
    fn into_stored_value(self) -> StoredValue {
        StoredValue {
            value: self.value,
            version: self.version.max(0) as u64,
        }
    }
}

/// SurrealDB-backed implementation of [`PreferenceStore`].
#[derive(Clone)]
pub struct SurrealPreferenceStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealPreferenceStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }

    async fn fetch(&self, key: &str) -> StorageResult<Option<DbSetting>> {
        let mut res = self
            .handle
            .db()
            .query("SELECT key, value, version FROM type::thing('settings', $key)")
            .bind(("key", key.to_string()))
            .await?;

        let rows: Vec<DbSetting> = res.take(0)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PreferenceStore for SurrealPreferenceStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StorageResult<StoredValue> {
        self.fetch(key)
            .await?
            .map(DbSetting::into_stored_value)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    #[instrument(skip(self, value))]
    async fn upsert(&self, key: &str, value: String) -> StorageResult<u64> {
        let mut res = self
            .handle
            .db()
            .query(
                "UPSERT type::thing('settings', $key) \
                 SET key = $key, value = $value, version = (version OR 0) + 1 \
                 RETURN AFTER",
            )
            .bind(("key", key.to_string()))
            .bind(("value", value))
            .await?;

        let rows: Vec<DbSetting> = res.take(0)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Backend(format!("upsert of '{key}' returned no row")))?;

        debug!(version = row.version, "setting upserted");
        Ok(row.into_stored_value().version)
    }

    #[instrument(skip(self, value))]
    async fn insert_if_absent(&self, key: &str, value: String) -> StorageResult<u64> {
        let mut res = self
            .handle
            .db()
            .query(
                "CREATE type::thing('settings', $key) \
                 SET key = $key, value = $value, version = 1 \
                 RETURN AFTER",
            )
            .bind(("key", key.to_string()))
            .bind(("value", value))
            .await?;

        let created: StorageResult<Vec<DbSetting>> = res.take(0).map_err(StorageError::from);
        if let Ok(Some(row)) = created.as_ref().map(|rows| rows.first()) {
            debug!(version = row.version, "setting created");
            return Ok(row.clone().into_stored_value().version);
        }

        // CREATE refuses an existing record; report that as a lost race.
        match self.fetch(key).await? {
            Some(current) => Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: 0,
                actual: current.into_stored_value().version,
            }),
            None => Err(created.err().unwrap_or_else(|| {
                StorageError::Backend(format!("create of '{key}' returned no row"))
            })),
        }
    }

    #[instrument(skip(self, value))]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: String,
    ) -> StorageResult<u64> {
        let mut res = self
            .handle
            .db()
            .query(
                "UPDATE type::thing('settings', $key) \
                 SET value = $value, version = version + 1 \
                 WHERE version = $expected \
                 RETURN AFTER",
            )
            .bind(("key", key.to_string()))
            .bind(("value", value))
            .bind(("expected", expected_version as i64))
            .await?;

        let rows: Vec<DbSetting> = res.take(0)?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.into_stored_value().version);
        }

        // Nothing matched: either the key is missing or the version moved.
        match self.fetch(key).await? {
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Some(current) => Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current.into_stored_value().version,
            }),
        }
    }
}
