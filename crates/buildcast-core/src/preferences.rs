//! Read-modify-write access to the agent's preference record.
//!
//! Every mutation runs as an optimistic loop over the store's version token:
//! read the record with its version, apply the change, then compare-and-swap.
//! The first write creates the record only if it is still absent. A
//! concurrent writer makes the swap or the create fail and the change is
//! re-applied to the fresh record, so user edits and pipeline writes never overwrite each
//! other's fields.

use std::sync::Arc;

use buildcast_state::{PreferenceStore, StorageError};
use tracing::{debug, instrument, warn};

use crate::domain::{BuildcastError, PreferenceRecord, PreferenceUpdate, Result};

/// Store key of the preference record.
pub const PREFERENCES_KEY: &str = "UpdatePreferences";

const DEFAULT_MAX_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
    max_attempts: usize,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Current record with its version, `None` before the first `set`.
    async fn load_versioned(&self) -> Result<Option<(PreferenceRecord, u64)>> {
        match self.store.get(PREFERENCES_KEY).await {
            Ok(stored) => {
                let record: PreferenceRecord = serde_json::from_str(&stored.value)?;
                Ok(Some((record, stored.version)))
            }
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Current record; `PreferencesNotFound` before the first `set`.
    pub async fn load(&self) -> Result<PreferenceRecord> {
        self.load_versioned()
            .await?
            .map(|(record, _)| record)
            .ok_or(BuildcastError::PreferencesNotFound)
    }

    /// Apply `change` to the current record until the write lands.
    ///
    /// `change` returns `None` when there is nothing to write.
    async fn modify<F>(&self, change: F) -> Result<PreferenceRecord>
    where
        F: Fn(Option<&PreferenceRecord>) -> Result<Option<PreferenceRecord>>,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.load_versioned().await?;
            let Some(next) = change(current.as_ref().map(|(record, _)| record))? else {
                return current
                    .map(|(record, _)| record)
                    .ok_or(BuildcastError::PreferencesNotFound);
            };
            let value = serde_json::to_string(&next)?;

            let written = match current {
                Some((_, version)) => {
                    self.store
                        .compare_and_swap(PREFERENCES_KEY, version, value)
                        .await
                }
                None => self.store.insert_if_absent(PREFERENCES_KEY, value).await,
            };

            match written {
                Ok(version) => {
                    debug!(version, attempt, "preferences written");
                    return Ok(next);
                }
                Err(StorageError::VersionConflict { expected, actual, .. }) => {
                    warn!(attempt, expected, actual, "preferences changed concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(BuildcastError::Storage(format!(
            "gave up writing {PREFERENCES_KEY} after {} conflicting attempts",
            self.max_attempts
        )))
    }

    /// Store user preferences, keeping `actualBuild`.
    #[instrument(skip_all)]
    pub async fn set(&self, update: PreferenceUpdate) -> Result<PreferenceRecord> {
        let update = update.normalized()?;
        self.modify(|existing| Ok(Some(update.apply_to(existing.cloned()))))
            .await
    }

    /// Record `build` as the installed target, keeping user fields.
    #[instrument(skip(self))]
    pub async fn set_actual_build(&self, build: &str) -> Result<PreferenceRecord> {
        self.modify(|existing| {
            let record = existing.ok_or(BuildcastError::PreferencesNotFound)?;
            if record.actual_build == build {
                return Ok(None);
            }
            Ok(Some(PreferenceRecord {
                actual_build: build.to_string(),
                ..record.clone()
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildcast_state::fakes::MemoryPreferenceStore;

    fn update(address: &str, build: &str, auto_update: bool) -> PreferenceUpdate {
        PreferenceUpdate {
            server_address: address.to_string(),
            preferred_build: build.to_string(),
            auto_update,
        }
    }

    fn service() -> (Arc<MemoryPreferenceStore>, PreferenceService) {
        let store = Arc::new(MemoryPreferenceStore::new());
        (store.clone(), PreferenceService::new(store))
    }

    #[tokio::test]
    async fn load_before_set_is_not_found() {
        let (_, prefs) = service();
        assert!(matches!(
            prefs.load().await,
            Err(BuildcastError::PreferencesNotFound)
        ));
    }

    #[tokio::test]
    async fn set_normalizes_address() {
        let (_, prefs) = service();
        prefs.set(update("http://x/", "latest", false)).await.unwrap();
        assert_eq!(prefs.load().await.unwrap().server_address, "http://x");
    }

    #[tokio::test]
    async fn invalid_update_is_not_written() {
        let (store, prefs) = service();
        assert!(matches!(
            prefs.set(update("http://x", "nope", false)).await,
            Err(BuildcastError::InvalidPreferences(_))
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn set_keeps_actual_build() {
        let (_, prefs) = service();
        prefs.set(update("http://x", "latest", false)).await.unwrap();
        prefs.set_actual_build("15.03.2024.1200").await.unwrap();
        prefs.set(update("http://y", "latest", true)).await.unwrap();

        let record = prefs.load().await.unwrap();
        assert_eq!(record.server_address, "http://y");
        assert!(record.auto_update);
        assert_eq!(record.actual_build, "15.03.2024.1200");
    }

    #[tokio::test]
    async fn set_actual_build_requires_preferences() {
        let (_, prefs) = service();
        assert!(matches!(
            prefs.set_actual_build("15.03.2024.1200").await,
            Err(BuildcastError::PreferencesNotFound)
        ));
    }

    #[tokio::test]
    async fn unchanged_actual_build_skips_the_write() {
        let (store, prefs) = service();
        prefs.set(update("http://x", "latest", false)).await.unwrap();
        prefs.set_actual_build("15.03.2024.1200").await.unwrap();
        let writes = store.write_count();

        prefs.set_actual_build("15.03.2024.1200").await.unwrap();
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn stored_json_uses_camel_case() {
        let (store, prefs) = service();
        prefs.set(update("http://x", "latest", true)).await.unwrap();

        let stored = store.get(PREFERENCES_KEY).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&stored.value).unwrap();
        assert_eq!(json["serverAddress"], "http://x");
        assert_eq!(json["preferredBuild"], "latest");
        assert_eq!(json["autoUpdate"], true);
        assert_eq!(json["actualBuild"], "");
    }
}
