//! Every queued task is built from one preference record, even when the
//! record changes between reads.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use buildcast_core::{
    BackgroundChecker, BuildIdentifier, BuildTarget, CheckerConfig, FsBuildCatalog,
    InstallQueue, LocalCatalogClient, PreferenceRecord, PreferenceService, TaskOrigin,
    UpdateAgent,
};
use buildcast_state::{PreferenceStore, StorageError, StorageResult, StoredValue};
use tokio_util::sync::CancellationToken;

/// Answers the first `get` with `first` and every later one with `then`.
struct ShiftingStore {
    first: String,
    then: String,
    reads: AtomicUsize,
}

impl ShiftingStore {
    fn new(first: &PreferenceRecord, then: &PreferenceRecord) -> Self {
        Self {
            first: serde_json::to_string(first).unwrap(),
            then: serde_json::to_string(then).unwrap(),
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PreferenceStore for ShiftingStore {
    async fn get(&self, _key: &str) -> StorageResult<StoredValue> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        let value = if read == 0 { &self.first } else { &self.then };
        Ok(StoredValue {
            value: value.clone(),
            version: read as u64 + 1,
        })
    }

    async fn upsert(&self, _key: &str, _value: String) -> StorageResult<u64> {
        Err(StorageError::Backend("read-only".to_string()))
    }

    async fn insert_if_absent(&self, _key: &str, _value: String) -> StorageResult<u64> {
        Err(StorageError::Backend("read-only".to_string()))
    }

    async fn compare_and_swap(&self, _key: &str, _expected: u64, _value: String) -> StorageResult<u64> {
        Err(StorageError::Backend("read-only".to_string()))
    }
}

fn old_record() -> PreferenceRecord {
    PreferenceRecord {
        server_address: "http://old-server".to_string(),
        preferred_build: "14.03.2024.1200".to_string(),
        auto_update: false,
        actual_build: String::new(),
    }
}

fn new_record() -> PreferenceRecord {
    PreferenceRecord {
        server_address: "http://new-server".to_string(),
        preferred_build: "latest".to_string(),
        auto_update: true,
        actual_build: "15.03.2024.1200".to_string(),
    }
}

fn add_build(root: &Path, id: &str) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{id}.image")), b"img").unwrap();
}

fn agent_over(store: ShiftingStore) -> (tempfile::TempDir, Arc<InstallQueue>, Arc<UpdateAgent>) {
    let dir = tempfile::tempdir().unwrap();
    add_build(dir.path(), "14.03.2024.1200");
    add_build(dir.path(), "15.03.2024.1200");
    let catalog = Arc::new(LocalCatalogClient::new(FsBuildCatalog::new(dir.path()).unwrap()));
    let queue = Arc::new(InstallQueue::new());
    let agent = Arc::new(UpdateAgent::new(
        PreferenceService::new(Arc::new(store)),
        catalog,
        queue.clone(),
    ));
    (dir, queue, agent)
}

async fn next_task(queue: &InstallQueue) -> buildcast_core::InstallTask {
    queue
        .dequeue(&CancellationToken::new())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn start_update_uses_one_record_for_target_and_server() {
    let (_dir, queue, agent) = agent_over(ShiftingStore::new(&old_record(), &new_record()));

    let task = agent.start_update(None).await.unwrap();

    let expected = BuildTarget::Exact(BuildIdentifier::parse("14.03.2024.1200").unwrap());
    assert_eq!(task.target, expected);
    assert_eq!(task.server_address, "http://old-server");
    assert_eq!(next_task(&queue).await, task);
}

#[tokio::test]
async fn checker_tick_uses_one_record_for_gate_check_and_task() {
    let (_dir, queue, agent) = agent_over(ShiftingStore::new(&old_record(), &new_record()));
    let checker = BackgroundChecker::new(agent, CheckerConfig::default());

    // The first record has autoUpdate off and nothing installed, so the
    // server's latest build counts as new.
    assert!(checker.tick().await.unwrap());

    let task = next_task(&queue).await;
    assert_eq!(task.origin, TaskOrigin::Background);
    assert_eq!(task.server_address, "http://old-server");
    assert_eq!(task.target.as_str(), "14.03.2024.1200");
}
