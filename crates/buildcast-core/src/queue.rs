//! Single-consumer install queue and the status register pollers read.
//!
//! Any number of producers may [`InstallQueue::enqueue`]; exactly one worker
//! drains the queue with [`InstallQueue::dequeue`], so installs run one at a
//! time in enqueue order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{BuildTarget, BuildcastError, QueueStatus, Result, StatusSnapshot};
use crate::obs;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Who asked for an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOrigin {
    Manual,
    Background,
}

/// One deferred install, captured when it was enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTask {
    pub id: Uuid,
    pub target: BuildTarget,
    pub server_address: String,
    pub origin: TaskOrigin,
    pub enqueued_at: DateTime<Utc>,
}

impl InstallTask {
    pub fn new(target: BuildTarget, server_address: impl Into<String>, origin: TaskOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            server_address: server_address.into(),
            origin,
            enqueued_at: Utc::now(),
        }
    }
}

/// Progress of the install worker.
///
/// Only the worker writes it; the writers are crate-private. Reading a terminal state (`Complete` or
/// `Failed`) hands it to exactly one reader and resets the register to idle.
#[derive(Debug, Default)]
pub struct StatusRegister {
    inner: Mutex<StatusSnapshot>,
}

impl StatusRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; a terminal state is cleared by this read.
    pub fn read(&self) -> StatusSnapshot {
        let mut inner = lock(&self.inner);
        let snapshot = inner.clone();
        if snapshot.status.is_terminal() {
            *inner = StatusSnapshot::idle();
        }
        snapshot
    }

    /// Current state without consuming it.
    pub fn peek(&self) -> StatusSnapshot {
        lock(&self.inner).clone()
    }

    pub(crate) fn begin(&self) {
        *lock(&self.inner) = StatusSnapshot {
            status: QueueStatus::Downloading,
            percent: 0,
            error: None,
        };
    }

    pub(crate) fn set_status(&self, status: QueueStatus) {
        lock(&self.inner).status = status;
    }

    pub(crate) fn set_progress(&self, percent: u8) {
        lock(&self.inner).percent = percent.min(100);
    }

    pub(crate) fn complete(&self) {
        *lock(&self.inner) = StatusSnapshot {
            status: QueueStatus::Complete,
            percent: 100,
            error: None,
        };
    }

    /// Record a failure, keeping the last percent.
    pub(crate) fn fail(&self, error: impl Into<String>) {
        let mut inner = lock(&self.inner);
        inner.status = QueueStatus::Failed;
        inner.error = Some(error.into());
    }
}

/// Unbounded FIFO of install tasks with a blocking, cancellable dequeue.
#[derive(Debug)]
pub struct InstallQueue {
    backlog: Mutex<VecDeque<InstallTask>>,
    /// One permit per queued task.
    available: Semaphore,
    status: StatusRegister,
}

impl Default for InstallQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallQueue {
    pub fn new() -> Self {
        Self {
            backlog: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
            status: StatusRegister::new(),
        }
    }

    /// Append a task and wake the worker. Never blocks.
    pub fn enqueue(&self, task: InstallTask) {
        let (id, target, origin) = (task.id, task.target.to_string(), task.origin);
        let backlog = {
            let mut backlog = lock(&self.backlog);
            backlog.push_back(task);
            backlog.len()
        };
        self.available.add_permits(1);
        obs::emit_install_enqueued(id, &target, origin, backlog);
    }

    /// Wait for the next task.
    ///
    /// Returns `Ok(None)` once `cancel` fires, without taking a task.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<InstallTask>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            permit = self.available.acquire() => {
                let permit = permit.map_err(|_| {
                    BuildcastError::QueueInconsistency("wake signal closed".to_string())
                })?;
                permit.forget();
                lock(&self.backlog).pop_front().map(Some).ok_or_else(|| {
                    BuildcastError::QueueInconsistency("woken with an empty backlog".to_string())
                })
            }
        }
    }

    /// Number of tasks waiting.
    pub fn len(&self) -> usize {
        lock(&self.backlog).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status as seen by pollers; see [`StatusRegister::read`].
    pub fn status(&self) -> StatusSnapshot {
        self.status.read()
    }

    /// Status without consuming a terminal state.
    pub fn peek_status(&self) -> StatusSnapshot {
        self.status.peek()
    }

    /// Writable register, for the worker only.
    pub(crate) fn register(&self) -> &StatusRegister {
        &self.status
    }

    /// Wake the worker without a task. Test hook for the empty-wake path.
    #[cfg(test)]
    fn spurious_wake(&self) {
        self.available.add_permits(1);
    }
}
