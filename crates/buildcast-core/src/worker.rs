//! The install queue's single consumer.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use crate::metrics::METRICS;
use crate::obs;
use crate::pipeline::InstallExecutor;
use crate::queue::InstallQueue;

/// Drain `queue` one task at a time until `cancel` fires.
///
/// A failing task is logged and recorded as `Failed` in the status register;
/// the worker then moves on to the next task. Cancellation is only observed
/// between tasks, an install in flight runs to its end.
pub async fn run_install_worker(
    queue: Arc<InstallQueue>,
    executor: Arc<dyn InstallExecutor>,
    cancel: CancellationToken,
) {
    info!("install worker started");
    loop {
        let task = match queue.dequeue(&cancel).await {
            Ok(Some(task)) => task,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "install queue failure");
                continue;
            }
        };

        let status = queue.register();
        status.begin();
        METRICS.inc_installs_started();
        let wait_ms = (Utc::now() - task.enqueued_at).num_milliseconds();
        obs::emit_install_started(task.id, task.target.as_str(), wait_ms);

        let started = Instant::now();
        let outcome = executor
            .execute(&task, status)
            .instrument(obs::install_span(task.id))
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                status.complete();
                METRICS.inc_installs_completed();
                obs::emit_install_finished(task.id, task.target.as_str(), duration_ms);
            }
            Err(e) => {
                status.fail(e.to_string());
                METRICS.inc_installs_failed();
                obs::emit_install_failed(task.id, duration_ms, &e);
            }
        }
        METRICS.flush();
    }
    info!("install worker stopped");
}
