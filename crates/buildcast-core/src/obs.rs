//! Structured observability hooks for install lifecycle events.
//!
//! This module provides:
//! - Install-scoped tracing spans via [`install_span`]
//! - Emission functions for key lifecycle events: enqueue, start, stage, finish, failure, checker tick
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use tracing::{info, Span};
use uuid::Uuid;

use crate::pipeline::InstallStage;
use crate::queue::TaskOrigin;

/// Span tagging every log line of one install with its task id.
///
/// Attach it with `tracing::Instrument` so it survives across awaits.
///
/// # Example
///
/// ```ignore
/// pipeline.execute(&task, status).instrument(install_span(task.id)).await
/// ```
pub fn install_span(task_id: Uuid) -> Span {
    tracing::info_span!("buildcast.install", task_id = %task_id)
}

/// Emit event: a task joined the install queue.
pub fn emit_install_enqueued(task_id: Uuid, target: &str, origin: TaskOrigin, backlog: usize) {
    info!(
        event = "install.enqueued",
        task_id = %task_id,
        build_target = %target,
        origin = ?origin,
        backlog = backlog,
    );
}

/// Emit event: the worker picked a task up.
pub fn emit_install_started(task_id: Uuid, target: &str, wait_ms: i64) {
    info!(event = "install.started", task_id = %task_id, build_target = %target, wait_ms = wait_ms);
}

/// Emit event: the pipeline entered a stage.
pub fn emit_install_stage(task_id: Uuid, stage: InstallStage) {
    info!(event = "install.stage", task_id = %task_id, stage = ?stage);
}

/// Emit event: install finished successfully.
pub fn emit_install_finished(task_id: Uuid, build: &str, duration_ms: u64) {
    info!(
        event = "install.finished",
        task_id = %task_id,
        build = %build,
        duration_ms = duration_ms,
    );
}

/// Emit event: install failed (error level).
pub fn emit_install_failed(task_id: Uuid, duration_ms: u64, error: &dyn std::fmt::Display) {
    tracing::error!(
        event = "install.failed",
        task_id = %task_id,
        duration_ms = duration_ms,
        error = %error,
    );
}

/// Emit event: one background check completed.
pub fn emit_checker_tick(enqueued: bool) {
    info!(event = "checker.tick", enqueued = enqueued);
}
