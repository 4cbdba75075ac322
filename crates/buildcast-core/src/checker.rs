//! Periodic update check.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::UpdateAgent;
use crate::domain::Result;
use crate::metrics::METRICS;
use crate::obs;
use crate::queue::TaskOrigin;

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub interval: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Enqueues an install whenever the server has a build the agent lacks.
///
/// The gate fires when `autoUpdate` is **false**. This matches the deployed
/// agents' behavior and is kept as is.
pub struct BackgroundChecker {
    agent: Arc<UpdateAgent>,
    config: CheckerConfig,
}

impl BackgroundChecker {
    pub fn new(agent: Arc<UpdateAgent>, config: CheckerConfig) -> Self {
        Self { agent, config }
    }

    /// One check over a single preference snapshot. Returns whether a task
    /// was enqueued.
    pub async fn tick(&self) -> Result<bool> {
        let prefs = self.agent.get_preferences().await?;
        if prefs.auto_update {
            debug!("autoUpdate set, skipping check");
            return Ok(false);
        }
        if !self.agent.update_available_for(&prefs).await? {
            return Ok(false);
        }
        let task = self.agent.enqueue_preferred(&prefs, TaskOrigin::Background)?;
        info!(task_id = %task.id, build_target = %task.target, "update available, install queued");
        Ok(true)
    }

    /// Check now, then every `interval`, until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.config.interval.as_secs(), "background checker started");
        loop {
            let enqueued = match self.tick().await {
                Ok(enqueued) => enqueued,
                Err(e) => {
                    warn!(error = %e, "background update check failed");
                    false
                }
            };
            METRICS.inc_checker_ticks();
            obs::emit_checker_tick(enqueued);
            METRICS.flush();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
        info!("background checker stopped");
    }
}
