//! Test doubles for the pipeline's external collaborators.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::deployer::Deployer;
use crate::domain::{BuildcastError, Result};

/// One recorded [`Deployer`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployCall {
    /// Path and whether the file existed at call time.
    Load { path: PathBuf, existed: bool },
    Stop,
    Start,
}

/// Which step of a [`RecordingDeployer`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Load,
    Stop,
    Start,
}

/// [`Deployer`] that records calls instead of running docker.
#[derive(Debug, Default)]
pub struct RecordingDeployer {
    calls: Mutex<Vec<DeployCall>>,
    fail_on: Mutex<Option<DeployStep>>,
    delay: Option<Duration>,
}

impl RecordingDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make `step` fail until cleared with `None`.
    pub fn fail_on(&self, step: Option<DeployStep>) {
        *self.fail_on.lock().unwrap() = step;
    }

    pub fn calls(&self) -> Vec<DeployCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, step: DeployStep, call: DeployCall) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(step) {
            return Err(BuildcastError::DeployFailed(format!("scripted {step:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl Deployer for RecordingDeployer {
    async fn load(&self, image: &Path) -> Result<()> {
        let call = DeployCall::Load {
            path: image.to_path_buf(),
            existed: image.exists(),
        };
        self.record(DeployStep::Load, call).await
    }

    async fn stop(&self) -> Result<()> {
        self.record(DeployStep::Stop, DeployCall::Stop).await
    }

    async fn start(&self) -> Result<()> {
        self.record(DeployStep::Start, DeployCall::Start).await
    }
}
