//! The install pipeline: resolve, download, load, restart.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::catalog::image_file_name;
use crate::client::CatalogClient;
use crate::deployer::Deployer;
use crate::domain::{BuildIdentifier, BuildTarget, QueueStatus, Result};
use crate::download::download_to;
use crate::obs;
use crate::preferences::PreferenceService;
use crate::queue::{InstallTask, StatusRegister};

/// Stages of one install, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Resolving,
    Downloading,
    Loading,
    Restarting,
    Complete,
}

/// Runs one dequeued task to completion.
#[async_trait]
pub trait InstallExecutor: Send + Sync {
    /// Execute `task`, reporting progress into `status`.
    ///
    /// The worker records `Complete` on success and `Failed` on error.
    async fn execute(&self, task: &InstallTask, status: &StatusRegister) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where images are downloaded before loading.
    pub download_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("Builds"),
        }
    }
}

/// Production [`InstallExecutor`].
pub struct InstallPipeline {
    config: PipelineConfig,
    preferences: PreferenceService,
    catalog: Arc<dyn CatalogClient>,
    deployer: Arc<dyn Deployer>,
}

impl InstallPipeline {
    pub fn new(
        config: PipelineConfig,
        preferences: PreferenceService,
        catalog: Arc<dyn CatalogClient>,
        deployer: Arc<dyn Deployer>,
    ) -> Self {
        Self {
            config,
            preferences,
            catalog,
            deployer,
        }
    }

    /// Pick the concrete build and record it as `actualBuild` before any
    /// bytes move.
    async fn resolve(&self, task: &InstallTask) -> Result<BuildIdentifier> {
        let id = match &task.target {
            BuildTarget::Latest => {
                self.catalog
                    .latest_build_number(&task.server_address)
                    .await?
            }
            BuildTarget::Exact(id) => id.clone(),
        };
        self.preferences.set_actual_build(id.as_str()).await?;
        debug!(build_target = %task.target, resolved = %id, "install target resolved");
        Ok(id)
    }
}

#[async_trait]
impl InstallExecutor for InstallPipeline {
    async fn execute(&self, task: &InstallTask, status: &StatusRegister) -> Result<()> {
        obs::emit_install_stage(task.id, InstallStage::Resolving);
        let id = self.resolve(task).await?;

        obs::emit_install_stage(task.id, InstallStage::Downloading);
        status.set_status(QueueStatus::Downloading);
        let image = self.config.download_dir.join(image_file_name(&id));
        let download = self.catalog.open_build(&task.server_address, &id).await?;
        let bytes = download_to(download, &image, |percent| status.set_progress(percent)).await?;
        info!(build = %id, bytes, "image downloaded");

        obs::emit_install_stage(task.id, InstallStage::Loading);
        status.set_status(QueueStatus::Installing);
        self.deployer.load(&image).await?;
        tokio::fs::remove_file(&image).await?;

        obs::emit_install_stage(task.id, InstallStage::Restarting);
        self.deployer.stop().await?;
        self.deployer.start().await?;

        obs::emit_install_stage(task.id, InstallStage::Complete);
        Ok(())
    }
}
