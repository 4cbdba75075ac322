//! The agent's operations, one method per HTTP endpoint.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::catalog::BuildListing;
use crate::client::CatalogClient;
use crate::domain::{
    BuildTarget, PreferenceRecord, PreferenceUpdate, Result, StatusSnapshot,
};
use crate::preferences::PreferenceService;
use crate::queue::{InstallQueue, InstallTask, TaskOrigin};

/// Facade over preferences, the build server and the install queue.
#[derive(Clone)]
pub struct UpdateAgent {
    preferences: PreferenceService,
    catalog: Arc<dyn CatalogClient>,
    queue: Arc<InstallQueue>,
}

impl UpdateAgent {
    pub fn new(
        preferences: PreferenceService,
        catalog: Arc<dyn CatalogClient>,
        queue: Arc<InstallQueue>,
    ) -> Self {
        Self {
            preferences,
            catalog,
            queue,
        }
    }

    pub async fn set_preferences(&self, update: PreferenceUpdate) -> Result<PreferenceRecord> {
        let record = self.preferences.set(update).await?;
        info!(
            server = %record.server_address,
            preferred = %record.preferred_build,
            auto_update = record.auto_update,
            "preferences updated"
        );
        Ok(record)
    }

    pub async fn get_preferences(&self) -> Result<PreferenceRecord> {
        self.preferences.load().await
    }

    /// Check that the configured build server answers.
    pub async fn probe(&self) -> Result<()> {
        let prefs = self.preferences.load().await?;
        self.catalog.probe(&prefs.server_address).await
    }

    pub async fn get_builds(&self) -> Result<BuildListing> {
        let prefs = self.preferences.load().await?;
        self.catalog.list_builds(&prefs.server_address).await
    }

    /// Changelog of `build`, or of the current target when omitted.
    pub async fn get_changelog(&self, build: Option<&str>) -> Result<String> {
        let prefs = self.preferences.load().await?;
        let requested = build.unwrap_or_else(|| prefs.current_target());
        self.catalog
            .changelog(&prefs.server_address, requested)
            .await
    }

    /// Whether the server's latest build differs from the installed one.
    pub async fn is_update_available(&self) -> Result<bool> {
        let prefs = self.preferences.load().await?;
        self.update_available_for(&prefs).await
    }

    /// [`Self::is_update_available`] against an already loaded record.
    pub(crate) async fn update_available_for(&self, prefs: &PreferenceRecord) -> Result<bool> {
        let latest = self
            .catalog
            .latest_build_number(&prefs.server_address)
            .await?;
        Ok(latest.as_str() != prefs.actual_build)
    }

    /// Queue an install of `build`, or of the preferred build when omitted.
    ///
    /// A concrete `build` is recorded as `actualBuild` before the task is
    /// queued. The task is built from the single record this call read or
    /// wrote.
    #[instrument(skip(self))]
    pub async fn start_update(&self, build: Option<&str>) -> Result<InstallTask> {
        let (prefs, target) = match build {
            Some(requested) => match BuildTarget::parse(requested)? {
                BuildTarget::Exact(id) => {
                    let prefs = self.preferences.set_actual_build(id.as_str()).await?;
                    (prefs, BuildTarget::Exact(id))
                }
                BuildTarget::Latest => (self.preferences.load().await?, BuildTarget::Latest),
            },
            None => {
                let prefs = self.preferences.load().await?;
                let target = prefs.preferred_target()?;
                (prefs, target)
            }
        };
        Ok(self.enqueue(&prefs, target, TaskOrigin::Manual))
    }

    /// Queue an install of `prefs`' preferred build for the background
    /// checker.
    pub(crate) fn enqueue_preferred(
        &self,
        prefs: &PreferenceRecord,
        origin: TaskOrigin,
    ) -> Result<InstallTask> {
        let target = prefs.preferred_target()?;
        Ok(self.enqueue(prefs, target, origin))
    }

    fn enqueue(&self, prefs: &PreferenceRecord, target: BuildTarget, origin: TaskOrigin) -> InstallTask {
        let task = InstallTask::new(target, prefs.server_address.clone(), origin);
        self.queue.enqueue(task.clone());
        task
    }

    /// Worker status; a terminal state is returned once, then reset.
    pub fn status(&self) -> StatusSnapshot {
        self.queue.status()
    }
}
