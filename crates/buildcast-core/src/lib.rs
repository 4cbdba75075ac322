//! Buildcast Core Library
//!
//! Everything both processes share: build identifiers and the catalog on the
//! server side, and the preference service, install queue, pipeline and
//! background checker on the agent side.

pub mod agent;
pub mod catalog;
pub mod checker;
pub mod client;
pub mod deployer;
pub mod domain;
pub mod download;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod preferences;
pub mod queue;
pub mod telemetry;
pub mod worker;

/// Crate version, shared by both binaries.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use domain::{
    resolve_latest, BuildIdentifier, BuildTarget, BuildcastError, PreferenceRecord,
    PreferenceUpdate, QueueStatus, Result, StatusSnapshot, LATEST_ALIAS,
};

pub use agent::UpdateAgent;
pub use catalog::{BuildArtifact, BuildListing, FsBuildCatalog};
pub use checker::{BackgroundChecker, CheckerConfig};
pub use client::{
    BuildDownload, ByteStream, CatalogClient, HttpCatalogClient, HttpCatalogConfig,
    LocalCatalogClient,
};
pub use deployer::{Deployer, DockerComposeConfig, DockerComposeDeployer};
pub use pipeline::{InstallExecutor, InstallPipeline, InstallStage, PipelineConfig};
pub use preferences::{PreferenceService, PREFERENCES_KEY};
pub use queue::{InstallQueue, InstallTask, StatusRegister, TaskOrigin};
pub use worker::run_install_worker;

pub use obs::{
    emit_checker_tick, emit_install_enqueued, emit_install_failed, emit_install_finished,
    emit_install_stage, emit_install_started, install_span,
};
pub use telemetry::{init_tracing, level_for};

pub use buildcast_state::{PreferenceStore, SurrealHandle, SurrealPreferenceStore};
