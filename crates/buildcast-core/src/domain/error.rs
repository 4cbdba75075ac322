//! Domain-level error taxonomy for Buildcast.

use buildcast_state::StorageError;

/// Buildcast domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BuildcastError {
    #[error("Update Preferences Not Found.")]
    PreferencesNotFound,

    #[error("invalid preferences: {0}")]
    InvalidPreferences(String),

    #[error("build server unreachable: {0}")]
    ServerUnreachable(String),

    #[error("build server returned {status}: {message}")]
    ServerRejected { status: u16, message: String },

    #[error("Invalid Build Number: {0}")]
    InvalidBuildNumber(String),

    #[error("Build not found: {0}")]
    BuildNotFound(String),

    #[error("Build Has No Changelog: {0}")]
    ChangelogMissing(String),

    #[error("Build has no image artifact: {0}")]
    BuildArtifactMissing(String),

    #[error("No Builds Found.")]
    NoBuildsFound,

    #[error("deploy failed: {0}")]
    DeployFailed(String),

    #[error("install queue inconsistency: {0}")]
    QueueInconsistency(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for BuildcastError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => BuildcastError::PreferencesNotFound,
            other => BuildcastError::Storage(other.to_string()),
        }
    }
}

/// Result type for Buildcast domain operations.
pub type Result<T> = std::result::Result<T, BuildcastError>;
