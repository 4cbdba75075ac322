//! The agent's persisted preference record.

use serde::{Deserialize, Serialize};

use crate::domain::build::{BuildIdentifier, BuildTarget, LATEST_ALIAS};
use crate::domain::error::{BuildcastError, Result};

/// Singleton settings row, stored as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRecord {
    pub server_address: String,
    pub preferred_build: String,
    pub auto_update: bool,
    #[serde(default)]
    pub actual_build: String,
}

impl PreferenceRecord {
    /// The build the agent is currently aiming at: `actualBuild` once one has
    /// been installed or resolved, otherwise `preferredBuild`.
    pub fn current_target(&self) -> &str {
        if self.actual_build.is_empty() {
            &self.preferred_build
        } else {
            &self.actual_build
        }
    }

    /// `preferredBuild` as a typed target.
    pub fn preferred_target(&self) -> Result<BuildTarget> {
        BuildTarget::parse(&self.preferred_build)
    }
}

/// User-editable subset of [`PreferenceRecord`], the body of `SetPreferences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpdate {
    pub server_address: String,
    pub preferred_build: String,
    #[serde(default)]
    pub auto_update: bool,
}

impl PreferenceUpdate {
    /// Trim trailing slashes from the address and check both fields.
    pub fn normalized(self) -> Result<Self> {
        let server_address = self.server_address.trim_end_matches('/').to_string();
        if server_address.is_empty() {
            return Err(BuildcastError::InvalidPreferences(
                "serverAddress must not be empty".to_string(),
            ));
        }
        if self.preferred_build != LATEST_ALIAS && !BuildIdentifier::is_valid(&self.preferred_build)
        {
            return Err(BuildcastError::InvalidPreferences(format!(
                "preferredBuild must be \"{LATEST_ALIAS}\" or a build number, got \"{}\"",
                self.preferred_build
            )));
        }
        Ok(Self {
            server_address,
            ..self
        })
    }

    /// Apply onto an existing record, keeping `actualBuild`.
    pub fn apply_to(&self, existing: Option<PreferenceRecord>) -> PreferenceRecord {
        PreferenceRecord {
            server_address: self.server_address.clone(),
            preferred_build: self.preferred_build.clone(),
            auto_update: self.auto_update,
            actual_build: existing.map(|r| r.actual_build).unwrap_or_default(),
        }
    }
}
