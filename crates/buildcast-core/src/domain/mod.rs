//! Domain models for Buildcast.
//!
//! Canonical definitions for the core entities:
//! - `BuildIdentifier`: timestamp-encoded build name, and the "latest" alias
//! - `PreferenceRecord`: the agent's single persisted settings row
//! - `QueueStatus` / `StatusSnapshot`: what pollers see of the install worker

pub mod build;
pub mod error;
pub mod preferences;
pub mod status;

// Re-export main types and errors
pub use build::{resolve_latest, BuildIdentifier, BuildTarget, LATEST_ALIAS};
pub use error::{BuildcastError, Result};
pub use preferences::{PreferenceRecord, PreferenceUpdate};
pub use status::{QueueStatus, StatusSnapshot};
