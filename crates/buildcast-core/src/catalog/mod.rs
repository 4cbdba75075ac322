//! Server-side build catalog.
//!
//! A catalog is a directory with one subdirectory per build, named by its
//! build identifier:
//!
//! ```text
//! <root>/
//!   15.03.2024.1200/
//!     15.03.2024.1200.image
//!     changelog.md          (optional)
//! ```

pub mod fs;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::BuildIdentifier;

/// Name of the optional changelog artifact inside a build directory.
pub const CHANGELOG_FILE: &str = "changelog.md";

/// Extension of the image artifact, `<id>.image`.
pub const IMAGE_EXTENSION: &str = "image";

/// Build identifier → changelog text, ordered by identifier text.
pub type BuildListing = BTreeMap<String, String>;

/// File name of the image artifact for `id`.
pub fn image_file_name(id: &BuildIdentifier) -> String {
    format!("{}.{}", id.as_str(), IMAGE_EXTENSION)
}

/// A located image artifact, ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub id: BuildIdentifier,
    pub path: PathBuf,
    pub size: u64,
}

pub use fs::FsBuildCatalog;
