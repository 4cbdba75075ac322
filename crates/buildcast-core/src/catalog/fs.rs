//! Server-side build catalog over a directory tree.
//!
//! Directory names are build identifiers; images are served from disk by
//! path, never buffered here.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{image_file_name, BuildArtifact, BuildListing, CHANGELOG_FILE};
use crate::domain::{resolve_latest, BuildIdentifier, BuildTarget, BuildcastError, Result};

/// Filesystem-backed build catalog.
///
/// Layout: `<root>/<id>/<id>.image` plus an optional `<root>/<id>/changelog.md`.
/// Entries whose directory name is not a valid build identifier are ignored.
#[derive(Debug, Clone)]
pub struct FsBuildCatalog {
    root: PathBuf,
}

impl FsBuildCatalog {
    /// Open the catalog rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, id: &BuildIdentifier) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Basenames of every build directory, in lexicographic order.
    ///
    /// Invalid names are included; callers filter them.
    pub async fn entry_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => warn!(name = ?raw, "skipping non UTF-8 catalog entry"),
            }
        }
        names.sort();
        Ok(names)
    }

    /// The newest valid build in the catalog.
    pub async fn latest_build_number(&self) -> Result<BuildIdentifier> {
        resolve_latest(self.entry_names().await?)
    }

    /// Turn `"latest"` or an identifier into an identifier naming an
    /// existing catalog entry.
    pub async fn resolve(&self, requested: &str) -> Result<BuildIdentifier> {
        let id = match BuildTarget::parse(requested)? {
            BuildTarget::Latest => self.latest_build_number().await?,
            BuildTarget::Exact(id) => id,
        };
        if !tokio::fs::try_exists(self.entry_dir(&id)).await? {
            return Err(BuildcastError::BuildNotFound(id.to_string()));
        }
        debug!(requested, resolved = %id, "resolved build");
        Ok(id)
    }

    /// Changelog text of the requested build.
    pub async fn changelog(&self, requested: &str) -> Result<String> {
        let id = self.resolve(requested).await?;
        self.read_changelog(&id)
            .await?
            .ok_or_else(|| BuildcastError::ChangelogMissing(id.to_string()))
    }

    async fn read_changelog(&self, id: &BuildIdentifier) -> Result<Option<String>> {
        let path = self.entry_dir(id).join(CHANGELOG_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every valid build with its changelog; a missing changelog maps to "".
    pub async fn list_builds(&self) -> Result<BuildListing> {
        let mut listing = BuildListing::new();
        for name in self.entry_names().await? {
            let Ok(id) = BuildIdentifier::parse(&name) else {
                debug!(name, "skipping invalid catalog entry");
                continue;
            };
            let changelog = self.read_changelog(&id).await?.unwrap_or_default();
            listing.insert(name, changelog);
        }
        Ok(listing)
    }

    /// Locate the image artifact of the requested build.
    pub async fn build_artifact(&self, requested: &str) -> Result<BuildArtifact> {
        let id = self.resolve(requested).await?;
        let path = self.entry_dir(&id).join(image_file_name(&id));
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(BuildcastError::BuildArtifactMissing(id.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BuildcastError::BuildArtifactMissing(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(BuildArtifact {
            id,
            path,
            size: meta.len(),
        })
    }
}
