//! Agent-side access to a build server.
//!
//! [`CatalogClient`] is the wire contract the agent relies on. The server
//! address is passed per call because it lives in the user's preferences
//! and can change between two requests.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::catalog::{BuildListing, FsBuildCatalog};
use crate::domain::{BuildIdentifier, BuildcastError, Result};

/// Chunks of an image body as they arrive.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// An image download in progress.
pub struct BuildDownload {
    /// Body length when the server announced one.
    pub total_bytes: Option<u64>,
    pub chunks: ByteStream,
}

impl std::fmt::Debug for BuildDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildDownload")
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

/// Build server operations used by the agent.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Succeeds if the server answers at all.
    async fn probe(&self, server: &str) -> Result<()>;

    async fn list_builds(&self, server: &str) -> Result<BuildListing>;

    /// Changelog of a build number or `"latest"`.
    async fn changelog(&self, server: &str, requested: &str) -> Result<String>;

    async fn latest_build_number(&self, server: &str) -> Result<BuildIdentifier>;

    async fn open_build(&self, server: &str, id: &BuildIdentifier) -> Result<BuildDownload>;
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCatalogConfig {
    /// Limit on establishing a connection; transfers themselves are unbounded.
    pub connect_timeout: Duration,
    /// Limit on the small metadata requests and the probe.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpCatalogConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("buildcast-agent/{}", crate::VERSION),
        }
    }
}

/// [`CatalogClient`] speaking to a `buildcastd` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    config: HttpCatalogConfig,
    http_client: reqwest::Client,
}

impl HttpCatalogClient {
    pub fn new(config: HttpCatalogConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| BuildcastError::ServerUnreachable(format!("http client setup: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(server: &str, path: &str) -> String {
        format!("{}/api/builds/{}", server.trim_end_matches('/'), path)
    }

    async fn get(&self, url: &str, query: &[(&str, &str)], bounded: bool) -> Result<reqwest::Response> {
        debug!(url, "requesting");
        let mut request = self.http_client.get(url).query(query);
        if bounded {
            request = request.timeout(self.config.request_timeout);
        }
        let response = request.send().await.map_err(unreachable)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(BuildcastError::ServerRejected { status, message })
    }

    async fn get_text(&self, path: &str, server: &str, query: &[(&str, &str)]) -> Result<String> {
        self.get(&Self::endpoint(server, path), query, true)
            .await?
            .text()
            .await
            .map_err(unreachable)
    }
}

fn unreachable(err: reqwest::Error) -> BuildcastError {
    BuildcastError::ServerUnreachable(err.to_string())
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn probe(&self, server: &str) -> Result<()> {
        self.http_client
            .get(server)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map(|_| ())
            .map_err(unreachable)
    }

    async fn list_builds(&self, server: &str) -> Result<BuildListing> {
        let body = self.get_text("getbuilds", server, &[]).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn changelog(&self, server: &str, requested: &str) -> Result<String> {
        self.get_text("getchangelog", server, &[("buildNumber", requested)])
            .await
    }

    async fn latest_build_number(&self, server: &str) -> Result<BuildIdentifier> {
        let body = self.get_text("getlatestbuildnumber", server, &[]).await?;
        BuildIdentifier::parse(body.trim())
    }

    async fn open_build(&self, server: &str, id: &BuildIdentifier) -> Result<BuildDownload> {
        let url = Self::endpoint(server, "getbuild");
        let response = self
            .get(&url, &[("buildNumber", id.as_str())], false)
            .await?;
        let total_bytes = response.content_length();
        let chunks = response.bytes_stream().map_err(unreachable).boxed();
        Ok(BuildDownload {
            total_bytes,
            chunks,
        })
    }
}

/// In-process [`CatalogClient`] over an [`FsBuildCatalog`].
///
/// Ignores the server address. Reachability can be toggled to exercise the
/// agent's offline paths.
#[derive(Debug)]
pub struct LocalCatalogClient {
    catalog: FsBuildCatalog,
    reachable: AtomicBool,
}

impl LocalCatalogClient {
    pub fn new(catalog: FsBuildCatalog) -> Self {
        Self {
            catalog,
            reachable: AtomicBool::new(true),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_reachable(&self, server: &str) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BuildcastError::ServerUnreachable(server.to_string()))
        }
    }
}

#[async_trait]
impl CatalogClient for LocalCatalogClient {
    async fn probe(&self, server: &str) -> Result<()> {
        self.check_reachable(server)
    }

    async fn list_builds(&self, server: &str) -> Result<BuildListing> {
        self.check_reachable(server)?;
        self.catalog.list_builds().await
    }

    async fn changelog(&self, server: &str, requested: &str) -> Result<String> {
        self.check_reachable(server)?;
        self.catalog.changelog(requested).await
    }

    async fn latest_build_number(&self, server: &str) -> Result<BuildIdentifier> {
        self.check_reachable(server)?;
        self.catalog.latest_build_number().await
    }

    async fn open_build(&self, server: &str, id: &BuildIdentifier) -> Result<BuildDownload> {
        self.check_reachable(server)?;
        let artifact = self.catalog.build_artifact(id.as_str()).await?;
        let file = tokio::fs::File::open(&artifact.path).await?;
        let chunks = ReaderStream::new(file).map_err(BuildcastError::from).boxed();
        Ok(BuildDownload {
            total_bytes: Some(artifact.size),
            chunks,
        })
    }
}
