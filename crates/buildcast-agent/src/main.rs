//! buildcast-agent - Buildcast edge agent
//!
//! Keeps the update preferences, polls the configured build server, and
//! installs builds one at a time through docker.
//!
//! ## Tasks
//!
//! - HTTP surface under `/Updates/`
//! - install worker draining the install queue
//! - background checker polling for new builds

mod http;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use buildcast_core::{
    run_install_worker, BackgroundChecker, CatalogClient, CheckerConfig, Deployer,
    DockerComposeConfig, DockerComposeDeployer, HttpCatalogClient, HttpCatalogConfig,
    InstallPipeline, InstallQueue, PipelineConfig, PreferenceService, UpdateAgent,
};
use buildcast_state::{SurrealHandle, SurrealPreferenceStore};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "buildcast-agent")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Buildcast edge agent", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BUILDCAST_AGENT_LISTEN", default_value = "0.0.0.0:5080")]
    listen: SocketAddr,

    /// Working directory; holds `Builds/` downloads and the `Data/` database
    #[arg(long, env = "BUILDCAST_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Compose file of the deployed workload (default: <data-dir>/WebApp/docker-compose.yml)
    #[arg(long, env = "BUILDCAST_COMPOSE_FILE")]
    compose_file: Option<PathBuf>,

    /// Docker executable
    #[arg(long, env = "BUILDCAST_DOCKER_BIN", default_value = "docker")]
    docker_bin: PathBuf,

    /// Limit for each docker command in seconds, 0 to wait forever
    #[arg(long, env = "BUILDCAST_DEPLOY_TIMEOUT_SECS", default_value_t = 1800)]
    deploy_timeout_secs: u64,

    /// Seconds between background update checks
    #[arg(long, env = "BUILDCAST_CHECK_INTERVAL_SECS", default_value_t = 300)]
    check_interval_secs: u64,

    /// Database URL (default: embedded database under <data-dir>/Data/buildcast.db)
    #[arg(long, env = "BUILDCAST_DATABASE_URL")]
    database_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn download_dir(&self) -> PathBuf {
        self.data_dir.join("Builds")
    }

    fn database_path(&self) -> PathBuf {
        self.data_dir.join("Data").join("buildcast.db")
    }

    fn deployer_config(&self) -> DockerComposeConfig {
        DockerComposeConfig {
            docker_bin: self.docker_bin.clone(),
            compose_file: self
                .compose_file
                .clone()
                .unwrap_or_else(|| self.data_dir.join("WebApp").join("docker-compose.yml")),
            command_timeout: (self.deploy_timeout_secs > 0)
                .then(|| Duration::from_secs(self.deploy_timeout_secs)),
        }
    }

    fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            interval: Duration::from_secs(self.check_interval_secs.max(1)),
        }
    }
}

async fn open_database(cli: &Cli) -> Result<SurrealHandle> {
    match &cli.database_url {
        Some(url) => SurrealHandle::connect(url)
            .await
            .with_context(|| format!("Failed to connect to database {url}")),
        None => open_local_database(&cli.database_path()).await,
    }
}

async fn open_local_database(path: &Path) -> Result<SurrealHandle> {
    SurrealHandle::open_local(path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    buildcast_core::init_tracing(cli.json, buildcast_core::level_for(cli.verbose));

    let handle = Arc::new(open_database(&cli).await?);
    let preferences = PreferenceService::new(Arc::new(SurrealPreferenceStore::new(handle)));

    let catalog: Arc<dyn CatalogClient> = Arc::new(
        HttpCatalogClient::new(HttpCatalogConfig::default())
            .context("Failed to build HTTP client")?,
    );
    let deployer: Arc<dyn Deployer> = Arc::new(DockerComposeDeployer::new(cli.deployer_config()));
    let queue = Arc::new(InstallQueue::new());

    let pipeline = Arc::new(InstallPipeline::new(
        PipelineConfig {
            download_dir: cli.download_dir(),
        },
        preferences.clone(),
        catalog.clone(),
        deployer,
    ));
    let agent = Arc::new(UpdateAgent::new(preferences, catalog, queue.clone()));

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(run_install_worker(queue, pipeline, cancel.clone()));
    let checker = tokio::spawn(
        BackgroundChecker::new(agent.clone(), cli.checker_config()).run(cancel.clone()),
    );

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!(
        listen = %cli.listen,
        data_dir = %cli.data_dir.display(),
        version = buildcast_core::VERSION,
        "buildcast-agent listening"
    );

    let served = axum::serve(listener, http::router(agent))
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("HTTP server error");

    cancel.cancel();
    if let Err(e) = worker.await {
        warn!(error = %e, "install worker ended abnormally");
    }
    if let Err(e) = checker.await {
        warn!(error = %e, "background checker ended abnormally");
    }

    info!("buildcast-agent shut down");
    served
}

/// Wait for Ctrl-C or an internal cancel, then cancel everything.
async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received shutdown signal"),
            Err(e) => {
                warn!(error = %e, "failed to install Ctrl-C handler");
                cancel.cancelled().await;
            }
        },
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
}
