//! buildcastd - Buildcast distribution server
//!
//! Serves the build catalog found under `--builds-dir`:
//!
//! - `GET /api/builds/getbuilds`: every build with its changelog
//! - `GET /api/builds/getbuild?buildNumber=`: raw image bytes
//! - `GET /api/builds/getchangelog?buildNumber=`: changelog text
//! - `GET /api/builds/getlatestbuildnumber`: newest build number
//!
//! `buildNumber` accepts the alias `latest`.

mod http;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use buildcast_core::FsBuildCatalog;
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "buildcastd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Buildcast distribution server", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BUILDCASTD_LISTEN", default_value = "0.0.0.0:5000")]
    listen: SocketAddr,

    /// Directory holding one subdirectory per build
    #[arg(long, env = "BUILDCASTD_BUILDS_DIR", default_value = "./Builds")]
    builds_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    buildcast_core::init_tracing(cli.json, buildcast_core::level_for(cli.verbose));

    let catalog = FsBuildCatalog::new(&cli.builds_dir)
        .with_context(|| format!("Failed to open builds directory {}", cli.builds_dir.display()))?;

    match catalog.latest_build_number().await {
        Ok(latest) => info!(builds_dir = %cli.builds_dir.display(), %latest, "catalog opened"),
        Err(e) => warn!(builds_dir = %cli.builds_dir.display(), error = %e, "catalog opened without builds"),
    }

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!(listen = %cli.listen, version = buildcast_core::VERSION, "buildcastd listening");

    axum::serve(listener, http::router(catalog))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("buildcastd shut down");
    Ok(())
}

/// Wait for Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => {
            warn!(error = %e, "failed to install Ctrl-C handler, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["buildcastd"]).unwrap();
        assert_eq!(cli.listen, "0.0.0.0:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(cli.builds_dir, PathBuf::from("./Builds"));
        assert!(!cli.verbose);
        assert!(!cli.json);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "buildcastd",
            "--listen",
            "127.0.0.1:6000",
            "--builds-dir",
            "/srv/builds",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.listen.port(), 6000);
        assert_eq!(cli.builds_dir, PathBuf::from("/srv/builds"));
        assert!(cli.json);
    }
}
