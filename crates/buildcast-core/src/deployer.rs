//! Container runtime invocations used by the install pipeline.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::{BuildcastError, Result};

/// Loads an image and restarts the workload that runs it.
///
/// Each call blocks until the external step has finished.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn load(&self, image: &Path) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
}

/// How to reach docker and which compose project to restart.
#[derive(Debug, Clone)]
pub struct DockerComposeConfig {
    pub docker_bin: PathBuf,
    pub compose_file: PathBuf,
    /// Per-command limit. `None` waits forever.
    pub command_timeout: Option<Duration>,
}

impl Default for DockerComposeConfig {
    fn default() -> Self {
        Self {
            docker_bin: PathBuf::from("docker"),
            compose_file: PathBuf::from("WebApp").join("docker-compose.yml"),
            command_timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Outcome of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// [`Deployer`] backed by `docker load` and `docker compose`.
#[derive(Debug, Clone)]
pub struct DockerComposeDeployer {
    config: DockerComposeConfig,
}

impl DockerComposeDeployer {
    pub fn new(config: DockerComposeConfig) -> Self {
        Self { config }
    }

    fn compose_args(&self, tail: &[&str]) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "--file".to_string(),
            self.config.compose_file.display().to_string(),
        ];
        args.extend(tail.iter().map(|s| s.to_string()));
        args
    }

    /// Run docker with `args`; a non-zero exit or a timeout is a `DeployFailed`.
    async fn run(&self, args: Vec<String>) -> Result<CommandOutput> {
        let label = format!("{} {}", self.config.docker_bin.display(), args.join(" "));
        debug!(command = %label, "running deploy command");
        let start = Instant::now();

        let child = Command::new(&self.config.docker_bin)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildcastError::DeployFailed(format!("{label}: {e}")))?;

        let output = match self.config.command_timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    BuildcastError::DeployFailed(format!(
                        "{label}: timed out after {} seconds",
                        limit.as_secs()
                    ))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| BuildcastError::DeployFailed(format!("{label}: {e}")))?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if !output.status.success() {
            return Err(BuildcastError::DeployFailed(format!(
                "{label}: exit code {}: {}",
                result.exit_code,
                result.stderr.trim()
            )));
        }

        info!(command = %label, duration_ms = result.duration_ms, "deploy command finished");
        Ok(result)
    }
}

#[async_trait]
impl Deployer for DockerComposeDeployer {
    async fn load(&self, image: &Path) -> Result<()> {
        let args = vec!["load".to_string(), "-i".to_string(), image.display().to_string()];
        self.run(args).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.run(self.compose_args(&["down"])).await.map(|_| ())
    }

    async fn start(&self) -> Result<()> {
        self.run(self.compose_args(&["up", "-d"])).await.map(|_| ())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn with_bin(bin: &str, timeout: Option<Duration>) -> DockerComposeDeployer {
        DockerComposeDeployer::new(DockerComposeConfig {
            docker_bin: PathBuf::from(bin),
            compose_file: PathBuf::from("/srv/WebApp/docker-compose.yml"),
            command_timeout: timeout,
        })
    }

    #[test]
    fn compose_args_name_the_file() {
        let deployer = with_bin("docker", None);
        assert_eq!(
            deployer.compose_args(&["up", "-d"]),
            vec!["compose", "--file", "/srv/WebApp/docker-compose.yml", "up", "-d"]
        );
    }

    #[tokio::test]
    async fn successful_command_is_ok() {
        // `true` ignores its arguments and exits 0.
        let deployer = with_bin("true", Some(Duration::from_secs(10)));
        assert!(deployer.load(Path::new("/tmp/x.image")).await.is_ok());
        assert!(deployer.stop().await.is_ok());
        assert!(deployer.start().await.is_ok());
    }

    #[tokio::test]
    async fn non_zero_exit_is_deploy_failed() {
        let deployer = with_bin("false", None);
        match deployer.stop().await {
            Err(BuildcastError::DeployFailed(msg)) => {
                assert!(msg.contains("compose"));
                assert!(msg.contains("down"));
            }
            other => panic!("expected DeployFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_deploy_failed() {
        let deployer = with_bin("/nonexistent/docker", None);
        assert!(matches!(
            deployer.start().await,
            Err(BuildcastError::DeployFailed(_))
        ));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let deployer = DockerComposeDeployer::new(DockerComposeConfig {
            docker_bin: PathBuf::from("sleep"),
            compose_file: PathBuf::new(),
            command_timeout: Some(Duration::from_millis(100)),
        });
        // `sleep 5` outlives the limit.
        let result = deployer.run(vec!["5".to_string()]).await;
        match result {
            Err(BuildcastError::DeployFailed(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
