//! Single entry point for executing a shell fragment and receiving its
//! stdout/stderr/exit (§4.1).

#![forbid(unsafe_code)]

use async_trait::async_trait;
use dozor_proto::Config;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("command timed out or was canceled")]
    Canceled,
    #[error("i/o error communicating with child process: {0}")]
    Io(#[source] std::io::Error),
    #[error("no docker-compose project file found in any candidate location")]
    ComposeFileNotFound,
}

/// Outcome of running one command (§3/§4.1).
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandResult {
    /// `Success ⇔ exit==0`.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout if non-empty, else stderr.
    pub fn output(&self) -> &str {
        if !self.stdout.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Single entry point for executing a shell fragment (§4.1). The production
/// implementation is [`ShellTransport`]; tests substitute a fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs `cmd` as a shell fragment, local or remote depending on config.
    async fn execute(&self, cancel: &CancellationToken, cmd: &str) -> Result<CommandResult, TransportError>;

    /// Runs `program` with `args` directly, without a `docker`/`compose` prefix.
    async fn execute_unsafe(
        &self,
        cancel: &CancellationToken,
        program: &str,
        args: &[String],
    ) -> Result<CommandResult, TransportError>;

    /// Runs `docker <args>`.
    async fn docker_command(&self, cancel: &CancellationToken, args: &[String]) -> Result<CommandResult, TransportError> {
        let mut full = vec!["docker".to_string()];
        full.extend_from_slice(args);
        self.execute_unsafe(cancel, &full[0], &full[1..]).await
    }

    /// Runs `docker compose -f <resolved project file> <args>`.
    async fn docker_compose_command(
        &self,
        cancel: &CancellationToken,
        args: &[String],
    ) -> Result<CommandResult, TransportError>;
}

/// A handful of conventional locations probed when the configured compose
/// path does not exist, in order.
const COMPOSE_FALLBACKS: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    "/opt/app/docker-compose.yml",
    "/srv/app/docker-compose.yml",
];

/// Shell/SSH transport. Resolves and caches the compose project path once
/// per process lifetime.
pub struct ShellTransport {
    config: Arc<Config>,
    compose_path: OnceCell<PathBuf>,
}

impl ShellTransport {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config, compose_path: OnceCell::new() }
    }

    async fn resolve_compose_path(&self) -> Result<&PathBuf, TransportError> {
        self.compose_path
            .get_or_try_init(|| async {
                let configured = &self.config.compose_path;
                let candidates: Vec<PathBuf> = std::iter::once(configured.clone())
                    .filter(|s| !s.is_empty())
                    .chain(COMPOSE_FALLBACKS.iter().map(|s| s.to_string()))
                    .map(PathBuf::from)
                    .collect();

                for candidate in &candidates {
                    if self.config.is_local() {
                        if tokio::fs::metadata(candidate).await.is_ok() {
                            debug!(path = %candidate.display(), "resolved compose project file");
                            return Ok(candidate.clone());
                        }
                    } else {
                        // Remote: probe with `test -f` over the same transport this
                        // struct otherwise uses, rather than touching the local fs.
                        let check = self.run_raw(&format!("test -f {}", candidate.display())).await;
                        if matches!(check, Ok(r) if r.success()) {
                            return Ok(candidate.clone());
                        }
                    }
                }
                Err(TransportError::ComposeFileNotFound)
            })
            .await
    }

    /// Spawns `program args...` as configured (local subprocess or SSH),
    /// honoring cancellation.
    async fn spawn(
        &self,
        cancel: &CancellationToken,
        program: &str,
        args: &[String],
    ) -> Result<CommandResult, TransportError> {
        let mut command = if self.config.is_local() {
            let mut c = Command::new(program);
            c.args(args);
            c
        } else {
            let mut c = Command::new("ssh");
            c.args([
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-T",
                "-p",
                &self.config.ssh_port.to_string(),
                &format!("{}@{}", self.config.ssh_user, self.config.host),
            ]);
            let mut remote = vec![program.to_string()];
            remote.extend(args.iter().cloned());
            c.arg(remote.join(" "));
            c
        };
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let mut child = command.spawn().map_err(TransportError::Spawn)?;

        tokio::select! {
            result = child.wait_with_output() => {
                let output = result.map_err(TransportError::Io)?;
                Ok(CommandResult {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                })
            }
            _ = cancel.cancelled() => {
                warn!(program, "transport canceled, child process killed");
                Err(TransportError::Canceled)
            }
        }
    }

    async fn run_raw(&self, cmd: &str) -> Result<CommandResult, TransportError> {
        let cancel = CancellationToken::new();
        let args = vec!["-c".to_string(), cmd.to_string()];
        self.spawn(&cancel, "sh", &args).await
    }
}

#[async_trait]
impl Transport for ShellTransport {
    async fn execute(&self, cancel: &CancellationToken, cmd: &str) -> Result<CommandResult, TransportError> {
        let args = vec!["-c".to_string(), cmd.to_string()];
        self.spawn(cancel, "sh", &args).await
    }

    async fn execute_unsafe(
        &self,
        cancel: &CancellationToken,
        program: &str,
        args: &[String],
    ) -> Result<CommandResult, TransportError> {
        self.spawn(cancel, program, args).await
    }

    async fn docker_compose_command(
        &self,
        cancel: &CancellationToken,
        args: &[String],
    ) -> Result<CommandResult, TransportError> {
        let project_file = self.resolve_compose_path().await?;
        let mut full = vec!["compose".to_string(), "-f".to_string(), project_file.display().to_string()];
        full.extend_from_slice(args);
        self.spawn(cancel, "docker", &full).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn local_config() -> Arc<Config> {
        Arc::new(Config { host: "local".to_string(), ..Config::default() })
    }

    #[tokio::test]
    async fn local_command_runs_and_captures_stdout() {
        let transport = ShellTransport::new(local_config());
        let cancel = CancellationToken::new();
        let result = transport.execute(&cancel, "echo hello").await.unwrap();
        assert!(result.success());
        assert_eq!(result.output().trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_success() {
        let transport = ShellTransport::new(local_config());
        let cancel = CancellationToken::new();
        let result = transport.execute(&cancel, "exit 3").await.unwrap();
        assert!(!result.success());
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn output_falls_back_to_stderr_when_stdout_empty() {
        let transport = ShellTransport::new(local_config());
        let cancel = CancellationToken::new();
        let result = transport.execute(&cancel, "echo err >&2").await.unwrap();
        assert_eq!(result.output().trim(), "err");
    }

    #[tokio::test]
    async fn cancellation_aborts_a_long_running_command() {
        let transport = ShellTransport::new(local_config());
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });
        let result = transport.execute(&cancel, "sleep 5").await;
        assert!(matches!(result, Err(TransportError::Canceled)));
    }

    #[tokio::test]
    async fn compose_path_resolves_once_and_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let compose_file = dir.path().join("docker-compose.yml");
        std::fs::write(&compose_file, "services: {}").unwrap();

        let config = Arc::new(Config {
            host: "local".to_string(),
            compose_path: compose_file.display().to_string(),
            ..Config::default()
        });
        let transport = ShellTransport::new(config);
        let first = transport.resolve_compose_path().await.unwrap().clone();
        let second = transport.resolve_compose_path().await.unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first, compose_file);
    }

    #[tokio::test]
    async fn compose_path_falls_back_to_conventional_names() {
        let dir = tempfile::tempdir().unwrap();
        // cd into the temp dir for the lifetime of this test, since the
        // fallback list is relative.
        let guard = StdMutex::new(());
        let _lock = guard.lock().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        std::fs::write(dir.path().join("compose.yaml"), "services: {}").unwrap();

        let config = Arc::new(Config { host: "local".to_string(), compose_path: String::new(), ..Config::default() });
        let transport = ShellTransport::new(config);
        let resolved = transport.resolve_compose_path().await;
        std::env::set_current_dir(original).unwrap();
        assert!(resolved.is_ok());
    }
}
