//! Background compose deploy: fire-and-forget launch, log-file status poll (§4.9).

use crate::error::RuntimeError;
use dozor_proto::deploy::DeployStatus;
use dozor_proto::DeployResult;
use dozor_transport::Transport;
use dozor_validate::sanitize_for_shell;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::info;

fn new_deploy_id() -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    format!("deploy-{millis}")
}

fn log_path(deploy_id: &str) -> String {
    let dir = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
    format!("{dir}/{deploy_id}.log")
}

/// Launches `docker compose` deploys in the background via a `nohup …
/// &`-composed shell command, and polls their status from the log file and
/// process liveness (§4.9 Background deploy).
pub struct BackgroundDeploy {
    transport: Arc<dyn Transport>,
}

impl BackgroundDeploy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn start(&self, project_path: &str, services: &[String], build: bool, pull: bool) -> Result<DeployResult, RuntimeError> {
        let deploy_id = new_deploy_id();
        let log_path = log_path(&deploy_id);
        let sentinel = DeployStatus::sentinel(&deploy_id);

        let mut body = format!("cd {}", sanitize_for_shell(project_path));
        if pull {
            body.push_str(" && docker compose pull");
        }
        body.push_str(" && docker compose up -d");
        if build {
            body.push_str(" --build");
        }
        for service in services {
            body.push(' ');
            body.push_str(&sanitize_for_shell(service));
        }
        body.push_str(&format!(" && echo {}", sanitize_for_shell(&sentinel)));

        let command = format!("nohup sh -c {} > {} 2>&1 &", sanitize_for_shell(&body), sanitize_for_shell(&log_path));

        let cancel = CancellationToken::new();
        self.transport.execute(&cancel, &command).await?;
        info!(deploy_id, "started background deploy");

        Ok(DeployResult { deploy_id, log_path })
    }

    pub async fn status(&self, deploy_id: &str) -> Result<DeployStatus, RuntimeError> {
        let log_path = log_path(deploy_id);
        let log_content = tokio::fs::read_to_string(&log_path).await.unwrap_or_default();
        let process_running = self.is_running(deploy_id).await;
        Ok(DeployStatus::derive(deploy_id, process_running, log_content))
    }

    async fn is_running(&self, deploy_id: &str) -> bool {
        let cancel = CancellationToken::new();
        let pattern = sanitize_for_shell(deploy_id);
        let check = format!("pgrep -f {pattern} > /dev/null");
        match self.transport.execute(&cancel, &check).await {
            Ok(result) => result.success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_ids_match_the_shared_validator() {
        let id = new_deploy_id();
        assert!(dozor_validate::is_valid_deploy_id(&id));
    }

    #[test]
    fn log_path_defaults_under_tmp() {
        let path = log_path("deploy-1732550400000");
        assert!(path.ends_with("deploy-1732550400000.log"));
    }
}
