//! systemd unit status, local or remote (`server_services` / `server_remote`, §6).

use crate::error::CollectError;
use dozor_transport::Transport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct UnitStatus {
    pub unit: String,
    pub active: bool,
    pub sub_state: String,
    pub raw: String,
}

pub struct SystemdCollector {
    transport: Arc<dyn Transport>,
}

impl SystemdCollector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn status(&self, cancel: &CancellationToken, unit: &str) -> Result<UnitStatus, CollectError> {
        let result = self.transport.execute(cancel, &format!("systemctl is-active {unit}")).await?;
        let sub_state = result.output().trim().to_string();
        Ok(UnitStatus { unit: unit.to_string(), active: sub_state == "active", sub_state, raw: result.output().to_string() })
    }

    pub async fn restart(&self, cancel: &CancellationToken, unit: &str) -> Result<bool, CollectError> {
        let result = self.transport.execute(cancel, &format!("systemctl restart {unit}")).await?;
        Ok(result.success())
    }

    /// Restarts every unit in `units`, continuing past individual failures
    /// and reporting which ones did not restart cleanly.
    pub async fn restart_all(&self, cancel: &CancellationToken, units: &[String]) -> Result<Vec<(String, bool)>, CollectError> {
        let mut results = Vec::with_capacity(units.len());
        for unit in units {
            results.push((unit.clone(), self.restart(cancel, unit).await?));
        }
        Ok(results)
    }

    pub async fn logs(&self, cancel: &CancellationToken, unit: &str, lines: usize) -> Result<String, CollectError> {
        let result = self.transport.execute(cancel, &format!("journalctl -u {unit} -n {lines} --no-pager")).await?;
        Ok(result.output().to_string())
    }
}
