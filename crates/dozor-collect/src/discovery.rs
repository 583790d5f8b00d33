//! Container discovery and status inspection, CLI path (§4.2.1).
//!
//! The preferred native-runtime-API path (container lifecycle events feeding
//! a 30 s TTL cache) is not implemented; see `Collector` for the trait
//! boundary that would carry it.

use crate::error::CollectError;
use chrono::{DateTime, Utc};
use dozor_proto::{ServiceState, ServiceStatus};
use dozor_transport::Transport;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A container name matches a service if any comma-separated name element
/// equals or contains the service string (§4.2.1).
pub fn container_matches_service(container_name: &str, service: &str) -> bool {
    container_name
        .split(',')
        .map(str::trim)
        .any(|elem| elem == service || elem.contains(service))
}

fn parse_labels(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

struct RawContainer {
    names: String,
    state: String,
    labels: HashMap<String, String>,
}

pub struct ContainerDiscovery {
    transport: Arc<dyn Transport>,
}

impl ContainerDiscovery {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn list_containers(&self, cancel: &CancellationToken) -> Result<Vec<RawContainer>, CollectError> {
        let args = vec!["ps".to_string(), "--format".to_string(), "json".to_string()];
        let result = self.transport.docker_compose_command(cancel, &args).await?;

        let mut containers = Vec::new();
        for line in result.stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, line, "skipping unparsable compose ps line");
                    continue;
                }
            };
            let names = value.get("Names").or_else(|| value.get("Name")).and_then(Value::as_str).unwrap_or("").to_string();
            let state = value.get("State").and_then(Value::as_str).unwrap_or("unknown").to_string();
            let labels = value.get("Labels").and_then(Value::as_str).map(parse_labels).unwrap_or_default();
            containers.push(RawContainer { names, state, labels });
        }
        Ok(containers)
    }

    /// Unions explicit `configured_services` with label-opted-in
    /// (`dozor.enable=true`) and discovered compose services, then inspects
    /// each matching container for detailed status.
    pub async fn discover(
        &self,
        cancel: &CancellationToken,
        configured_services: &[String],
    ) -> Result<Vec<ServiceStatus>, CollectError> {
        let containers = self.list_containers(cancel).await?;

        let mut wanted: HashSet<String> = configured_services.iter().cloned().collect();
        for c in &containers {
            if c.labels.get("dozor.enable").map(|v| v == "true").unwrap_or(false) {
                let name = c.labels.get("dozor.name").cloned().unwrap_or_else(|| c.names.clone());
                wanted.insert(name);
            }
        }

        let mut statuses = Vec::new();
        for service in wanted {
            let matching = containers.iter().find(|c| container_matches_service(&c.names, &service));
            let Some(container) = matching else {
                let mut status = ServiceStatus::new(&service, ServiceState::Unknown);
                status.health = Some("container not found".to_string());
                statuses.push(status);
                continue;
            };

            let mut status = ServiceStatus::new(&service, ServiceState::parse(&container.state));
            status.labels = container.labels.clone();
            status.healthcheck_url = container.labels.get("dozor.healthcheck.url").cloned();
            status.alert_channel = container.labels.get("dozor.alert.channel").cloned();

            if let Err(e) = self.inspect_into(cancel, &container.names, &mut status).await {
                debug!(service = %service, error = %e, "inspect failed, using compose ps fields only");
            }
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Runs `docker inspect <container>` and fills in `State.Status`,
    /// `StartedAt`, restart count, and the health subdocument.
    async fn inspect_into(
        &self,
        cancel: &CancellationToken,
        container: &str,
        status: &mut ServiceStatus,
    ) -> Result<(), CollectError> {
        let name = container.split(',').next().unwrap_or(container).trim().to_string();
        let args = vec!["inspect".to_string(), name];
        let result = self.transport.docker_command(cancel, &args).await?;
        let parsed: Value = serde_json::from_str(&result.stdout)
            .map_err(|e| CollectError::Parse(format!("docker inspect output: {e}")))?;
        let entry = parsed.as_array().and_then(|a| a.first()).ok_or_else(|| CollectError::Parse("empty inspect result".into()))?;

        if let Some(state) = entry.get("State") {
            if let Some(status_str) = state.get("Status").and_then(Value::as_str) {
                status.state = ServiceState::parse(status_str);
            }
            if let Some(started_at) = state.get("StartedAt").and_then(Value::as_str) {
                if let Ok(started) = DateTime::parse_from_rfc3339(started_at) {
                    let elapsed = Utc::now().signed_duration_since(started.with_timezone(&Utc));
                    status.uptime = Some(format!("{}s", elapsed.num_seconds().max(0)));
                }
            }
            if let Some(health) = state.get("Health").and_then(|h| h.get("Status")).and_then(Value::as_str) {
                status.health = Some(health.to_string());
            }
        }
        if let Some(count) = entry.get("RestartCount").and_then(Value::as_u64) {
            status.restart_count = count as u32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_match_handles_exact_and_substring() {
        assert!(container_matches_service("myapp_web_1", "web"));
        assert!(container_matches_service("web", "web"));
        assert!(!container_matches_service("database", "web"));
        assert!(container_matches_service("web,api", "api"));
    }

    #[test]
    fn parse_labels_splits_comma_separated_pairs() {
        let labels = parse_labels("dozor.enable=true,dozor.group=core");
        assert_eq!(labels.get("dozor.enable"), Some(&"true".to_string()));
        assert_eq!(labels.get("dozor.group"), Some(&"core".to_string()));
    }
}
