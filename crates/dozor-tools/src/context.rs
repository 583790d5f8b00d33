//! Shared state every tool executes against (§4.6).
//!
//! `DeployManager`, `ApprovalSink`, and `DevModeController` are trait seams:
//! their implementations live in `dozor-runtime`, which depends on this
//! crate, so the concrete deploy/approval/watch machinery is injected here
//! rather than this crate depending back on `dozor-runtime`.

use async_trait::async_trait;
use dozor_collect::{ContainerDiscovery, LogCollector, SystemdCollector};
use dozor_proto::{Config, DeployResult, DeployStatus};
use dozor_transport::Transport;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Denied,
    TimedOut,
}

#[async_trait]
pub trait DeployManager: Send + Sync {
    async fn start(
        &self,
        project_path: &str,
        services: &[String],
        build: bool,
        pull: bool,
    ) -> Result<DeployResult, crate::error::ToolError>;

    async fn status(&self, deploy_id: &str) -> Result<DeployStatus, crate::error::ToolError>;
}

#[async_trait]
pub trait ApprovalSink: Send + Sync {
    /// Creates a pending approval for `command`, notifies the admin over the
    /// outbound bus, and blocks until resolved or the default timeout elapses.
    async fn request(&self, command: &str) -> ApprovalOutcome;
}

pub trait DevModeController: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    fn exclude(&self, services: &[String], ttl: std::time::Duration);
    fn include(&self, services: &[String]);
    fn excluded(&self) -> Vec<String>;
}

pub struct ToolContext {
    pub config: Arc<Config>,
    pub local: Arc<dyn Transport>,
    pub remote: Option<Arc<dyn Transport>>,
    pub discovery: ContainerDiscovery,
    pub logs: LogCollector,
    pub systemd: SystemdCollector,
    pub remote_systemd: Option<SystemdCollector>,
    pub deploy: Arc<dyn DeployManager>,
    pub approvals: Arc<dyn ApprovalSink>,
    pub dev_mode: Arc<dyn DevModeController>,
}

impl ToolContext {
    pub fn new(
        config: Arc<Config>,
        local: Arc<dyn Transport>,
        remote: Option<Arc<dyn Transport>>,
        deploy: Arc<dyn DeployManager>,
        approvals: Arc<dyn ApprovalSink>,
        dev_mode: Arc<dyn DevModeController>,
    ) -> Self {
        let discovery = ContainerDiscovery::new(local.clone());
        let logs = LogCollector::new(local.clone());
        let systemd = SystemdCollector::new(local.clone());
        let remote_systemd = remote.clone().map(SystemdCollector::new);
        Self { config, local, remote, discovery, logs, systemd, remote_systemd, deploy, approvals, dev_mode }
    }
}
