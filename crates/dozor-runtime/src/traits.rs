//! Concrete `DeployManager`/`ApprovalSink`/`DevModeController` implementations
//! backing the trait seams `dozor-tools` defines (§4.6, §4.9).

use crate::approvals::{self, Approvals};
use crate::dev_mode::DevMode;
use crate::deploy::BackgroundDeploy;
use async_trait::async_trait;
use dozor_proto::{ApprovalStatus, DeployResult};
use dozor_proto::deploy::DeployStatus;
use dozor_tools::{ApprovalOutcome, ApprovalSink, DeployManager, DevModeController, ToolError};
use std::time::Duration;

pub struct RuntimeDeployManager {
    deploy: BackgroundDeploy,
}

impl RuntimeDeployManager {
    pub fn new(deploy: BackgroundDeploy) -> Self {
        Self { deploy }
    }
}

#[async_trait]
impl DeployManager for RuntimeDeployManager {
    async fn start(&self, project_path: &str, services: &[String], build: bool, pull: bool) -> Result<DeployResult, ToolError> {
        self.deploy.start(project_path, services, build, pull).await.map_err(|e| ToolError::Runtime(e.to_string()))
    }

    async fn status(&self, deploy_id: &str) -> Result<DeployStatus, ToolError> {
        self.deploy.status(deploy_id).await.map_err(|e| ToolError::Runtime(e.to_string()))
    }
}

/// Publishes an approval request to the message bus and blocks on the
/// `Approvals` state machine until resolved or `timeout` elapses.
pub struct RuntimeApprovalSink {
    approvals: std::sync::Arc<Approvals>,
    bus: std::sync::Arc<crate::bus::MessageBus>,
    timeout: Duration,
}

impl RuntimeApprovalSink {
    pub fn new(approvals: std::sync::Arc<Approvals>, bus: std::sync::Arc<crate::bus::MessageBus>, timeout: Duration) -> Self {
        Self { approvals, bus, timeout }
    }
}

#[async_trait]
impl ApprovalSink for RuntimeApprovalSink {
    async fn request(&self, command: &str) -> ApprovalOutcome {
        let (id, rx) = self.approvals.create(command);
        self.bus.publish_outbound(dozor_proto::OutboundMessage::new(format!(
            "Approval needed to run: `{command}`\nReply \"yes {id}\" or \"no {id}\"."
        )));
        match approvals::wait(&self.approvals, &id, rx, self.timeout).await {
            ApprovalStatus::Approved => ApprovalOutcome::Approved,
            ApprovalStatus::Denied => ApprovalOutcome::Denied,
            ApprovalStatus::Expired | ApprovalStatus::Pending => ApprovalOutcome::TimedOut,
        }
    }
}

pub struct RuntimeDevModeController {
    dev_mode: std::sync::Arc<DevMode>,
}

impl RuntimeDevModeController {
    pub fn new(dev_mode: std::sync::Arc<DevMode>) -> Self {
        Self { dev_mode }
    }
}

impl DevModeController for RuntimeDevModeController {
    fn set_enabled(&self, enabled: bool) {
        self.dev_mode.set_enabled(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.dev_mode.is_enabled()
    }

    fn exclude(&self, services: &[String], ttl: Duration) {
        self.dev_mode.exclude(services, ttl);
    }

    fn include(&self, services: &[String]) {
        self.dev_mode.include(services);
    }

    fn excluded(&self) -> Vec<String> {
        self.dev_mode.excluded()
    }
}
