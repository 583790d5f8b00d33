//! Periodic autonomous triage with a dev-mode observe-only gate (§4.9).

use crate::dev_mode::DevMode;
use dozor_collect::{ContainerDiscovery, LogCollector};
use dozor_proto::DiagnosticReport;
use dozor_triage::{TriageOptions, build_report, render};
use tokio_util::sync::CancellationToken;

/// What the caller should do with a completed watch tick.
#[derive(Debug, Clone)]
pub enum WatchAction {
    /// Nothing needs attention, or dev-mode suppresses corrective action.
    Observe,
    /// Something needs attention and dev-mode is off: feed this prompt to
    /// the agent loop to drive corrective action.
    Correct(String),
}

pub struct WatchOutcome {
    pub report: DiagnosticReport,
    pub rendered: String,
    pub action: WatchAction,
}

/// Runs one triage sweep per `tick()` call, gating the result through the
/// dev-mode exclusion set and observe-only flag.
pub struct Watch {
    discovery: ContainerDiscovery,
    logs: LogCollector,
    host: String,
    services: Vec<String>,
    disk_critical_pct: f64,
    log_lines: usize,
}

impl Watch {
    pub fn new(discovery: ContainerDiscovery, logs: LogCollector, host: impl Into<String>, services: Vec<String>, disk_critical_pct: f64, log_lines: usize) -> Self {
        Self { discovery, logs, host: host.into(), services, disk_critical_pct, log_lines }
    }

    pub async fn tick(&self, dev_mode: &DevMode, cancel: &CancellationToken) -> Result<WatchOutcome, dozor_collect::CollectError> {
        let options = TriageOptions {
            services: self.services.clone(),
            dev_mode: dev_mode.is_enabled(),
            excluded: dev_mode.excluded_set(),
            disk_critical_pct: self.disk_critical_pct,
            log_lines: self.log_lines,
        };
        let report = build_report(&self.discovery, &self.logs, &self.host, &options, cancel).await?;
        let rendered = render(&report, dev_mode.is_enabled());

        let action = if !report.needs_attention() || dev_mode.is_enabled() {
            WatchAction::Observe
        } else {
            WatchAction::Correct(format!(
                "Autonomous watch detected an issue that needs attention:\n\n{rendered}\n\nInvestigate using the available tools and take corrective action."
            ))
        };

        Ok(WatchOutcome { report, rendered, action })
    }
}
