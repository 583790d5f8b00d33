//! Composite triage flow and text renderer (§4.3).

use crate::analyzer::analyze;
use dozor_collect::metrics::{self, disks_above_threshold};
use dozor_collect::{ContainerDiscovery, LogCollector};
use dozor_proto::{Alert, AlertLevel, DiagnosticReport, LogLevel, ServiceStatus};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

pub struct TriageOptions {
    pub services: Vec<String>,
    pub dev_mode: bool,
    pub excluded: HashSet<String>,
    pub disk_critical_pct: f64,
    pub log_lines: usize,
}

fn severity_icon(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Info => "ℹ️",
        AlertLevel::Warning => "🟡",
        AlertLevel::Error => "🔴",
        AlertLevel::Critical => "🛑",
    }
}

fn issue_alert_level(level: LogLevel) -> AlertLevel {
    match level {
        LogLevel::Fatal | LogLevel::Critical => AlertLevel::Critical,
        LogLevel::Error => AlertLevel::Error,
        LogLevel::Warning => AlertLevel::Warning,
        LogLevel::Debug | LogLevel::Info => AlertLevel::Info,
    }
}

/// Discovers services, collects statuses, analyzes logs for anything
/// unhealthy, attaches disk pressure, and builds the composite report.
/// Does not mutate any external state.
pub async fn build_report(
    discovery: &ContainerDiscovery,
    logs: &LogCollector,
    host: &str,
    options: &TriageOptions,
    cancel: &CancellationToken,
) -> Result<DiagnosticReport, dozor_collect::CollectError> {
    let mut statuses = discovery.discover(cancel, &options.services).await?;
    if options.dev_mode {
        statuses.retain(|s| !options.excluded.contains(&s.name));
    }

    let mut report = DiagnosticReport::new(host);

    for status in &statuses {
        if status.healthy() {
            continue;
        }
        let entries = logs.collect(cancel, &status.name, options.log_lines, false).await.unwrap_or_default();
        let analysis = analyze(&status.name, &entries);
        for issue in &analysis.issues {
            let mut alert = Alert::new(
                issue_alert_level(issue.level),
                &status.name,
                issue.description.clone(),
                format!("{} (seen {} time(s); example: {})", issue.action, issue.count, issue.example),
                issue.action.clone(),
            );
            alert.channel = status.alert_channel.clone();
            report.alerts.push(alert);
        }
    }

    let metrics = metrics::sample();
    for disk in disks_above_threshold(&metrics, options.disk_critical_pct) {
        report.alerts.push(Alert::new(
            AlertLevel::Critical,
            "host",
            format!("disk pressure on {}", disk.mount),
            format!("{:.1}% used ({} MB free)", disk.used_pct(), disk.available_bytes / 1024 / 1024),
            "run server_cleanup or expand the volume".to_string(),
        ));
    }

    report.services = statuses;
    Ok(report)
}

/// Renders `report` as a text document with severity icons, prefixed with a
/// dev-mode banner when applicable.
pub fn render(report: &DiagnosticReport, dev_mode: bool) -> String {
    let mut out = String::new();
    if dev_mode {
        out.push_str("⚠️  DEV MODE — observe-only, excluded services are omitted below\n\n");
    }
    out.push_str(&format!("Triage report for {} at {}\n", report.host, report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!("Overall health: {}\n\n", report.overall_health()));

    if report.services.is_empty() {
        out.push_str("No services discovered.\n");
    }
    for service in &report.services {
        let icon = if service.healthy() { "🟢" } else { "🔴" };
        out.push_str(&format!("{icon} {} — {}", service.name, service.state));
        if let Some(uptime) = &service.uptime {
            out.push_str(&format!(" (up {uptime})"));
        }
        if service.restart_count > 0 {
            out.push_str(&format!(", {} restarts", service.restart_count));
        }
        out.push('\n');
    }

    if !report.alerts.is_empty() {
        out.push_str("\nAlerts:\n");
        for alert in &report.alerts {
            out.push_str(&format!(
                "{} [{}] {}: {}\n    → {}\n",
                severity_icon(alert.level),
                alert.service,
                alert.title,
                alert.description,
                alert.suggested_action,
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dozor_proto::ServiceState;

    #[test]
    fn render_includes_dev_mode_banner_only_when_enabled() {
        let report = DiagnosticReport::new("host1");
        assert!(render(&report, true).contains("DEV MODE"));
        assert!(!render(&report, false).contains("DEV MODE"));
    }

    #[test]
    fn render_uses_red_icon_for_unhealthy_service() {
        let mut report = DiagnosticReport::new("host1");
        let mut status = ServiceStatus::new("web", ServiceState::Exited);
        status.restart_count = 2;
        report.services.push(status);
        let text = render(&report, false);
        assert!(text.contains("🔴 web"));
        assert!(text.contains("2 restarts"));
    }
}
