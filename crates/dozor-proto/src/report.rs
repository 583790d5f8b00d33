//! Alerts and the aggregated diagnostic report (§3).

use crate::service::{ServiceState, ServiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// Produced by collectors and the analyzer; accumulated into a `DiagnosticReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub service: String,
    pub title: String,
    pub description: String,
    pub suggested_action: String,
    pub timestamp: DateTime<Utc>,
    pub channel: Option<String>,
}

impl Alert {
    pub fn new(
        level: AlertLevel,
        service: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        suggested_action: impl Into<String>,
    ) -> Self {
        Self {
            level,
            service: service.into(),
            title: title.into(),
            description: description.into(),
            suggested_action: suggested_action.into(),
            timestamp: Utc::now(),
            channel: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Healthy,
    Warning,
    Degraded,
    Critical,
}

impl std::fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A point-in-time snapshot of host health (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub timestamp: DateTime<Utc>,
    pub host: String,
    pub services: Vec<ServiceStatus>,
    pub alerts: Vec<Alert>,
}

impl DiagnosticReport {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            host: host.into(),
            services: Vec::new(),
            alerts: Vec::new(),
        }
    }

    /// Derivation rule, ordered, first match wins (§3):
    /// any service not running → critical; else any critical alert → critical;
    /// else any error alert → degraded; else any warning alert → warning;
    /// else healthy.
    pub fn overall_health(&self) -> OverallHealth {
        if self.services.iter().any(|s| s.state != ServiceState::Running) {
            return OverallHealth::Critical;
        }
        if self.alerts.iter().any(|a| a.level == AlertLevel::Critical) {
            return OverallHealth::Critical;
        }
        if self.alerts.iter().any(|a| a.level == AlertLevel::Error) {
            return OverallHealth::Degraded;
        }
        if self.alerts.iter().any(|a| a.level == AlertLevel::Warning) {
            return OverallHealth::Warning;
        }
        OverallHealth::Healthy
    }

    pub fn needs_attention(&self) -> bool {
        matches!(self.overall_health(), OverallHealth::Critical | OverallHealth::Degraded)
    }
}
