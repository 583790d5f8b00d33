//! Container / service status and parsed log lines (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a container, mirroring `docker inspect`'s `State.Status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Running,
    Exited,
    Restarting,
    Paused,
    Dead,
    Unknown,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Restarting => "restarting",
            Self::Paused => "paused",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl ServiceState {
    /// Parses a `docker inspect` `State.Status` string, defaulting to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "running" => Self::Running,
            "exited" => Self::Exited,
            "restarting" => Self::Restarting,
            "paused" => Self::Paused,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

/// Severity of a single parsed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Critical,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// True for the levels `ServiceStatus.error_count` (§3) counts over.
    pub fn counts_as_error(self) -> bool {
        matches!(self, Self::Error | Self::Fatal | Self::Critical)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// One parsed log line. Never mutated after construction (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub level: LogLevel,
    /// Body after the container/compose prefix (`<service>  | `) is stripped.
    pub message: String,
    pub service: String,
    pub raw: String,
}

impl LogEntry {
    pub fn new(service: impl Into<String>, message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            level: LogLevel::default(),
            message: message.into(),
            service: service.into(),
            raw: raw.into(),
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

/// Result of probing a service's custom healthcheck URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthcheckResult {
    pub url: String,
    pub passing: bool,
    pub status_code: Option<u16>,
    pub latency_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

/// Status of one container over the inspection window (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    pub health: Option<String>,
    pub uptime: Option<String>,
    pub restart_count: u32,
    pub cpu_pct: Option<f64>,
    pub mem_mb: Option<f64>,
    pub mem_limit_mb: Option<f64>,
    pub recent_errors: Vec<LogEntry>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub healthcheck_url: Option<String>,
    pub healthcheck_result: Option<HealthcheckResult>,
    pub alert_channel: Option<String>,
}

impl ServiceStatus {
    pub fn new(name: impl Into<String>, state: ServiceState) -> Self {
        Self {
            name: name.into(),
            state,
            health: None,
            uptime: None,
            restart_count: 0,
            cpu_pct: None,
            mem_mb: None,
            mem_limit_mb: None,
            recent_errors: Vec::new(),
            labels: HashMap::new(),
            healthcheck_url: None,
            healthcheck_result: None,
            alert_channel: None,
        }
    }

    /// `error_count` per §3 — derived from `recent_errors`, never stored
    /// independently so the invariant in §3 cannot drift.
    pub fn error_count(&self) -> usize {
        self.recent_errors
            .iter()
            .filter(|e| e.level.counts_as_error())
            .count()
    }

    /// `healthy ⇔ state=running ∧ restart-count=0 ∧ error-count=0 ∧
    /// (healthcheck result absent or passing)` (§3).
    pub fn healthy(&self) -> bool {
        self.state == ServiceState::Running
            && self.restart_count == 0
            && self.error_count() == 0
            && self.healthcheck_result.as_ref().is_none_or(|h| h.passing)
    }

    /// Reads `dozor.depends_on` as a comma-separated list of service names.
    pub fn depends_on(&self) -> Vec<String> {
        self.labels
            .get("dozor.depends_on")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}
