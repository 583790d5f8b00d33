//! Log collection and line parsing (§4.2.2).

use crate::error::CollectError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use dozor_proto::{LogEntry, LogLevel};
use dozor_transport::Transport;
use std::sync::Arc;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

/// Timestamp layouts tried in order; the first one that parses wins.
const TIMESTAMP_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f", "%Y/%m/%d %H:%M:%S"];

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in TIMESTAMP_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

/// Strips a leading `<service>  | ` prefix added by `docker compose logs`.
fn strip_service_prefix(line: &str) -> &str {
    if let Some(idx) = line.find("| ") {
        let prefix = &line[..idx];
        if prefix.trim_end().chars().all(|c| c.is_alphanumeric() || "_.-".contains(c)) {
            return line[idx + 2..].trim_start();
        }
    }
    line
}

/// Phrases that imply an error level even without an explicit level token.
const ERROR_PHRASES: &[&str] = &["OOM", "Out of memory", "Permission denied", "Killed", "panic:", "segfault"];

fn detect_level(body: &str) -> LogLevel {
    let upper = body.to_uppercase();
    if upper.contains("FATAL") || upper.contains("CRITICAL") {
        return LogLevel::Fatal;
    }
    if upper.contains("ERROR") {
        return LogLevel::Error;
    }
    if upper.contains("WARN") {
        return LogLevel::Warning;
    }
    if upper.contains("\"LEVEL\":\"ERROR\"") || upper.contains("\"LEVEL\": \"ERROR\"") {
        return LogLevel::Error;
    }
    if upper.contains("\"LEVEL\":\"WARN") {
        return LogLevel::Warning;
    }
    if ERROR_PHRASES.iter().any(|p| body.contains(p)) {
        return LogLevel::Error;
    }
    if upper.contains("DEBUG") {
        return LogLevel::Debug;
    }
    LogLevel::Info
}

static NOISE_PATTERNS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec!["/wp-admin", ".php", "/.env", "/.git", "/xmlrpc.php", "phpmyadmin", "/.aws", "/wp-login"]
});

fn is_noise(line: &str) -> bool {
    NOISE_PATTERNS.iter().any(|p| line.contains(p))
}

/// Parses a single compose-log line into a [`LogEntry`] tagged with `service`.
pub fn parse_log_line(service: &str, raw: &str) -> LogEntry {
    let body = strip_service_prefix(raw);
    let (timestamp, rest) = match body.split_once(' ') {
        Some((ts, rest)) if parse_timestamp(ts).is_some() => (parse_timestamp(ts), rest),
        _ => (None, body),
    };
    let level = detect_level(rest);
    let mut entry = LogEntry::new(service, rest.trim(), raw).with_level(level);
    if let Some(ts) = timestamp {
        entry = entry.with_timestamp(ts);
    }
    entry
}

pub struct LogCollector {
    transport: Arc<dyn Transport>,
}

impl LogCollector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Runs `logs --tail N --since 1h --timestamps` for `service` and parses
    /// every line, dropping noise unless `raw` is requested.
    pub async fn collect(
        &self,
        cancel: &CancellationToken,
        service: &str,
        tail: usize,
        raw: bool,
    ) -> Result<Vec<LogEntry>, CollectError> {
        let args = vec![
            "logs".to_string(),
            "--tail".to_string(),
            tail.to_string(),
            "--since".to_string(),
            "1h".to_string(),
            "--timestamps".to_string(),
            service.to_string(),
        ];
        let result = self.transport.docker_compose_command(cancel, &args).await?;
        let source = if !result.stdout.is_empty() { &result.stdout } else { &result.stderr };

        Ok(source
            .lines()
            .filter(|line| raw || !is_noise(line))
            .map(|line| parse_log_line(service, line))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_compose_prefix() {
        assert_eq!(strip_service_prefix("web_1  | hello world"), "hello world");
        assert_eq!(strip_service_prefix("no prefix here"), "no prefix here");
    }

    #[test]
    fn detects_explicit_level_priority() {
        assert_eq!(detect_level("FATAL: disk full"), LogLevel::Fatal);
        assert_eq!(detect_level("ERROR connecting to db"), LogLevel::Error);
        assert_eq!(detect_level("WARNING: slow query"), LogLevel::Warning);
        assert_eq!(detect_level("INFO starting up"), LogLevel::Info);
    }

    #[test]
    fn detects_level_from_message_phrase() {
        assert_eq!(detect_level("process Killed by OOM"), LogLevel::Error);
        assert_eq!(detect_level("Permission denied opening /etc/x"), LogLevel::Error);
    }

    #[test]
    fn detects_level_from_embedded_json() {
        assert_eq!(detect_level(r#"{"level":"error","msg":"boom"}"#), LogLevel::Error);
    }

    #[test]
    fn defaults_to_info_when_nothing_matches() {
        assert_eq!(detect_level("just a normal line"), LogLevel::Info);
    }

    #[test]
    fn noise_patterns_are_detected() {
        assert!(is_noise("GET /wp-admin/install.php 404"));
        assert!(is_noise("GET /.env HTTP/1.1"));
        assert!(!is_noise("GET /api/health 200"));
    }

    #[test]
    fn parse_log_line_extracts_timestamp_and_level() {
        let entry = parse_log_line("web", "web_1  | 2024-01-15T10:30:00.123Z ERROR db connection lost");
        assert!(entry.timestamp.is_some());
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.service, "web");
    }
}
