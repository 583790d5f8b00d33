//! Immutable startup configuration, populated from environment variables (§3, §6).

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Parses a Go-style duration string (`"4h"`, `"30m"`, `"90s"`). Falls back
/// to `default` on anything unparseable, since configuration errors must
/// never crash collection — only startup-time invariant violations may
/// panic (§7).
fn env_duration(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_go_duration(&v))
        .unwrap_or(default)
}

/// Parses a Go-style duration literal (`"4h"`, `"30m"`, `"90s"`, `"2d"`).
pub fn parse_go_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split_at = s.find(|c: char| !c.is_ascii_digit())?;
    let (num, unit) = s.split_at(split_at);
    let num: u64 = num.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(num)),
        "m" => Some(Duration::from_secs(num * 60)),
        "h" => Some(Duration::from_secs(num * 3600)),
        "d" => Some(Duration::from_secs(num * 86400)),
        _ => None,
    }
}

/// Immutable record populated at startup from environment variables (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub compose_path: String,
    pub services: Vec<String>,
    pub timeout: Duration,
    pub mcp_port: u16,

    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    pub error_threshold: u32,
    pub restart_threshold: u32,
    pub log_lines: usize,
    pub disk_threshold: f64,
    pub disk_critical: f64,

    pub remote_host: Option<String>,
    pub remote_url: Option<String>,
    pub remote_services: Vec<String>,
    pub remote_ssh_port: u16,
    pub remote_check_interval: Duration,

    pub watch_interval: Duration,
    pub webhook_url: Option<String>,

    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub max_tool_iterations: u32,
    pub llm_fallback_url: Option<String>,
    pub llm_fallback_model: Option<String>,
    pub llm_fallback_api_key: Option<String>,

    pub cb_kb_threshold: u32,
    pub cb_kb_reset: Duration,
    pub cb_llm_threshold: u32,
    pub cb_llm_reset: Duration,

    pub alert_confirm_count: u32,
    pub flap_window: Duration,
    pub flap_high: u32,
    pub flap_low: u32,

    pub kb_server: Option<String>,
    pub kb_user: Option<String>,
    pub kb_cube: Option<String>,
    pub kb_search_tool: Option<String>,
    pub kb_save_tool: Option<String>,

    pub tracked_binaries: Vec<String>,
    pub github_token: Option<String>,

    /// `DOZOR_WORKSPACE`; `None` means the default `$HOME/.dozor`.
    pub workspace_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "local".to_string(),
            ssh_user: "root".to_string(),
            ssh_port: 22,
            compose_path: String::new(),
            services: Vec::new(),
            timeout: Duration::from_secs(30),
            mcp_port: 8085,

            cpu_threshold: 80.0,
            memory_threshold: 80.0,
            error_threshold: 5,
            restart_threshold: 3,
            log_lines: 200,
            disk_threshold: 80.0,
            disk_critical: 90.0,

            remote_host: None,
            remote_url: None,
            remote_services: Vec::new(),
            remote_ssh_port: 22,
            remote_check_interval: Duration::from_secs(60),

            watch_interval: Duration::from_secs(4 * 3600),
            webhook_url: None,

            llm_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            llm_api_key: None,
            max_tool_iterations: 10,
            llm_fallback_url: None,
            llm_fallback_model: None,
            llm_fallback_api_key: None,

            cb_kb_threshold: 3,
            cb_kb_reset: Duration::from_secs(5 * 60),
            cb_llm_threshold: 5,
            cb_llm_reset: Duration::from_secs(10 * 60),

            alert_confirm_count: 2,
            flap_window: Duration::from_secs(15 * 60),
            flap_high: 3,
            flap_low: 1,

            kb_server: None,
            kb_user: None,
            kb_cube: None,
            kb_search_tool: None,
            kb_save_tool: None,

            tracked_binaries: Vec::new(),
            github_token: None,

            workspace_dir: None,
        }
    }
}

impl Config {
    /// `IsLocal ⇔ host ∈ {local, localhost, 127.0.0.1}` (§3).
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "local" | "localhost" | "127.0.0.1")
    }

    /// Reads every `DOZOR_*` environment variable named in §6, falling back
    /// to `Default::default()` field-by-field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("DOZOR_HOST", &defaults.host),
            ssh_user: env_string("DOZOR_SSH_USER", &defaults.ssh_user),
            ssh_port: env_parse("DOZOR_SSH_PORT", defaults.ssh_port),
            compose_path: env_string("DOZOR_COMPOSE_PATH", &defaults.compose_path),
            services: {
                let v = env_list("DOZOR_SERVICES");
                if v.is_empty() { defaults.services.clone() } else { v }
            },
            timeout: Duration::from_secs(env_parse("DOZOR_TIMEOUT", defaults.timeout.as_secs())),
            mcp_port: env_parse("DOZOR_MCP_PORT", defaults.mcp_port),

            cpu_threshold: env_parse("DOZOR_CPU_THRESHOLD", defaults.cpu_threshold),
            memory_threshold: env_parse("DOZOR_MEMORY_THRESHOLD", defaults.memory_threshold),
            error_threshold: env_parse("DOZOR_ERROR_THRESHOLD", defaults.error_threshold),
            restart_threshold: env_parse("DOZOR_RESTART_THRESHOLD", defaults.restart_threshold),
            log_lines: env_parse("DOZOR_LOG_LINES", defaults.log_lines),
            disk_threshold: env_parse("DOZOR_DISK_THRESHOLD", defaults.disk_threshold),
            disk_critical: env_parse("DOZOR_DISK_CRITICAL", defaults.disk_critical),

            remote_host: env_opt_string("DOZOR_REMOTE_HOST"),
            remote_url: env_opt_string("DOZOR_REMOTE_URL"),
            remote_services: env_list("DOZOR_REMOTE_SERVICES"),
            remote_ssh_port: env_parse("DOZOR_REMOTE_SSH_PORT", defaults.remote_ssh_port),
            remote_check_interval: env_duration("DOZOR_REMOTE_CHECK_INTERVAL", defaults.remote_check_interval),

            watch_interval: env_duration("DOZOR_WATCH_INTERVAL", defaults.watch_interval),
            webhook_url: env_opt_string("DOZOR_WEBHOOK_URL"),

            llm_url: env_string("DOZOR_LLM_URL", &defaults.llm_url),
            llm_model: env_string("DOZOR_LLM_MODEL", &defaults.llm_model),
            llm_api_key: env_opt_string("DOZOR_LLM_API_KEY"),
            max_tool_iterations: env_parse("DOZOR_MAX_TOOL_ITERATIONS", defaults.max_tool_iterations),
            llm_fallback_url: env_opt_string("DOZOR_LLM_FALLBACK_URL"),
            llm_fallback_model: env_opt_string("DOZOR_LLM_FALLBACK_MODEL"),
            llm_fallback_api_key: env_opt_string("DOZOR_LLM_FALLBACK_API_KEY"),

            cb_kb_threshold: env_parse("DOZOR_CB_KB_THRESHOLD", defaults.cb_kb_threshold),
            cb_kb_reset: env_duration("DOZOR_CB_KB_RESET", defaults.cb_kb_reset),
            cb_llm_threshold: env_parse("DOZOR_CB_LLM_THRESHOLD", defaults.cb_llm_threshold),
            cb_llm_reset: env_duration("DOZOR_CB_LLM_RESET", defaults.cb_llm_reset),

            alert_confirm_count: env_parse("DOZOR_ALERT_CONFIRM_COUNT", defaults.alert_confirm_count),
            flap_window: env_duration("DOZOR_FLAP_WINDOW", defaults.flap_window),
            flap_high: env_parse("DOZOR_FLAP_HIGH", defaults.flap_high),
            flap_low: env_parse("DOZOR_FLAP_LOW", defaults.flap_low),

            kb_server: env_opt_string("DOZOR_KB_SERVER"),
            kb_user: env_opt_string("DOZOR_KB_USER"),
            kb_cube: env_opt_string("DOZOR_KB_CUBE"),
            kb_search_tool: env_opt_string("DOZOR_KB_SEARCH_TOOL"),
            kb_save_tool: env_opt_string("DOZOR_KB_SAVE_TOOL"),

            tracked_binaries: env_list("DOZOR_TRACKED_BINARIES"),
            github_token: env_opt_string("DOZOR_GITHUB_TOKEN"),

            workspace_dir: env_opt_string("DOZOR_WORKSPACE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn is_local_recognizes_loopback_aliases() {
        for host in ["local", "localhost", "127.0.0.1"] {
            let mut cfg = Config::default();
            cfg.host = host.to_string();
            assert!(cfg.is_local(), "{host} should be local");
        }
        let mut cfg = Config::default();
        cfg.host = "10.0.0.5".to_string();
        assert!(!cfg.is_local());
    }

    #[test]
    fn go_duration_parsing() {
        assert_eq!(parse_go_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_go_duration("4h"), Some(Duration::from_secs(4 * 3600)));
        assert_eq!(parse_go_duration("2d"), Some(Duration::from_secs(2 * 86400)));
        assert_eq!(parse_go_duration("bogus"), None);
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DOZOR_HOST");
        std::env::remove_var("DOZOR_WATCH_INTERVAL");
        let cfg = Config::from_env();
        assert_eq!(cfg.host, "local");
        assert_eq!(cfg.watch_interval, Duration::from_secs(4 * 3600));
    }

    #[test]
    fn from_env_reads_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DOZOR_HOST", "prod.example.com");
        std::env::set_var("DOZOR_WATCH_INTERVAL", "90m");
        let cfg = Config::from_env();
        assert_eq!(cfg.host, "prod.example.com");
        assert_eq!(cfg.watch_interval, Duration::from_secs(90 * 60));
        std::env::remove_var("DOZOR_HOST");
        std::env::remove_var("DOZOR_WATCH_INTERVAL");
    }
}
