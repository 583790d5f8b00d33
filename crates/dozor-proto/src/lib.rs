//! Core data model and tool-protocol wire types for Dozor.
//!
//! Every other crate in the workspace depends on this one; it holds no
//! behavior beyond small derivations (`healthy()`, `needs_attention()`) that
//! follow directly from the invariants in the data model.

#![forbid(unsafe_code)]

pub mod analyze;
pub mod config;
pub mod deploy;
pub mod message;
pub mod report;
pub mod service;
pub mod tool;

pub use analyze::{AnalyzeResult, ErrorCategory, ErrorPattern, Issue};
pub use config::Config;
pub use deploy::{DeployResult, DeployState, DeployStatus};
pub use message::{ApprovalStatus, InboundMessage, OutboundMessage};
pub use report::{Alert, AlertLevel, DiagnosticReport, OverallHealth};
pub use service::{HealthcheckResult, LogEntry, LogLevel, ServiceState, ServiceStatus};
pub use tool::{ToolCallRequest, ToolDefinition};

/// Service/binary/GitHub-owner name pattern: `^[a-zA-Z][a-zA-Z0-9._-]*$`.
pub const NAME_PATTERN_DESCRIPTION: &str = "must start with a letter and contain only letters, digits, '.', '_' or '-'";

/// Validates the `*_KEY|_SECRET|_TOKEN|_PASSWORD|_AUTH|_CREDENTIAL|_CERT|_PRIVATE`
/// suffix rule used to redact sensitive environment variable values (§7).
pub fn is_sensitive_env_name(name: &str) -> bool {
    const SUFFIXES: &[&str] = &[
        "_KEY",
        "_SECRET",
        "_TOKEN",
        "_PASSWORD",
        "_AUTH",
        "_CREDENTIAL",
        "_CERT",
        "_PRIVATE",
    ];
    let upper = name.to_uppercase();
    SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

/// The literal mask substituted for a redacted value.
pub const REDACTED: &str = "<redacted>";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_env_names_detected() {
        assert!(is_sensitive_env_name("DOZOR_LLM_API_KEY"));
        assert!(is_sensitive_env_name("DOZOR_GITHUB_TOKEN"));
        assert!(is_sensitive_env_name("db_password"));
        assert!(!is_sensitive_env_name("DOZOR_HOST"));
        assert!(!is_sensitive_env_name("DOZOR_WATCH_INTERVAL"));
    }
}
