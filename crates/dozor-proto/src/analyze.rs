//! Error-pattern catalog and log analyzer result shapes (§3, §4.2.3).

use crate::service::LogLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Database,
    Auth,
    Network,
    Resources,
    Process,
    Performance,
    RateLimit,
    Permissions,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Database => "database",
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Resources => "resources",
            Self::Process => "process",
            Self::Performance => "performance",
            Self::RateLimit => "rate_limit",
            Self::Permissions => "permissions",
        };
        write!(f, "{s}")
    }
}

/// One entry of the fixed catalog compiled once at initialization (§3).
/// The regex itself lives in `dozor-triage`, which owns compilation; this
/// struct is the catalog's declarative shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub pattern: String,
    pub level: LogLevel,
    pub category: ErrorCategory,
    pub description: String,
    pub suggested_action: String,
    /// When non-empty, only entries from one of these services are matched.
    #[serde(default)]
    pub services: Vec<String>,
}

/// One deduplicated finding from the analyzer, keyed by `(category, description)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub level: LogLevel,
    pub category: ErrorCategory,
    pub description: String,
    pub action: String,
    pub count: usize,
    /// The first matching log line, trimmed to 200 characters.
    pub example: String,
}

impl Issue {
    /// Trims `text` to 200 characters, the bound named in §3.
    pub fn trim_example(text: &str) -> String {
        const MAX: usize = 200;
        if text.chars().count() <= MAX {
            text.to_string()
        } else {
            text.chars().take(MAX).collect()
        }
    }
}

/// Result of running the analyzer over one service's recent logs (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResult {
    pub service: String,
    pub total_lines: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub issues: Vec<Issue>,
}

impl AnalyzeResult {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            total_lines: 0,
            error_count: 0,
            warning_count: 0,
            issues: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_example_respects_200_char_bound() {
        let long = "x".repeat(500);
        let trimmed = Issue::trim_example(&long);
        assert_eq!(trimmed.chars().count(), 200);
    }

    #[test]
    fn trim_example_leaves_short_text_untouched() {
        assert_eq!(Issue::trim_example("short"), "short");
    }
}
