//! Fixed error-pattern catalog, compiled once at first use (§3, §4.2.3).

use dozor_proto::{ErrorCategory, LogLevel};
use regex::Regex;
use std::sync::LazyLock;

pub struct CompiledPattern {
    pub regex: Regex,
    pub level: LogLevel,
    pub category: ErrorCategory,
    pub description: &'static str,
    pub suggested_action: &'static str,
    pub services: &'static [&'static str],
}

struct RawPattern {
    pattern: &'static str,
    level: LogLevel,
    category: ErrorCategory,
    description: &'static str,
    suggested_action: &'static str,
    services: &'static [&'static str],
}

/// Declared in the order the analyzer must preserve in its output (§4.2.3).
const RAW_CATALOG: &[RawPattern] = &[
    RawPattern {
        pattern: r"(?i)connection refused|could not connect to (postgres|mysql|database)",
        level: LogLevel::Error,
        category: ErrorCategory::Database,
        description: "database connection refused",
        suggested_action: "check the database container is running and reachable",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)too many connections|connection pool exhausted",
        level: LogLevel::Error,
        category: ErrorCategory::Database,
        description: "database connection pool exhausted",
        suggested_action: "increase pool size or investigate connection leaks",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)unauthorized|invalid credentials|authentication failed|401",
        level: LogLevel::Error,
        category: ErrorCategory::Auth,
        description: "authentication failure",
        suggested_action: "verify credentials and token expiry",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)forbidden|access denied|403",
        level: LogLevel::Warning,
        category: ErrorCategory::Permissions,
        description: "access denied",
        suggested_action: "check file/resource permissions and ownership",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)dns resolution failed|no route to host|network is unreachable",
        level: LogLevel::Error,
        category: ErrorCategory::Network,
        description: "network unreachable",
        suggested_action: "check DNS and network connectivity from the container",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)out of memory|oom.?killed|cannot allocate memory",
        level: LogLevel::Fatal,
        category: ErrorCategory::Resources,
        description: "out of memory",
        suggested_action: "raise the memory limit or investigate a leak",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)no space left on device|disk quota exceeded",
        level: LogLevel::Fatal,
        category: ErrorCategory::Resources,
        description: "disk space exhausted",
        suggested_action: "run the cleanup scanner or expand the volume",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)segmentation fault|panic:|unhandled exception|stack trace",
        level: LogLevel::Error,
        category: ErrorCategory::Process,
        description: "process crash",
        suggested_action: "inspect the stack trace and recent deploys",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)killed\b|exit code 137",
        level: LogLevel::Error,
        category: ErrorCategory::Process,
        description: "process killed",
        suggested_action: "check for OOM kills or manual termination",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)slow query|request timeout|deadline exceeded|took \d{4,}ms",
        level: LogLevel::Warning,
        category: ErrorCategory::Performance,
        description: "slow operation detected",
        suggested_action: "profile the slow path and check for resource contention",
        services: &[],
    },
    RawPattern {
        pattern: r"(?i)rate limit exceeded|too many requests|429",
        level: LogLevel::Warning,
        category: ErrorCategory::RateLimit,
        description: "rate limit exceeded",
        suggested_action: "back off or raise the upstream rate limit",
        services: &[],
    },
];

pub static CATALOG: LazyLock<Vec<CompiledPattern>> = LazyLock::new(|| {
    RAW_CATALOG
        .iter()
        .map(|p| CompiledPattern {
            regex: Regex::new(p.pattern).unwrap_or_else(|e| panic!("invalid catalog pattern {:?}: {e}", p.pattern)),
            level: p.level,
            category: p.category,
            description: p.description,
            suggested_action: p.suggested_action,
            services: p.services,
        })
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_compiles_without_panicking() {
        assert_eq!(CATALOG.len(), RAW_CATALOG.len());
    }

    #[test]
    fn database_pattern_matches_connection_refused() {
        let pattern = CATALOG.iter().find(|p| p.description == "database connection refused").unwrap();
        assert!(pattern.regex.is_match("Error: connection refused to postgres:5432"));
    }
}
