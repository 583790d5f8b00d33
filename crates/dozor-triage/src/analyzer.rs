//! Pure, idempotent log analyzer (§4.2.3): same input always yields the
//! same output.

use crate::catalog::CATALOG;
use dozor_proto::{AnalyzeResult, Issue, LogEntry};
use std::collections::HashMap;

/// Matches `entries` against the compiled catalog, accumulating counts per
/// `(category, description)` and keeping the first matching line per key as
/// the example. Patterns with a non-empty service filter only consider
/// entries from a matching service. Output preserves catalog order.
pub fn analyze(service: &str, entries: &[LogEntry]) -> AnalyzeResult {
    let mut result = AnalyzeResult::new(service);
    result.total_lines = entries.len();

    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    let mut examples: HashMap<&'static str, String> = HashMap::new();

    for entry in entries {
        if entry.level.counts_as_error() {
            result.error_count += 1;
        } else if entry.level == dozor_proto::LogLevel::Warning {
            result.warning_count += 1;
        }

        for pattern in CATALOG.iter() {
            if !pattern.services.is_empty() && !pattern.services.contains(&entry.service.as_str()) {
                continue;
            }
            if pattern.regex.is_match(&entry.message) {
                *counts.entry(pattern.description).or_insert(0) += 1;
                examples.entry(pattern.description).or_insert_with(|| Issue::trim_example(&entry.raw));
            }
        }
    }

    for pattern in CATALOG.iter() {
        if let Some(&count) = counts.get(pattern.description) {
            result.issues.push(Issue {
                level: pattern.level,
                category: pattern.category,
                description: pattern.description.to_string(),
                action: pattern.suggested_action.to_string(),
                count,
                example: examples.remove(pattern.description).unwrap_or_default(),
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use dozor_proto::LogLevel;

    fn entry(service: &str, message: &str, level: LogLevel) -> LogEntry {
        LogEntry::new(service, message, message).with_level(level)
    }

    #[test]
    fn counts_and_dedupes_by_category_and_description() {
        let entries = vec![
            entry("web", "connection refused to postgres", LogLevel::Error),
            entry("web", "connection refused to postgres again", LogLevel::Error),
            entry("web", "all good", LogLevel::Info),
        ];
        let result = analyze("web", &entries);
        assert_eq!(result.total_lines, 3);
        assert_eq!(result.error_count, 2);
        let issue = result.issues.iter().find(|i| i.description == "database connection refused").unwrap();
        assert_eq!(issue.count, 2);
    }

    #[test]
    fn is_pure_and_idempotent() {
        let entries = vec![entry("web", "out of memory killing process", LogLevel::Fatal)];
        let first = analyze("web", &entries);
        let second = analyze("web", &entries);
        assert_eq!(first.issues.len(), second.issues.len());
        assert_eq!(first.issues[0].count, second.issues[0].count);
    }

    #[test]
    fn preserves_catalog_declaration_order() {
        let entries = vec![
            entry("web", "too many requests, rate limit exceeded", LogLevel::Warning),
            entry("web", "connection refused", LogLevel::Error),
        ];
        let result = analyze("web", &entries);
        let positions: Vec<_> = result.issues.iter().map(|i| i.description.clone()).collect();
        assert_eq!(positions, vec!["database connection refused".to_string(), "rate limit exceeded".to_string()]);
    }
}
