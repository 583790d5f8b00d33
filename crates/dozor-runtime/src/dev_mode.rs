//! Dev-mode flag and per-service triage exclusions with lazy expiry (§4.9).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

/// Whether Dozor's autonomous watch loop is observe-only, plus the set of
/// services temporarily excluded from triage (each with its own expiry).
pub struct DevMode {
    enabled: RwLock<bool>,
    excluded: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl DevMode {
    pub fn new() -> Self {
        Self { enabled: RwLock::new(false), excluded: RwLock::new(HashMap::new()) }
    }

    pub fn set_enabled(&self, enabled: bool) {
        *self.enabled.write() = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.read()
    }

    pub fn exclude(&self, services: &[String], ttl: Duration) {
        let expiry = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut excluded = self.excluded.write();
        for service in services {
            excluded.insert(service.clone(), expiry);
        }
    }

    pub fn include(&self, services: &[String]) {
        let mut excluded = self.excluded.write();
        for service in services {
            excluded.remove(service);
        }
    }

    /// The currently-excluded set, after lazily pruning anything expired.
    pub fn excluded(&self) -> Vec<String> {
        self.prune();
        self.excluded.read().keys().cloned().collect()
    }

    pub fn excluded_set(&self) -> HashSet<String> {
        self.prune();
        self.excluded.read().keys().cloned().collect()
    }

    fn prune(&self) {
        let now = Utc::now();
        self.excluded.write().retain(|_, expiry| *expiry > now);
    }
}

impl Default for DevMode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusions_expire_lazily() {
        let dev_mode = DevMode::new();
        dev_mode.exclude(&["flaky".to_string()], Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(dev_mode.excluded().is_empty());
    }

    #[test]
    fn include_removes_before_expiry() {
        let dev_mode = DevMode::new();
        dev_mode.exclude(&["db".to_string()], Duration::from_secs(3600));
        assert_eq!(dev_mode.excluded(), vec!["db".to_string()]);
        dev_mode.include(&["db".to_string()]);
        assert!(dev_mode.excluded().is_empty());
    }

    #[test]
    fn enabled_flag_toggles() {
        let dev_mode = DevMode::new();
        assert!(!dev_mode.is_enabled());
        dev_mode.set_enabled(true);
        assert!(dev_mode.is_enabled());
    }
}
