//! Interactive approval state machine keyed by short ids (§4.9).

use dozor_proto::ApprovalStatus;
use parking_lot::Mutex;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::oneshot;

struct PendingApproval {
    command: String,
    resolver: Option<oneshot::Sender<bool>>,
}

fn generate_id() -> String {
    let digits: u32 = rand::thread_rng().gen_range(10_000_000..=99_999_999);
    format!("exec-{digits}")
}

static RESPONSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<verdict>yes|y|approve|approved|no|n|deny|denied)\s+(?P<id>exec-\d{8})\s*$").expect("static pattern")
});

/// Pending interactive approvals, keyed by a short `exec-<8 digits>` id.
pub struct Approvals {
    pending: Mutex<HashMap<String, PendingApproval>>,
}

impl Approvals {
    pub fn new() -> Self {
        Self { pending: Mutex::new(HashMap::new()) }
    }

    /// Registers a new pending approval, returning its id and a receiver
    /// that completes once resolved.
    pub fn create(&self, command: &str) -> (String, oneshot::Receiver<bool>) {
        let id = generate_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), PendingApproval { command: command.to_string(), resolver: Some(tx) });
        (id, rx)
    }

    /// Resolves a pending approval. Returns `false` if the id is unknown or
    /// was already resolved — resolution is idempotent-safe.
    pub fn resolve(&self, id: &str, approved: bool) -> bool {
        let resolver = match self.pending.lock().remove(id) {
            Some(mut entry) => entry.resolver.take(),
            None => return false,
        };
        match resolver {
            Some(tx) => tx.send(approved).is_ok(),
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn command_for(&self, id: &str) -> Option<String> {
        self.pending.lock().get(id).map(|p| p.command.clone())
    }

    /// Recognizes `yes <id>` / `no <id>` and common natural-language
    /// variants (`y`, `approve`, `approved`, `n`, `deny`, `denied`),
    /// case-insensitively. Returns `None` for unrecognized text or an
    /// unknown id.
    pub fn parse_response(&self, text: &str) -> Option<(String, bool)> {
        let caps = RESPONSE_PATTERN.captures(text.trim())?;
        let id = caps.name("id")?.as_str().to_string();
        if !self.pending.lock().contains_key(&id) {
            return None;
        }
        let verdict = caps.name("verdict")?.as_str().to_lowercase();
        let approved = matches!(verdict.as_str(), "yes" | "y" | "approve" | "approved");
        Some((id, approved))
    }
}

impl Default for Approvals {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a pending approval to resolve, or reports `Expired` once
/// `timeout` elapses (the request is already removed from `approvals` if a
/// caller resolves it; on expiry this function removes it itself).
pub async fn wait(approvals: &Approvals, id: &str, receiver: oneshot::Receiver<bool>, timeout: Duration) -> ApprovalStatus {
    match tokio::time::timeout(timeout, receiver).await {
        Ok(Ok(true)) => ApprovalStatus::Approved,
        Ok(Ok(false)) => ApprovalStatus::Denied,
        Ok(Err(_)) => ApprovalStatus::Expired,
        Err(_) => {
            approvals.pending.lock().remove(id);
            ApprovalStatus::Expired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_match_the_expected_shape() {
        for _ in 0..20 {
            let id = generate_id();
            assert!(id.starts_with("exec-"));
            assert_eq!(id.len(), "exec-".len() + 8);
        }
    }

    #[tokio::test]
    async fn resolve_delivers_to_the_waiter() {
        let approvals = Approvals::new();
        let (id, rx) = approvals.create("rm -rf /tmp/scratch");
        assert_eq!(approvals.pending_count(), 1);
        assert!(approvals.resolve(&id, true));
        let status = wait(&approvals, &id, rx, Duration::from_secs(1)).await;
        assert_eq!(status, ApprovalStatus::Approved);
    }

    #[test]
    fn second_resolve_is_a_no_op() {
        let approvals = Approvals::new();
        let (id, _rx) = approvals.create("echo hi");
        assert!(approvals.resolve(&id, true));
        assert!(!approvals.resolve(&id, false));
    }

    #[tokio::test]
    async fn expiry_removes_the_pending_entry() {
        let approvals = Approvals::new();
        let (id, rx) = approvals.create("echo hi");
        let status = wait(&approvals, &id, rx, Duration::from_millis(10)).await;
        assert_eq!(status, ApprovalStatus::Expired);
        assert_eq!(approvals.pending_count(), 0);
    }

    #[test]
    fn parse_response_recognizes_variants() {
        let approvals = Approvals::new();
        let (id, _rx) = approvals.create("echo hi");
        assert_eq!(approvals.parse_response(&format!("yes {id}")), Some((id.clone(), true)));
        assert_eq!(approvals.parse_response(&format!("Approved {id}")), Some((id.clone(), true)));
        assert_eq!(approvals.parse_response(&format!("no {id}")), Some((id.clone(), false)));
        assert_eq!(approvals.parse_response(&format!("n {id}")), Some((id, false)));
    }

    #[test]
    fn parse_response_rejects_unknown_ids_and_garbage() {
        let approvals = Approvals::new();
        assert_eq!(approvals.parse_response("yes exec-99999999"), None);
        assert_eq!(approvals.parse_response("sounds good"), None);
    }
}
