//! Background deploy tracking shapes (§3, §4.9).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeployState {
    Running,
    Completed,
    Failed,
    Unknown,
}

impl std::fmt::Display for DeployState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Handle returned immediately by `StartDeploy` (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResult {
    pub deploy_id: String,
    pub log_path: String,
}

/// Status polled via `GetDeployStatus` (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployStatus {
    pub deploy_id: String,
    pub state: DeployState,
    pub process_running: bool,
    pub log_content: String,
}

impl DeployStatus {
    /// Sentinel written by the deploy shell command on success.
    pub fn sentinel(deploy_id: &str) -> String {
        format!("DEPLOY COMPLETE: {deploy_id}")
    }

    /// Derives state from process liveness and log content per §3:
    /// COMPLETED iff the sentinel is present; FAILED iff the process has
    /// exited, the sentinel is absent, and the log is non-empty; RUNNING
    /// iff the process still exists.
    pub fn derive(deploy_id: &str, process_running: bool, log_content: String) -> Self {
        let state = if log_content.contains(&Self::sentinel(deploy_id)) {
            DeployState::Completed
        } else if process_running {
            DeployState::Running
        } else if !log_content.trim().is_empty() {
            DeployState::Failed
        } else {
            DeployState::Unknown
        };
        Self {
            deploy_id: deploy_id.to_string(),
            state,
            process_running,
            log_content,
        }
    }
}

/// Matches `^deploy-\d{10,13}$`.
pub fn is_valid_deploy_id(id: &str) -> bool {
    let Some(digits) = id.strip_prefix("deploy-") else {
        return false;
    };
    (10..=13).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_requires_sentinel() {
        let status = DeployStatus::derive("deploy-1234567890", false, "DEPLOY COMPLETE: deploy-1234567890\n".into());
        assert_eq!(status.state, DeployState::Completed);
    }

    #[test]
    fn running_while_process_alive_without_sentinel() {
        let status = DeployStatus::derive("deploy-1234567890", true, "pulling image...\n".into());
        assert_eq!(status.state, DeployState::Running);
    }

    #[test]
    fn failed_when_process_exited_without_sentinel_but_has_output() {
        let status = DeployStatus::derive("deploy-1234567890", false, "error: compose failed\n".into());
        assert_eq!(status.state, DeployState::Failed);
    }

    #[test]
    fn unknown_when_nothing_to_go_on() {
        let status = DeployStatus::derive("deploy-1234567890", false, "".into());
        assert_eq!(status.state, DeployState::Unknown);
    }

    #[test]
    fn deploy_id_validation() {
        assert!(is_valid_deploy_id("deploy-1234567890"));
        assert!(is_valid_deploy_id("deploy-1234567890123"));
        assert!(!is_valid_deploy_id("deploy-123"));
        assert!(!is_valid_deploy_id("deploy-12345678901234"));
        assert!(!is_valid_deploy_id("deploy-abc"));
        assert!(!is_valid_deploy_id("not-a-deploy"));
    }
}
