//! Adversarial safety scenarios: the exec blocklist, the interactive
//! approval handshake, and knowledge-base circuit isolation.

use async_trait::async_trait;
use dozor_llm::{KbClient, KbConfig};
use dozor_proto::Config;
use dozor_runtime::{Approvals, MessageBus, RuntimeApprovalSink};
use dozor_tools::tools::ServerExecTool;
use dozor_tools::{ApprovalOutcome, ApprovalSink, DeployManager, DevModeController, Tool, ToolContext, ToolError};
use dozor_transport::{CommandResult, Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct UnreachedTransport;

#[async_trait]
impl Transport for UnreachedTransport {
    async fn execute(&self, _cancel: &CancellationToken, _cmd: &str) -> Result<CommandResult, TransportError> {
        panic!("blocked/denied commands must never reach the transport");
    }
    async fn execute_unsafe(&self, _cancel: &CancellationToken, _program: &str, _args: &[String]) -> Result<CommandResult, TransportError> {
        panic!("blocked/denied commands must never reach the transport");
    }
    async fn docker_compose_command(&self, _cancel: &CancellationToken, _args: &[String]) -> Result<CommandResult, TransportError> {
        panic!("blocked/denied commands must never reach the transport");
    }
}

struct NoDeploy;
#[async_trait]
impl DeployManager for NoDeploy {
    async fn start(&self, _project_path: &str, _services: &[String], _build: bool, _pull: bool) -> Result<dozor_proto::DeployResult, ToolError> {
        unreachable!()
    }
    async fn status(&self, _deploy_id: &str) -> Result<dozor_proto::DeployStatus, ToolError> {
        unreachable!()
    }
}

struct NoDevMode;
impl DevModeController for NoDevMode {
    fn set_enabled(&self, _enabled: bool) {}
    fn is_enabled(&self) -> bool {
        false
    }
    fn exclude(&self, _services: &[String], _ttl: Duration) {}
    fn include(&self, _services: &[String]) {}
    fn excluded(&self) -> Vec<String> {
        Vec::new()
    }
}

fn build_ctx(approvals: Arc<dyn ApprovalSink>) -> ToolContext {
    let config = Arc::new(Config::default());
    let local: Arc<dyn Transport> = Arc::new(UnreachedTransport);
    ToolContext::new(config, local, None, Arc::new(NoDeploy), approvals, Arc::new(NoDevMode))
}

struct AlwaysTimeOutApprovals;
#[async_trait]
impl ApprovalSink for AlwaysTimeOutApprovals {
    async fn request(&self, _command: &str) -> ApprovalOutcome {
        ApprovalOutcome::TimedOut
    }
}

// ─── S3: blocked-exec ───────────────────────────────────────────────────

#[tokio::test]
async fn blocked_command_is_rejected_before_it_ever_reaches_the_transport() {
    let ctx = build_ctx(Arc::new(AlwaysTimeOutApprovals));
    let cancel = CancellationToken::new();
    let tool = ServerExecTool;

    let err = tool
        .execute(&ctx, &cancel, serde_json::json!({"command": "rm -rf /tmp/foo"}))
        .await
        .expect_err("rm -rf must be blocked");

    assert!(err.to_string().contains("blocked pattern"), "error was: {err}");
}

// ─── S4: ask-exec-approval ──────────────────────────────────────────────

#[tokio::test]
async fn approved_exec_request_runs_and_denied_request_is_rejected() {
    let approvals = Arc::new(Approvals::new());
    let bus = Arc::new(MessageBus::new());
    let sink = Arc::new(RuntimeApprovalSink::new(approvals.clone(), bus.clone(), Duration::from_secs(5)));

    let cancel = CancellationToken::new();

    let waiter = {
        let sink = sink.clone();
        tokio::spawn(async move { sink.request("ls").await })
    };

    let outbound = bus.consume_outbound(&cancel).await.expect("expected an outbound approval prompt");
    let id = extract_exec_id(&outbound.text).expect("expected an exec-<8 digits> id in the approval prompt");
    assert!(approvals.resolve(&id, true));

    assert_eq!(waiter.await.unwrap(), ApprovalOutcome::Approved);

    // A second round, this time denied.
    let waiter = {
        let sink = sink.clone();
        tokio::spawn(async move { sink.request("rm something").await })
    };
    let outbound = bus.consume_outbound(&cancel).await.unwrap();
    let id = extract_exec_id(&outbound.text).unwrap();
    assert!(approvals.resolve(&id, false));
    assert_eq!(waiter.await.unwrap(), ApprovalOutcome::Denied);
}

#[tokio::test]
async fn unanswered_approval_request_times_out() {
    let approvals = Arc::new(Approvals::new());
    let bus = Arc::new(MessageBus::new());
    let sink = RuntimeApprovalSink::new(approvals, bus, Duration::from_millis(20));

    assert_eq!(sink.request("echo hi").await, ApprovalOutcome::TimedOut);
}

fn extract_exec_id(text: &str) -> Option<String> {
    let idx = text.find("exec-")?;
    let candidate = &text[idx..idx + "exec-".len() + 8];
    candidate.chars().skip(5).all(|c| c.is_ascii_digit()).then(|| candidate.to_string())
}

// ─── S6: circuit-isolation ──────────────────────────────────────────────

#[tokio::test]
async fn three_consecutive_kb_search_failures_open_the_breaker_and_the_fourth_call_short_circuits() {
    // Port 1 refuses every connection immediately, so every `search` fails
    // the same way a genuinely unreachable KB backend would.
    let config = KbConfig {
        server: "http://127.0.0.1:1".to_string(),
        user: "ops".to_string(),
        cube: "dozor".to_string(),
        search_tool: "search".to_string(),
        save_tool: "save".to_string(),
    };
    let kb = KbClient::new(config, 3, Duration::from_secs(300));

    for attempt in 0..3 {
        let reply = kb.search("why is api down").await;
        assert_ne!(reply, dozor_llm::KB_CIRCUIT_OPEN_MESSAGE, "attempt {attempt} should still have reached the KB");
    }

    assert_eq!(kb.breaker_state(), dozor_breaker::BreakerState::Open);
    assert_eq!(kb.search("why is api down").await, dozor_llm::KB_CIRCUIT_OPEN_MESSAGE);
}
