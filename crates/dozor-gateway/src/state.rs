//! Wires every crate into one shared, `Arc`-able application state (§2, §6).

use dozor_agent::Workspace;
use dozor_collect::{ContainerDiscovery, LogCollector};
use dozor_llm::{KbClient, KbConfig, LlmClient, ProviderConfig};
use dozor_proto::Config;
use dozor_runtime::{Approvals, BackgroundDeploy, DevMode, MessageBus, RuntimeApprovalSink, RuntimeDeployManager, RuntimeDevModeController, Watch};
use dozor_tools::{ApprovalSink, DeployManager, DevModeController, ToolContext, ToolRegistry};
use dozor_tools::tools::{
    ServerCleanupTool, ServerDeployTool, ServerDevModeTool, ServerExecTool, ServerInspectTool, ServerPruneTool,
    ServerRemoteExecTool, ServerRemoteServicesTool, ServerRestartTool, ServerServicesTool, ServerTriageTool, ServerUpdatesTool,
};
use dozor_transport::{ShellTransport, Transport};
use std::sync::Arc;
use std::time::Duration;

/// How long an interactive `server_exec security=ask` waits for `yes <id>` / `no <id>`.
const APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Every live piece of Dozor, built once at startup and shared behind an `Arc`
/// across the HTTP surface, the CLI subcommands, and the background watch loop.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub registry: Arc<ToolRegistry>,
    pub tool_ctx: Arc<ToolContext>,
    pub llm: Arc<LlmClient>,
    /// `None` when `DOZOR_KB_SERVER` is unset — knowledge-base lookups are optional.
    pub kb: Option<Arc<KbClient>>,
    pub workspace: Workspace,
    pub bus: Arc<MessageBus>,
    pub approvals: Arc<Approvals>,
    pub dev_mode: Arc<DevMode>,
    pub watch: Watch,
}

fn build_remote_transport(config: &Config) -> Option<Arc<dyn Transport>> {
    let host = config.remote_host.clone()?;
    let mut remote_config = config.clone();
    remote_config.host = host;
    remote_config.ssh_port = config.remote_ssh_port;
    remote_config.services = config.remote_services.clone();
    Some(Arc::new(ShellTransport::new(Arc::new(remote_config))))
}

fn build_kb_client(config: &Config) -> Option<Arc<KbClient>> {
    let server = config.kb_server.clone()?;
    let kb_config = KbConfig {
        server,
        user: config.kb_user.clone().unwrap_or_default(),
        cube: config.kb_cube.clone().unwrap_or_default(),
        search_tool: config.kb_search_tool.clone().unwrap_or_else(|| "search".to_string()),
        save_tool: config.kb_save_tool.clone().unwrap_or_else(|| "save".to_string()),
    };
    Some(Arc::new(KbClient::new(kb_config, config.cb_kb_threshold, config.cb_kb_reset)))
}

fn registered_tools() -> Vec<Box<dyn dozor_tools::Tool>> {
    vec![
        Box::new(ServerInspectTool),
        Box::new(ServerTriageTool),
        Box::new(ServerExecTool),
        Box::new(ServerRemoteExecTool),
        Box::new(ServerRestartTool),
        Box::new(ServerDeployTool),
        Box::new(ServerPruneTool),
        Box::new(ServerCleanupTool),
        Box::new(ServerServicesTool),
        Box::new(ServerRemoteServicesTool),
        Box::new(ServerUpdatesTool),
        Box::new(ServerDevModeTool),
    ]
}

impl GatewayState {
    /// Constructs every shared component from a loaded `Config`. Infallible
    /// except for the LLM client, whose `reqwest::Client` construction can
    /// fail on a malformed TLS configuration.
    pub fn build(config: Config) -> anyhow::Result<Arc<Self>> {
        let config = Arc::new(config);

        let local: Arc<dyn Transport> = Arc::new(ShellTransport::new(config.clone()));
        let remote = build_remote_transport(&config);

        let bus = Arc::new(MessageBus::new());
        let approvals = Arc::new(Approvals::new());
        let dev_mode = Arc::new(DevMode::new());

        let deploy: Arc<dyn DeployManager> = Arc::new(RuntimeDeployManager::new(BackgroundDeploy::new(local.clone())));
        let approval_sink: Arc<dyn ApprovalSink> = Arc::new(RuntimeApprovalSink::new(approvals.clone(), bus.clone(), APPROVAL_TIMEOUT));
        let dev_mode_controller: Arc<dyn DevModeController> = Arc::new(RuntimeDevModeController::new(dev_mode.clone()));

        let tool_ctx = Arc::new(ToolContext::new(config.clone(), local.clone(), remote, deploy, approval_sink, dev_mode_controller));
        let registry = Arc::new(ToolRegistry::from_tools(registered_tools()));

        let primary = ProviderConfig { url: config.llm_url.clone(), model: config.llm_model.clone(), api_key: config.llm_api_key.clone().unwrap_or_default() };
        let fallback = match (&config.llm_fallback_url, &config.llm_fallback_model) {
            (Some(url), Some(model)) => Some(ProviderConfig { url: url.clone(), model: model.clone(), api_key: config.llm_fallback_api_key.clone().unwrap_or_default() }),
            _ => None,
        };
        let llm = Arc::new(LlmClient::new(primary, fallback, config.timeout, config.cb_llm_threshold, config.cb_llm_reset)?);
        let kb = build_kb_client(&config);

        let workspace = Workspace::load(&config);

        let discovery = ContainerDiscovery::new(local.clone());
        let logs = LogCollector::new(local.clone());
        let watch = Watch::new(discovery, logs, config.host.clone(), config.services.clone(), config.disk_critical, config.log_lines);

        Ok(Arc::new(Self { config, registry, tool_ctx, llm, kb, workspace, bus, approvals, dev_mode, watch }))
    }

    pub fn agent_loop(&self) -> dozor_agent::AgentLoop<'_> {
        dozor_agent::AgentLoop::new(&self.registry, &self.llm, &self.tool_ctx, self.config.max_tool_iterations)
    }
}
