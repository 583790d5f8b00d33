//! The canonical tool set exposed over the MCP surface (§6).

use crate::context::{ApprovalOutcome, ToolContext};
use crate::error::ToolError;
use crate::registry::Tool;
use async_trait::async_trait;
use dozor_collect::cleanup::CleanupScanner;
use dozor_collect::updates::{TrackedBinary, UpdateChecker};
use dozor_collect::{certs, network};
use dozor_proto::DeployState;
use dozor_triage::{TriageOptions, analyze, build_report, render};
use dozor_validate::{CommandVerdict, is_command_allowed};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn arg_str_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn arg_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn arg_usize(args: &Value, key: &str, default: usize) -> usize {
    args.get(key).and_then(Value::as_u64).map(|n| n as usize).unwrap_or(default)
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arg_str(args, key).ok_or_else(|| ToolError::InvalidArgs(format!("missing required field '{key}'")))
}

fn empty_schema(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

// ---------------------------------------------------------------- inspect --

pub struct ServerInspectTool;

#[async_trait]
impl Tool for ServerInspectTool {
    fn name(&self) -> &str {
        "server_inspect"
    }

    fn description(&self) -> &str {
        "Read-only diagnostic text for the managed services or host: overview, health, status, diagnose, logs, analyze, errors, security, remote, systemd, connections, or cron."
    }

    fn parameters(&self) -> Value {
        empty_schema(
            json!({
                "mode": {"type": "string", "enum": ["overview", "health", "status", "diagnose", "logs", "analyze", "errors", "security", "remote", "systemd", "connections", "cron"]},
                "service": {"type": "string"},
                "services": {"type": "array", "items": {"type": "string"}},
                "lines": {"type": "integer"},
                "filter": {"type": "string"},
            }),
            &["mode"],
        )
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let mode = require_str(&args, "mode")?;
        let service = arg_str(&args, "service").map(str::to_string);
        let mut services = arg_str_list(&args, "services");
        if services.is_empty() {
            services = service.clone().map(|s| vec![s]).unwrap_or_else(|| ctx.config.services.clone());
        }
        let lines = arg_usize(&args, "lines", ctx.config.log_lines);

        match mode {
            "overview" | "status" => {
                let statuses = ctx.discovery.discover(cancel, &services).await?;
                let mut out = String::new();
                for status in &statuses {
                    let icon = if status.healthy() { "🟢" } else { "🔴" };
                    out.push_str(&format!("{icon} {} — {}\n", status.name, status.state));
                }
                if out.is_empty() {
                    out.push_str("No services discovered.\n");
                }
                Ok(out)
            }
            "health" => {
                let metrics = dozor_collect::metrics::sample();
                Ok(format!(
                    "cpu {:.1}% mem {:.1}% ({} / {} MB) uptime {}s",
                    metrics.cpu_usage_pct, metrics.mem_usage_pct, metrics.mem_used_mb, metrics.mem_total_mb, metrics.uptime_secs
                ))
            }
            "diagnose" => {
                let options = TriageOptions {
                    services,
                    dev_mode: ctx.dev_mode.is_enabled(),
                    excluded: ctx.dev_mode.excluded().into_iter().collect(),
                    disk_critical_pct: ctx.config.disk_critical,
                    log_lines: lines,
                };
                let report = build_report(&ctx.discovery, &ctx.logs, &ctx.config.host, &options, cancel).await?;
                Ok(render(&report, ctx.dev_mode.is_enabled()))
            }
            "logs" => {
                let service = service.ok_or_else(|| ToolError::InvalidArgs("'service' is required for mode=logs".into()))?;
                let entries = ctx.logs.collect(cancel, &service, lines, true).await?;
                Ok(entries.into_iter().map(|e| e.raw).collect::<Vec<_>>().join("\n"))
            }
            "analyze" | "errors" => {
                let service = service.ok_or_else(|| ToolError::InvalidArgs("'service' is required for this mode".into()))?;
                let entries = ctx.logs.collect(cancel, &service, lines, false).await?;
                let result = analyze(&service, &entries);
                if result.issues.is_empty() {
                    return Ok(format!("no matching issues in the last {} line(s) for {service}", result.total_lines));
                }
                let mut out = String::new();
                for issue in &result.issues {
                    if mode == "errors" && !matches!(issue.level, dozor_proto::LogLevel::Error | dozor_proto::LogLevel::Fatal) {
                        continue;
                    }
                    out.push_str(&format!("[{}] {} (x{}) — {}\n    example: {}\n", issue.category, issue.description, issue.count, issue.action, issue.example));
                }
                Ok(out)
            }
            "security" => {
                let ports = network::audit_ports().await;
                let certs = certs::scan_filesystem(30).await;
                let mut out = String::from("Listening ports:\n");
                for p in &ports {
                    out.push_str(&format!("  {}/{} bound-all-interfaces={}\n", p.port, p.protocol, p.bound_all_interfaces));
                }
                out.push_str("Certificates:\n");
                for c in &certs {
                    out.push_str(&format!("  {} ({}) expires {} ({})\n", c.domain, c.path.display(), c.not_after, c.status));
                }
                Ok(out)
            }
            "connections" => {
                let summary = network::summarize_connections(10, &network::ConnectionThresholds::default()).await;
                let mut out = format!("udp listeners: {}\n", summary.udp_listener_count);
                for (state, count) in &summary.tcp_state_counts {
                    out.push_str(&format!("  {state}: {count}\n"));
                }
                for warning in &summary.warnings {
                    out.push_str(&format!("warning: {warning}\n"));
                }
                Ok(out)
            }
            "systemd" => {
                let mut out = String::new();
                for unit in &services {
                    let status = ctx.systemd.status(cancel, unit).await?;
                    out.push_str(&format!("{} — active={} ({})\n", status.unit, status.active, status.sub_state));
                }
                Ok(out)
            }
            "remote" => {
                let remote = ctx.remote.as_ref().ok_or(ToolError::NoRemote)?;
                let result = remote.execute(cancel, "uptime && df -h").await?;
                Ok(result.output().to_string())
            }
            "cron" => {
                let result = ctx.local.execute(cancel, "crontab -l").await?;
                if result.success() {
                    Ok(result.output().to_string())
                } else {
                    Ok("no crontab for the current user".to_string())
                }
            }
            other => Err(ToolError::InvalidArgs(format!("unknown mode '{other}'"))),
        }
    }
}

// ----------------------------------------------------------------- triage --

pub struct ServerTriageTool;

#[async_trait]
impl Tool for ServerTriageTool {
    fn name(&self) -> &str {
        "server_triage"
    }

    fn description(&self) -> &str {
        "Runs a composite diagnosis across the managed services and returns one textual report."
    }

    fn parameters(&self) -> Value {
        empty_schema(json!({"services": {"type": "array", "items": {"type": "string"}}}), &[])
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let mut services = arg_str_list(&args, "services");
        if services.is_empty() {
            services = ctx.config.services.clone();
        }
        let options = TriageOptions {
            services,
            dev_mode: ctx.dev_mode.is_enabled(),
            excluded: ctx.dev_mode.excluded().into_iter().collect(),
            disk_critical_pct: ctx.config.disk_critical,
            log_lines: ctx.config.log_lines,
        };
        let report = build_report(&ctx.discovery, &ctx.logs, &ctx.config.host, &options, cancel).await?;
        Ok(render(&report, ctx.dev_mode.is_enabled()))
    }
}

// ------------------------------------------------------------------- exec --

async fn run_guarded(ctx: &ToolContext, cancel: &CancellationToken, command: &str, security: &str) -> Result<String, ToolError> {
    match security {
        "full" => {}
        "ask" => match ctx.approvals.request(command).await {
            ApprovalOutcome::Approved => {}
            ApprovalOutcome::Denied => return Err(ToolError::Approval("denied".into())),
            ApprovalOutcome::TimedOut => return Err(ToolError::Approval("timed out waiting for approval".into())),
        },
        _ => {
            if let CommandVerdict::Blocked { reason } = is_command_allowed(command) {
                return Err(ToolError::Blocked(reason));
            }
        }
    }
    let result = ctx.local.execute(cancel, command).await?;
    Ok(result.output().to_string())
}

pub struct ServerExecTool;

#[async_trait]
impl Tool for ServerExecTool {
    fn name(&self) -> &str {
        "server_exec"
    }

    fn description(&self) -> &str {
        "Runs a shell command on the managed host. 'safe' (default) enforces the command blocklist; 'ask' requires interactive approval; 'full' skips validation."
    }

    fn parameters(&self) -> Value {
        empty_schema(json!({"command": {"type": "string"}, "security": {"type": "string", "enum": ["safe", "ask", "full"]}}), &["command"])
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let command = require_str(&args, "command")?;
        let security = arg_str(&args, "security").unwrap_or("safe");
        run_guarded(ctx, cancel, command, security).await
    }
}

pub struct ServerRemoteExecTool;

#[async_trait]
impl Tool for ServerRemoteExecTool {
    fn name(&self) -> &str {
        "server_remote_exec"
    }

    fn description(&self) -> &str {
        "Runs a shell command against the configured remote host, enforcing the same blocklist as server_exec(security=safe)."
    }

    fn parameters(&self) -> Value {
        empty_schema(json!({"command": {"type": "string"}}), &["command"])
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let command = require_str(&args, "command")?;
        let remote = ctx.remote.as_ref().ok_or(ToolError::NoRemote)?;
        if let CommandVerdict::Blocked { reason } = is_command_allowed(command) {
            return Err(ToolError::Blocked(reason));
        }
        let result = remote.execute(cancel, command).await?;
        Ok(result.output().to_string())
    }
}

// ---------------------------------------------------------------- restart --

pub struct ServerRestartTool;

#[async_trait]
impl Tool for ServerRestartTool {
    fn name(&self) -> &str {
        "server_restart"
    }

    fn description(&self) -> &str {
        "Restarts one compose service."
    }

    fn parameters(&self) -> Value {
        empty_schema(json!({"service": {"type": "string"}}), &["service"])
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let service = require_str(&args, "service")?;
        let result = ctx.local.docker_compose_command(cancel, &["restart".to_string(), service.to_string()]).await?;
        Ok(result.output().to_string())
    }
}

// ----------------------------------------------------------------- deploy --

pub struct ServerDeployTool;

#[async_trait]
impl Tool for ServerDeployTool {
    fn name(&self) -> &str {
        "server_deploy"
    }

    fn description(&self) -> &str {
        "Starts a background compose deploy, or polls the status/health of a prior deploy by id."
    }

    fn parameters(&self) -> Value {
        empty_schema(
            json!({
                "action": {"type": "string", "enum": ["deploy", "status", "health"]},
                "project_path": {"type": "string"},
                "services": {"type": "array", "items": {"type": "string"}},
                "build": {"type": "boolean"},
                "pull": {"type": "boolean"},
                "deploy_id": {"type": "string"},
            }),
            &[],
        )
    }

    async fn execute(&self, ctx: &ToolContext, _cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let action = arg_str(&args, "action").unwrap_or("deploy");
        match action {
            "deploy" => {
                let project_path = require_str(&args, "project_path")?;
                let services = arg_str_list(&args, "services");
                let build = arg_bool(&args, "build", false);
                let pull = arg_bool(&args, "pull", false);
                let result = ctx.deploy.start(project_path, &services, build, pull).await?;
                Ok(format!("started deploy {} (log: {})", result.deploy_id, result.log_path))
            }
            "status" | "health" => {
                let deploy_id = require_str(&args, "deploy_id")?;
                let status = ctx.deploy.status(deploy_id).await?;
                if action == "health" {
                    return Ok(match status.state {
                        DeployState::Completed => format!("{deploy_id}: healthy"),
                        other => format!("{deploy_id}: not healthy ({other})"),
                    });
                }
                Ok(format!("{}: {}\n{}", status.deploy_id, status.state, status.log_content))
            }
            other => Err(ToolError::InvalidArgs(format!("unknown action '{other}'"))),
        }
    }
}

// ------------------------------------------------------------------ prune --

pub struct ServerPruneTool;

#[async_trait]
impl Tool for ServerPruneTool {
    fn name(&self) -> &str {
        "server_prune"
    }

    fn description(&self) -> &str {
        "Reclaims Docker resources: unused images, build cache, and/or unused volumes."
    }

    fn parameters(&self) -> Value {
        empty_schema(
            json!({"images": {"type": "boolean"}, "build_cache": {"type": "boolean"}, "volumes": {"type": "boolean"}, "age": {"type": "string"}}),
            &[],
        )
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let images = arg_bool(&args, "images", true);
        let build_cache = arg_bool(&args, "build_cache", false);
        let volumes = arg_bool(&args, "volumes", false);
        let age = arg_str(&args, "age");

        let mut out = String::new();
        let filter = |age: Option<&str>| age.map(|a| vec!["--filter".to_string(), format!("until={a}")]).unwrap_or_default();

        if images {
            let mut cmd = vec!["image".to_string(), "prune".to_string(), "-af".to_string()];
            cmd.extend(filter(age));
            let result = ctx.local.docker_command(cancel, &cmd).await?;
            out.push_str(&format!("images: {}\n", result.output()));
        }
        if build_cache {
            let mut cmd = vec!["builder".to_string(), "prune".to_string(), "-af".to_string()];
            cmd.extend(filter(age));
            let result = ctx.local.docker_command(cancel, &cmd).await?;
            out.push_str(&format!("build cache: {}\n", result.output()));
        }
        if volumes {
            let result = ctx.local.docker_command(cancel, &["volume".to_string(), "prune".to_string(), "-f".to_string()]).await?;
            out.push_str(&format!("volumes: {}\n", result.output()));
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------- cleanup --

pub struct ServerCleanupTool;

#[async_trait]
impl Tool for ServerCleanupTool {
    fn name(&self) -> &str {
        "server_cleanup"
    }

    fn description(&self) -> &str {
        "Scans (dry run by default) or executes cleanup against known cache locations: apt, docker images/build-cache, journal, npm, or 'all'."
    }

    fn parameters(&self) -> Value {
        empty_schema(
            json!({"targets": {"type": "array", "items": {"type": "string"}}, "report": {"type": "boolean"}, "min_age": {"type": "string"}}),
            &[],
        )
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let targets = arg_str_list(&args, "targets");
        let report = arg_bool(&args, "report", true);
        let min_age = arg_str(&args, "min_age").and_then(dozor_proto::config::parse_go_duration);
        let scanner = CleanupScanner::new(ctx.local.clone());

        if report {
            let findings = scanner.scan(cancel, &targets).await?;
            let mut out = String::new();
            for f in &findings {
                out.push_str(&format!("{}: present={} reclaimable={}\n", f.target, f.present, f.reclaimable));
            }
            Ok(out)
        } else {
            let outcomes = scanner.clean(cancel, &targets, min_age).await?;
            let mut out = String::new();
            for o in &outcomes {
                out.push_str(&format!("{}: success={} {}\n", o.target, o.success, o.output));
            }
            Ok(out)
        }
    }
}

// --------------------------------------------------------------- services --

async fn services_execute(
    systemd: &dozor_collect::SystemdCollector,
    cancel: &CancellationToken,
    args: &Value,
) -> Result<String, ToolError> {
    let action = arg_str(args, "action").unwrap_or("status");
    let service = arg_str(args, "service");
    let lines = arg_usize(args, "lines", 200);

    match action {
        "status" => {
            let unit = service.ok_or_else(|| ToolError::InvalidArgs("'service' is required".into()))?;
            let status = systemd.status(cancel, unit).await?;
            Ok(format!("{} — active={} ({})", status.unit, status.active, status.sub_state))
        }
        "restart" => {
            let unit = service.ok_or_else(|| ToolError::InvalidArgs("'service' is required".into()))?;
            let ok = systemd.restart(cancel, unit).await?;
            Ok(format!("{unit}: restart {}", if ok { "succeeded" } else { "failed" }))
        }
        "restart-all" => {
            let unit = service.map(|s| vec![s.to_string()]).unwrap_or_default();
            let results = systemd.restart_all(cancel, &unit).await?;
            Ok(results.into_iter().map(|(name, ok)| format!("{name}: {}", if ok { "ok" } else { "failed" })).collect::<Vec<_>>().join("\n"))
        }
        "logs" => {
            let unit = service.ok_or_else(|| ToolError::InvalidArgs("'service' is required".into()))?;
            systemd.logs(cancel, unit, lines).await.map_err(ToolError::from)
        }
        other => Err(ToolError::InvalidArgs(format!("unknown action '{other}'"))),
    }
}

fn services_params() -> Value {
    empty_schema(
        json!({"action": {"type": "string", "enum": ["status", "restart", "restart-all", "logs"]}, "service": {"type": "string"}, "lines": {"type": "integer"}}),
        &[],
    )
}

pub struct ServerServicesTool;

#[async_trait]
impl Tool for ServerServicesTool {
    fn name(&self) -> &str {
        "server_services"
    }

    fn description(&self) -> &str {
        "systemd unit status/restart/logs on the local managed host."
    }

    fn parameters(&self) -> Value {
        services_params()
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        services_execute(&ctx.systemd, cancel, &args).await
    }
}

pub struct ServerRemoteServicesTool;

#[async_trait]
impl Tool for ServerRemoteServicesTool {
    fn name(&self) -> &str {
        "server_remote"
    }

    fn description(&self) -> &str {
        "systemd unit status/restart/logs on the configured remote host."
    }

    fn parameters(&self) -> Value {
        services_params()
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let systemd = ctx.remote_systemd.as_ref().ok_or(ToolError::NoRemote)?;
        services_execute(systemd, cancel, &args).await
    }
}

// ---------------------------------------------------------------- updates --

pub struct ServerUpdatesTool;

#[async_trait]
impl Tool for ServerUpdatesTool {
    fn name(&self) -> &str {
        "server_updates"
    }

    fn description(&self) -> &str {
        "Checks or installs the latest GitHub release of a tracked binary."
    }

    fn parameters(&self) -> Value {
        empty_schema(json!({"action": {"type": "string", "enum": ["check", "install"]}, "binary": {"type": "string"}}), &["binary"])
    }

    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        let action = arg_str(&args, "action").unwrap_or("check");
        let binary = require_str(&args, "binary")?;
        let tracked = ctx
            .config
            .tracked_binaries
            .iter()
            .find_map(|spec| TrackedBinary::parse(spec).filter(|t| t.binary == binary))
            .or_else(|| TrackedBinary::parse(binary))
            .ok_or_else(|| ToolError::InvalidArgs(format!("'{binary}' is not a recognized owner/repo[:binary] or tracked binary")))?;

        let checker = UpdateChecker::new(ctx.local.clone(), ctx.config.github_token.clone());
        match action {
            "check" => {
                let result = checker.check(cancel, &tracked).await?;
                Ok(format!(
                    "{}: installed={} latest={} update_available={}",
                    result.binary,
                    result.installed_version.as_deref().unwrap_or("unknown"),
                    result.latest_version,
                    result.update_available
                ))
            }
            "install" => checker.install(cancel, &tracked).await.map_err(ToolError::from),
            other => Err(ToolError::InvalidArgs(format!("unknown action '{other}'"))),
        }
    }
}

// --------------------------------------------------------------- dev_mode --

pub struct ServerDevModeTool;

#[async_trait]
impl Tool for ServerDevModeTool {
    fn name(&self) -> &str {
        "server_dev_mode"
    }

    fn description(&self) -> &str {
        "Toggles observe-only dev mode and manages the per-service watch exclusion set."
    }

    fn parameters(&self) -> Value {
        empty_schema(
            json!({
                "enable": {"type": "boolean"},
                "exclude": {"type": "array", "items": {"type": "string"}},
                "include": {"type": "array", "items": {"type": "string"}},
                "ttl": {"type": "string"},
            }),
            &[],
        )
    }

    async fn execute(&self, ctx: &ToolContext, _cancel: &CancellationToken, args: Value) -> Result<String, ToolError> {
        if let Some(enable) = args.get("enable").and_then(Value::as_bool) {
            ctx.dev_mode.set_enabled(enable);
        }
        let exclude = arg_str_list(&args, "exclude");
        if !exclude.is_empty() {
            let ttl = arg_str(&args, "ttl").and_then(dozor_proto::config::parse_go_duration).unwrap_or(Duration::from_secs(3600));
            ctx.dev_mode.exclude(&exclude, ttl);
        }
        let include = arg_str_list(&args, "include");
        if !include.is_empty() {
            ctx.dev_mode.include(&include);
        }

        let excluded: HashSet<_> = ctx.dev_mode.excluded().into_iter().collect();
        Ok(format!(
            "dev_mode={} excluded=[{}]",
            ctx.dev_mode.is_enabled(),
            excluded.into_iter().collect::<Vec<_>>().join(", ")
        ))
    }
}

/// Builds the canonical set of tools, to be wired into a `ToolRegistry` via `ToolRegistry::from_tools`.
pub fn all() -> Vec<Box<dyn Tool>> {
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
