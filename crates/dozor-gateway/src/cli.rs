//! Async handlers behind the `serve`/`check`/`watch` CLI subcommands (§6 CLI surface).

use crate::mcp::{self, McpRequest, McpResponse};
use crate::routes;
use crate::state::GatewayState;
use dozor_runtime::WatchAction;
use dozor_triage::{TriageOptions, build_report, render};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// `dozor serve [--port P] [--stdio]`. Binds the HTTP gateway unless
/// `--stdio` requests a newline-delimited JSON loop over stdin/stdout instead.
pub async fn serve(state: Arc<GatewayState>, port: Option<u16>, stdio: bool) -> anyhow::Result<()> {
    if stdio {
        return serve_stdio(state).await;
    }

    let port = port.unwrap_or(state.config.mcp_port);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "dozor gateway listening");

    let app = routes::router(state);
    tokio::select! {
        result = axum::serve(listener, app) => result?,
        _ = shutdown_signal() => info!("shutdown signal received"),
    }
    Ok(())
}

/// Reads one `McpRequest` JSON object per line from stdin, writing one
/// `McpResponse` JSON object per line to stdout. Used when Dozor is driven
/// as a subprocess rather than over HTTP.
async fn serve_stdio(state: Arc<GatewayState>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<McpRequest>(&line) {
            Ok(request) => mcp::handle(&state, request).await,
            Err(err) => McpResponse::Error { error: format!("malformed request: {err}") },
        };
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// `dozor check [--json] [--services s1,s2]`. Runs one triage sweep and
/// prints it; returns an exit code (1 when `needs_attention`, per §6).
pub async fn check(state: Arc<GatewayState>, json: bool, services: Option<Vec<String>>) -> anyhow::Result<i32> {
    let services = services.unwrap_or_else(|| state.config.services.clone());
    let options = TriageOptions {
        services,
        dev_mode: state.dev_mode.is_enabled(),
        excluded: state.dev_mode.excluded_set(),
        disk_critical_pct: state.config.disk_critical,
        log_lines: state.config.log_lines,
    };
    let cancel = CancellationToken::new();
    let report = build_report(&state.tool_ctx.discovery, &state.tool_ctx.logs, &state.config.host, &options, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render(&report, state.dev_mode.is_enabled()));
    }

    Ok(if report.needs_attention() { 1 } else { 0 })
}

/// `dozor watch [--interval D] [--webhook URL]`. Runs `GatewayState::watch`
/// on a fixed interval, driving the agent loop on anything that needs
/// correction and posting the outcome to `webhook` (overriding `DOZOR_WEBHOOK_URL`)
/// when configured.
pub async fn watch(state: Arc<GatewayState>, interval: Option<Duration>, webhook: Option<String>) -> anyhow::Result<()> {
    let interval = interval.unwrap_or(state.config.watch_interval);
    let webhook = webhook.or_else(|| state.config.webhook_url.clone());
    let http = reqwest::Client::new();
    let cancel = CancellationToken::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = shutdown_signal() => {
                info!("shutdown signal received, stopping watch loop");
                return Ok(());
            }
        }

        let outcome = match state.watch.tick(&state.dev_mode, &cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "watch tick failed");
                continue;
            }
        };

        let report_text = match &outcome.action {
            WatchAction::Observe => {
                info!(health = %outcome.report.overall_health(), "watch: nothing needs correction");
                outcome.rendered.clone()
            }
            WatchAction::Correct(prompt) => {
                warn!(health = %outcome.report.overall_health(), "watch: driving corrective action");
                let agent = state.agent_loop();
                match agent.run(&cancel, state.workspace.system_prompt(), prompt.clone()).await {
                    Ok(summary) => format!("{}\n\nCorrective action summary:\n{summary}", outcome.rendered),
                    Err(err) => format!("{}\n\nCorrective action failed: {err}", outcome.rendered),
                }
            }
        };

        if let Some(url) = &webhook {
            if let Err(err) = http.post(url).json(&serde_json::json!({"text": report_text})).send().await {
                error!(error = %err, "failed to post watch outcome to webhook");
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
