//! dozor — process entry point.
//!
//! Loads `Config` from the environment, wires every crate into one
//! `GatewayState`, and dispatches to the `serve`/`check`/`watch` subcommand.

use clap::{Parser, Subcommand};
use dozor_gateway::GatewayState;
use dozor_proto::Config;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn parse_duration(s: &str) -> Result<Duration, String> {
    dozor_proto::config::parse_go_duration(s).ok_or_else(|| format!("invalid duration literal: {s}"))
}

#[derive(Parser)]
#[command(name = "dozor")]
#[command(about = "AI-facing server-operations agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway (or a stdio JSON-lines loop)
    Serve {
        /// Overrides `DOZOR_MCP_PORT`
        #[arg(long)]
        port: Option<u16>,

        /// Speak newline-delimited JSON over stdin/stdout instead of binding HTTP
        #[arg(long)]
        stdio: bool,
    },

    /// Run one triage sweep and print it; exits 1 if anything needs attention
    Check {
        #[arg(long)]
        json: bool,

        /// Comma-separated service names; defaults to `DOZOR_SERVICES`
        #[arg(long, value_delimiter = ',')]
        services: Option<Vec<String>>,
    },

    /// Run the autonomous watch loop
    Watch {
        /// Go-style duration (e.g. "4h", "30m"); overrides `DOZOR_WATCH_INTERVAL`
        #[arg(long, value_parser = parse_duration)]
        interval: Option<Duration>,

        /// Overrides `DOZOR_WEBHOOK_URL`
        #[arg(long)]
        webhook: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("dozor=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let state = GatewayState::build(config)?;

    match cli.command {
        Commands::Serve { port, stdio } => dozor_gateway::cli::serve(state, port, stdio).await?,
        Commands::Check { json, services } => {
            let code = dozor_gateway::cli::check(state, json, services).await?;
            std::process::exit(code);
        }
        Commands::Watch { interval, webhook } => dozor_gateway::cli::watch(state, interval, webhook).await?,
    }

    Ok(())
}
