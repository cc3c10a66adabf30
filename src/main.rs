//! # Enlist Entry Point
//!
//! `serve` runs the gateway; `register` runs one bulk registration pass against a running gateway.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use enlist::{
    config::{AppConfig, ConfigLoader},
    orchestrator::{
        FanOutLog, HttpGatewayClient, LogSink, Orchestrator, RunOverrides, RunSettings,
        StdoutLog, TracingLog,
    },
    server::run_server,
    telemetry,
};

#[derive(Parser)]
#[command(name = "enlist")]
#[command(about = "Target platform gateway and bulk registration runner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway
    Serve,
    /// Register for every unregistered target in an eligible category
    Register {
        /// Bearer token for the remote platform (overrides ENLIST_TOKEN from the environment or .env files)
        #[arg(long)]
        token: Option<String>,
        /// Gateway base URL (overrides ENLIST_GATEWAY_URL)
        #[arg(long)]
        gateway_url: Option<String>,
        /// Eligible category, repeatable (overrides ENLIST_ELIGIBLE_CATEGORIES)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Delay between registration attempts in milliseconds (overrides ENLIST_REGISTER_DELAY_MS)
        #[arg(long)]
        delay_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load().context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing telemetry")?;

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Loaded configuration");
    }

    match cli.command {
        Command::Serve => run_server(config)
            .await
            .map_err(|err| anyhow!("gateway stopped: {}", err)),
        Command::Register {
            token,
            gateway_url,
            categories,
            delay_ms,
        } => {
            let overrides = RunOverrides {
                token,
                gateway_url,
                categories,
                delay_ms,
            };
            run_registration(config, overrides).await
        }
    }
}

async fn run_registration(config: AppConfig, overrides: RunOverrides) -> Result<()> {
    let settings = RunSettings::resolve(config.registration, overrides)?;

    let gateway = HttpGatewayClient::new(&settings.gateway_url)
        .with_context(|| format!("building gateway client for {}", settings.gateway_url))?;
    let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(StdoutLog), Arc::new(TracingLog)];
    let orchestrator = Orchestrator::new(
        Arc::new(gateway),
        Arc::new(FanOutLog::new(sinks)),
        settings.delay,
    );

    let summary = orchestrator
        .run(&settings.credential, &settings.eligible)
        .await;
    tracing::info!(
        success = summary.success_count,
        errors = summary.error_count,
        "Registration run finished"
    );
    Ok(())
}
