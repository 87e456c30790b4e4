use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragbot_core::bootstrap::{
    AppContext, health_check, load_config, resolve_config_path, run_ingest, warmup_provider,
};
use ragbot_gateway::GatewayServer;
use tokio::sync::watch;

/// Answer questions about a folder of PDFs through a small web chat.
#[derive(Debug, Parser)]
#[command(name = "ragbot", version, about)]
struct Cli {
    /// Path to the TOML config file (falls back to `RAGBOT_CONFIG`, then config/default.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split, embed and upsert every PDF in the data directory
    Ingest {
        /// Directory to scan; overrides ingest.data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Serve the chat page and the question endpoint
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = load_config(&config_path)?;
    tracing::info!(path = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::Ingest { data_dir } => {
            let dir = data_dir.unwrap_or_else(|| config.ingest.data_dir.clone());
            let report = run_ingest(&config, &dir).await?;
            tracing::info!(
                documents = report.documents,
                chunks = report.chunks,
                batches = report.batches,
                created_index = report.created_index,
                "ingestion complete"
            );
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await?;
        }
    }
    Ok(())
}

async fn serve(config: ragbot_core::Config) -> anyhow::Result<()> {
    let ctx = AppContext::build(config).await?;
    let llm = ctx.qa().llm().clone();
    health_check(&llm).await;
    warmup_provider(&llm).await;
    ctx.check_index().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let server = ctx.config().server.clone();
    GatewayServer::new(&server.host, server.port, ctx.qa(), shutdown_rx)?
        .with_max_body_size(server.max_body_size)
        .serve()
        .await
        .context("chat server failed")
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
