//! Ledger gateway binary.
//!
//! Thin wiring: CLI → config → validated setup → handler + serve loops.
//! Ships with the built-in demo executor; a real node injects its own
//! command executor and protocol engines through the library API.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_gateway::config::{build_setup, loader};
use ledger_gateway::net::Server;
use ledger_gateway::observability::metrics;
use ledger_gateway::resource::{ResourceManager, ResourceSettings};
use ledger_gateway::rpc::handoff::{DisabledOverlay, DisabledWebsocket};
use ledger_gateway::rpc::{BasicExecutor, StandardRolePolicy};
use ledger_gateway::{ServerHandler, Shutdown};

#[derive(Parser)]
#[command(name = "ledger-gateway")]
#[command(about = "Network front end for a ledger node", long_about = None)]
struct Cli {
    /// Path to the gateway configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Run without peer networking.
    #[arg(long)]
    standalone: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ledger-gateway v0.1.0 starting");

    let config = loader::load_config(&cli.config)?;
    let standalone = cli.standalone || config.standalone;

    let setup = match build_setup(&config, standalone) {
        Ok(setup) => Arc::new(setup),
        Err(e) => {
            tracing::error!(error = %e, "fatal configuration error");
            return Err(e.into());
        }
    };

    tracing::info!(
        ports = setup.ports.len(),
        standalone,
        overlay = ?setup.overlay,
        max_request_bytes = config.limits.max_request_bytes,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let handler = ServerHandler::new(
        &config.limits,
        ResourceManager::new(ResourceSettings::from(&config.resource)),
        Arc::new(BasicExecutor),
        Arc::new(StandardRolePolicy),
        Arc::new(DisabledOverlay),
        Arc::new(DisabledWebsocket),
    );

    let shutdown = Arc::new(Shutdown::new());
    let signal_watcher = Arc::clone(&shutdown);
    tokio::spawn(async move { signal_watcher.on_ctrl_c().await });

    let server = Server::new(Arc::clone(&setup), handler);
    server.run(&shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
