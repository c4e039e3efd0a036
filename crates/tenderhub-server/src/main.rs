//! tenderhub: HTTP service for the demand, bidding and escrow marketplace.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tenderhub_server::{AppState, MarketConfig, router};
use tenderhub_sweeper::{SweepConfig, SweepLoop};
use tenderhub_types::SystemClock;

#[derive(Parser)]
#[command(name = "tenderhub")]
#[command(about = "Freelance marketplace: demands, bids, escrow and reputation")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TENDERHUB_CONFIG", default_value = "tenderhub.toml")]
    config: PathBuf,

    /// Listen address (overrides config file)
    #[arg(long, env = "TENDERHUB_BIND")]
    bind: Option<String>,

    /// Write the effective configuration back to --config and exit
    #[arg(long)]
    write_config: bool,
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("tenderhub=info".parse()?);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = MarketConfig::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    init_tracing(config.json_logs)?;

    if cli.write_config {
        config.save(&cli.config)?;
        info!(path = %cli.config.display(), "configuration written");
        return Ok(());
    }

    info!("Starting tenderhub");
    info!("Config file: {}", cli.config.display());

    let state = AppState::new(&config, Arc::new(SystemClock));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_loop = SweepLoop::new(
        state.sweeper.clone(),
        state.clock.clone(),
        shutdown_rx,
        SweepConfig {
            interval: config.sweep_interval(),
        },
    );
    let sweep_handle = tokio::spawn(sweep_loop.run());

    let app = router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    sweep_handle.await?;
    Ok(())
}
