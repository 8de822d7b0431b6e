//! Hazard tile API service.

use anyhow::Result;
use clap::Parser;
use std::{env, net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tile_api::build_router;
use tile_api::config::TileServiceConfig;
use tile_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "tile-api")]
#[command(about = "Weather hazard XYZ tile server")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    let worker_threads = args.worker_threads.or_else(|| {
        env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|threads| threads.parse::<usize>().ok())
    });
    if let Some(threads) = worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args, worker_threads))
}

async fn async_main(args: Args, worker_threads: Option<usize>) -> Result<()> {
    // RUST_LOG wins over --log-level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).json().init();

    if let Some(threads) = worker_threads {
        info!("Configured tokio runtime with {} worker threads", threads);
    }

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    info!("Prometheus metrics exporter initialized");

    let config = TileServiceConfig::from_env();
    info!(
        source = ?config.source,
        cache_backend = ?config.cache_backend,
        tile_ttl_secs = config.tile_ttl.as_secs(),
        snapshot_ttl_secs = config.snapshot_ttl.as_secs(),
        "Starting hazard tile server"
    );

    let state = AppState::from_config(&config)
        .await?
        .with_prometheus(prometheus_handle);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
