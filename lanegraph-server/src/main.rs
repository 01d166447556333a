mod config;
mod routes;
mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use lanegraph_core::algo::DensityGrid;
use lanegraph_core::loading::build_graph;
use tracing::{error, info, warn};

use config::{Args, ServerConfig};
use routes::build_router;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::from_args(&args)?;

    // Ctrl+C during the build stops the bike flag write-back between chunks
    let abort = Arc::new(AtomicBool::new(false));
    let build_abort = Arc::clone(&abort);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received during graph build");
            build_abort.store(true, Ordering::Relaxed);
        }
    });

    info!("Building road graph... (this may take a moment)");
    let pipeline = config.pipeline.clone();
    let built = tokio::task::spawn_blocking(move || build_graph(&pipeline, Some(abort))).await?;
    interrupt.abort();

    let store = match built {
        Ok((store, report)) => {
            info!(
                "Road graph ready: {} nodes, {} steps completed, {} skipped",
                store.node_count(),
                report.completed.len(),
                report.skipped.len()
            );
            store
        }
        Err(e) => {
            error!("Failed to build road graph: {e}");
            return Err(e.into());
        }
    };

    let density = match &config.density_path {
        Some(path) => Some(DensityGrid::load(path, config.density.clone())?),
        None => {
            warn!("No density grid configured, /interact is disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(store, density));
    let app = build_router(Arc::clone(&state), config.max_concurrent_requests);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Caught interrupt signal, closing graph store");
    match Arc::try_unwrap(state) {
        Ok(state) => state.store.close(),
        Err(_) => warn!("Graph store still in use at shutdown"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}
