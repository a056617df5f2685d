//! # ToriiKV Server
//!
//! Run with:
//! `cargo run --bin torii-server -- --port 8000 --data-dir ./data \
//!      --topology http://127.0.0.1:8000,http://127.0.0.1:8001`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};

use torii_api::server::{create_router, AppState};
use torii_core::{ClusterConfig, StoreConfig, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let port: u16 = args
        .iter()
        .position(|a| a == "--port")
        .and_then(|i| args.get(i + 1))
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let data_dir = args
        .iter()
        .position(|a| a == "--data-dir")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"));

    let topology: Vec<String> = args
        .iter()
        .position(|a| a == "--topology")
        .and_then(|i| args.get(i + 1))
        .map(|t| t.split(',').map(str::to_string).collect())
        .unwrap_or_else(|| vec![format!("http://127.0.0.1:{port}")]);

    // This node is the topology entry listening on our port.
    let self_endpoint = topology
        .iter()
        .find(|endpoint| endpoint.ends_with(&format!(":{port}")))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("topology has no endpoint for port {port}"))?;

    let addr = format!("0.0.0.0:{port}");
    info!("starting ToriiKV {VERSION} on {addr}");
    info!("data directory: {data_dir:?}");

    let store = StoreConfig::new(data_dir);
    let cluster = ClusterConfig {
        topology,
        ..Default::default()
    };

    let state = Arc::new(AppState::new(store, &cluster, &self_endpoint)?);
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_state.begin_shutdown();
        })
        .await?;

    // Listener is down; finish read-repair and flush the engine.
    state.finish_shutdown().await?;
    info!("shutdown complete");
    Ok(())
}
