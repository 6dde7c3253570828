mod api;
mod config;
mod detector;
mod engine;
mod error;
mod fetcher;
mod matcher;
mod notify;
mod persist;
mod scanner;
mod state;
mod types;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::api::{HealthState, LatencyStats};
use crate::config::Config;
use crate::error::Result;
use crate::notify::Notifier;
use crate::persist::StateGateway;
use crate::scanner::Scanner;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Could not read .env: {e}");
        }
    }

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Restore state (trimmed to the retention window on load) ---
    let gateway = StateGateway::new(&cfg.state_file, cfg.retention.clone());
    let state = gateway.load(Utc::now());

    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new()?);

    // --- HTTP API server ---
    let app = router(ApiState {
        health: Arc::clone(&health),
        latency: Arc::clone(&latency),
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP API stopped: {e}");
        }
    });

    // --- Scanner ---
    let notifier = Notifier::from_config(&cfg)?;
    info!(
        interval_secs = cfg.scan_interval_secs,
        keywords = cfg.market_keywords.len(),
        "Scanning every {}s (gap >= {} pts, move >= {} pts, correlation >= {} pts)",
        cfg.scan_interval_secs,
        cfg.detection.gap_threshold,
        cfg.detection.move_threshold,
        cfg.detection.correlation_threshold,
    );
    let mut scanner = Scanner::new(cfg, notifier, gateway, state, health, latency)?;
    scanner.announce_startup().await;

    tokio::select! {
        _ = scanner.run() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("Ctrl-C listener failed: {e}");
            }
            info!("Shutdown requested");
        }
    }

    scanner.save()?;
    info!(scans = scanner.state().scan_count, "Scanner stopped");
    Ok(())
}
