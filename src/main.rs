//! PyLearn · Reward & Progression Engine
//!
//! - Axum HTTP API over an in-memory transactional store
//! - One-time completion rewards, weighted card grants, challenge
//!   progress tracking, milestone payouts, XP level curve
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   ENGINE_CONFIG_PATH : path to TOML config (curve tuning + content banks)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod domain;
mod error;
mod config;
mod progression;
mod seeds;
mod store;
mod ledger;
mod distributor;
mod challenges;
mod milestones;
mod quiz;
mod games;
mod protocol;
mod routes;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::load_engine_config_from_env;
use crate::routes::build_router;
use crate::store::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    // Build shared application state (config + seeded in-memory store).
    let config = load_engine_config_from_env();
    let state = AppState::new(config);

    // Build the HTTP router with routes, CORS and tracing layers.
    let app = build_router(state);

    // Read port from env or default to 3000.
    let addr: SocketAddr = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = TcpListener::bind(addr).await?;
    info!(target: "pylearn_backend", %addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
