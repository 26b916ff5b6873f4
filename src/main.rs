//! IntelliQ · Question Paper Backend
//!
//! - Axum HTTP API for question paper generation and test persistence
//! - Tenant-scoped in-memory stores, seeded with a `DEMO` group
//!
//! Important env variables:
//!   PORT             : u16 (overrides `server.port`, default 3000)
//!   APP_CONFIG_PATH  : path to TOML config (limits, deadlines, groups, question bank)
//!   LOG_LEVEL        : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

mod telemetry;
mod messages;
mod error;
mod util;
mod domain;
mod criteria;
mod selection;
mod assembler;
mod repo;
mod config;
mod seeds;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (config + tenant stores).
  let state = Arc::new(AppState::new());
  let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port()));

  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "intelliq_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "intelliq_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!(target: "intelliq_backend", "Shutdown requested"),
    Err(e) => {
      warn!(target: "intelliq_backend", error = %e, "Ctrl-C handler unavailable; serving until killed");
      std::future::pending::<()>().await;
    }
  }
}
