//! Read-only status endpoint.
//!
//! Not a control surface: the simulator is driven entirely by config and
//! the orchestrator loop; this just exposes what it is doing.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::info;

use crate::scout::monitor::MonitorStatus;
use crate::scout::portfolio::{PerformanceStats, Portfolio, PortfolioSummary};

#[derive(Clone)]
pub struct AdminState {
    pub portfolio: Arc<Mutex<Portfolio>>,
    pub status_rx: watch::Receiver<MonitorStatus>,
}

#[derive(Serialize)]
struct StatusResponse {
    monitor: MonitorStatus,
    portfolio: PortfolioSummary,
}

pub async fn serve(state: AdminState, addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route("/status", get(get_status))
        .route("/performance", get(get_performance))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind admin endpoint on {addr}"))?;
    info!("🛰️ status endpoint listening on {addr}");
    axum::serve(listener, app).await.context("admin server failed")?;
    Ok(())
}

async fn get_status(State(state): State<AdminState>) -> Json<StatusResponse> {
    let portfolio = state.portfolio.lock().await.summary();
    let monitor = state.status_rx.borrow().clone();
    Json(StatusResponse { monitor, portfolio })
}

async fn get_performance(State(state): State<AdminState>) -> Json<PerformanceStats> {
    let stats = state.portfolio.lock().await.performance();
    Json(stats)
}
