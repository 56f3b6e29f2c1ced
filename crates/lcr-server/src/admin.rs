//! HTTP admin interface
//!
//! - `GET /health`: liveness and platform
//! - `GET /caches`: entry count per routing cache
//! - `POST /caches/reset`: drop every cached carrier, route, override and blacklist

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

use lcr_core::{CacheStats, RoutingService};

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub caches: Vec<CacheStats>,
}

pub fn create_router(service: Arc<RoutingService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/caches", get(cache_stats))
        .route("/caches/reset", post(reset_caches))
        .with_state(service)
}

async fn health(State(service): State<Arc<RoutingService>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": lcr_core::VERSION,
        "platform": service.config().platform.to_string(),
    }))
}

async fn cache_stats(State(service): State<Arc<RoutingService>>) -> Json<CacheReport> {
    Json(CacheReport {
        caches: service.cache_stats().await,
    })
}

async fn reset_caches(State(service): State<Arc<RoutingService>>) -> (StatusCode, Json<Value>) {
    info!("Cache reset requested over HTTP");
    service.reset_caches();
    (StatusCode::OK, Json(json!({ "reset": true })))
}

/// Serve the admin router until the returned task is aborted
pub async fn serve(addr: SocketAddr, service: Arc<RoutingService>) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Admin interface listening on {}", listener.local_addr()?);
    let app = create_router(service);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Admin interface stopped: {}", e);
        }
    }))
}
