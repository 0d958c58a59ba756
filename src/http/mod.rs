//! HTTP surface
//!
//! A second ingress for raw payloads (`POST /mqtt/raw`) plus read-only views
//! over the raw buffer, the reading store and the pipeline counters. Every
//! handler goes through the same [`IngestCoordinator`] as the broker path.

pub mod handlers;

use crate::ingest::IngestCoordinator;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<IngestCoordinator>,
    /// Number of readings returned by `/raw/filtered`.
    pub recent_limit: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::banner))
        .route("/health", get(handlers::health))
        .route("/raw", get(handlers::raw_snapshot))
        .route("/raw/filtered", get(handlers::recent_readings))
        .route("/mqtt/raw", post(handlers::ingest_raw))
        .route("/stats", get(handlers::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
