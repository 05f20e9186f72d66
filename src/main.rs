use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use duel_backend::api;
use duel_backend::config::{self, Config};
use duel_backend::db::Database;
use duel_backend::metrics;
use duel_backend::rate_limit::RateLimiter;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "duel-backend" }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cfg = Config::load();
    config::set_local_mode(cfg.local_mode);
    if cfg.local_mode {
        tracing::warn!("local mode enabled: auth and rate limiting are bypassed");
    }

    let db = Database::new(&cfg.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    metrics::register_metrics();
    let rate_limiter = RateLimiter::new();

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api::router(db, rate_limiter))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("Duel backend listening on port {}", cfg.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
