// HTTP API routes (match settlement, settlement lookup, leaderboard).

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::db::Database;
use crate::error::Error;
use crate::metrics;
use crate::rate_limit::{RateLimitType, RateLimiter};
use crate::settlement;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    pub game_id: String,
}

#[derive(Deserialize)]
pub struct LeaderboardParams {
    pub limit: Option<i64>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub rate_limiter: RateLimiter,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: sqlx::Error) -> impl IntoResponse {
    tracing::error!("Database error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(db: Arc<Database>, rate_limiter: RateLimiter) -> Router {
    let state = AppState { db, rate_limiter };

    Router::new()
        // Settlement
        .route("/api/matches/settle", post(settle_match))
        .route("/api/matches/{id}/settlement", get(get_settlement))
        // Leaderboard
        .route("/api/leaderboard", get(leaderboard))
        // Metrics
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

// ── Settlement handlers ───────────────────────────────────────────────

async fn settle_match(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SettleRequest>,
) -> Response {
    if let Err(e) = state
        .rate_limiter
        .check_limit(auth.0.sub, RateLimitType::SettlementRequests)
    {
        return json_error(StatusCode::TOO_MANY_REQUESTS, &e.to_string()).into_response();
    }

    let timer = std::time::Instant::now();
    let result =
        settlement::process(&state.db, auth.0.sub, &req.game_id, chrono::Utc::now()).await;
    metrics::SETTLEMENT_DURATION_SECONDS.observe(timer.elapsed().as_secs_f64());

    match result {
        Ok(summary) => {
            if summary.already_processed {
                metrics::SETTLEMENTS_TOTAL
                    .with_label_values(&["already_processed"])
                    .inc();
            } else {
                metrics::SETTLEMENTS_TOTAL
                    .with_label_values(&["processed"])
                    .inc();
                let gold: i64 = summary.participants.iter().map(|p| p.gold_reward).sum();
                if gold > 0 {
                    metrics::GOLD_GRANTED_TOTAL.inc_by(gold as u64);
                }
            }
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(e) => {
            let label = match &e {
                Error::FailedPrecondition(_) => "rejected",
                _ => "failed",
            };
            metrics::SETTLEMENTS_TOTAL.with_label_values(&[label]).inc();
            e.into_response()
        }
    }
}

async fn get_settlement(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.db.get_settlement(&id).await {
        Ok(Some(row)) => match settlement::stored_summary(&row) {
            Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
            Err(e) => e.into_response(),
        },
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Match not settled").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

// ── Leaderboard handler ───────────────────────────────────────────────

async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Response {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    match state.db.leaderboard(limit).await {
        Ok(records) => (StatusCode::OK, Json(json!(records))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

// ── Metrics handler ───────────────────────────────────────────────────

async fn metrics_endpoint() -> Response {
    (StatusCode::OK, metrics::gather_metrics()).into_response()
}
