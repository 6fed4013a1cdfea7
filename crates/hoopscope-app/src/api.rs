// Read-only JSON API over the store.
//
// GET /api/games?date=YYYY-MM-DD&status=in
// GET /api/games/:id
// GET /api/games/:id/plays
// GET /api/games/:id/stats
// GET /api/games/:id/zones
// GET /api/games/:id/insights?limit=50&kind=zone_cold&severity=high

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use hoopscope_core::insights::{Insight, InsightKind, Severity};
use hoopscope_core::stats::PlayerGameStats;
use hoopscope_core::zones::PlayerZoneStats;
use hoopscope_core::Play;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::db::{Database, InsightFilter};
use crate::espn::GameRecord;

/// Insights returned when the request gives no `limit`.
pub const DEFAULT_INSIGHT_LIMIT: usize = 50;
/// Largest `limit` honored; bigger values are clamped.
pub const MAX_INSIGHT_LIMIT: usize = 500;

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, String)>;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<Database>,
}

pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/games", get(list_games))
        .route("/api/games/:id", get(get_game))
        .route("/api/games/:id/plays", get(get_plays))
        .route("/api/games/:id/stats", get(get_stats))
        .route("/api/games/:id/zones", get(get_zones))
        .route("/api/games/:id/insights", get(get_insights))
        .with_state(state)
        .layer(cors)
}

/// Serve the API on an already-bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, db: Arc<Database>) {
    let addr = listener.local_addr().ok();
    let app = create_router(ApiState { db });
    info!(?addr, "API server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!("API server stopped: {}", e);
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!("API query failed: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

fn bad_request(message: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message)
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GamesQuery {
    pub date: Option<String>,
    pub status: Option<String>,
}

/// GET /api/games
async fn list_games(
    State(state): State<ApiState>,
    Query(query): Query<GamesQuery>,
) -> ApiResult<Vec<GameRecord>> {
    let day = query
        .date
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| bad_request(format!("invalid date `{d}`, expected YYYY-MM-DD")))
        })
        .transpose()?;
    let status = query.status.as_deref().filter(|s| !s.is_empty());

    state.db.list_games(day, status).map(Json).map_err(internal)
}

/// GET /api/games/:id
async fn get_game(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<GameRecord> {
    match state.db.load_game(&id).map_err(internal)? {
        Some(game) => Ok(Json(game)),
        None => Err((StatusCode::NOT_FOUND, format!("game {id} not found"))),
    }
}

/// GET /api/games/:id/plays
async fn get_plays(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Vec<Play>> {
    state.db.load_plays(&id).map(Json).map_err(internal)
}

/// GET /api/games/:id/stats
async fn get_stats(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<PlayerGameStats>> {
    state.db.load_player_stats(&id).map(Json).map_err(internal)
}

/// GET /api/games/:id/zones
async fn get_zones(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<PlayerZoneStats>> {
    state.db.load_zone_stats(&id).map(Json).map_err(internal)
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    pub limit: Option<usize>,
    pub kind: Option<String>,
    pub severity: Option<String>,
}

impl InsightsQuery {
    fn to_filter(&self) -> Result<InsightFilter, (StatusCode, String)> {
        let kind = match self.kind.as_deref() {
            None | Some("") => None,
            Some(k) => Some(
                InsightKind::parse(k).ok_or_else(|| bad_request(format!("unknown insight kind `{k}`")))?,
            ),
        };
        let severity = match self.severity.as_deref() {
            None | Some("") => None,
            Some(s) => Some(
                Severity::parse(s).ok_or_else(|| bad_request(format!("unknown severity `{s}`")))?,
            ),
        };
        Ok(InsightFilter {
            kind,
            severity,
            limit: Some(self.limit.unwrap_or(DEFAULT_INSIGHT_LIMIT).min(MAX_INSIGHT_LIMIT)),
        })
    }
}

/// GET /api/games/:id/insights, newest first.
async fn get_insights(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<InsightsQuery>,
) -> ApiResult<Vec<Insight>> {
    let filter = query.to_filter()?;
    state.db.load_insights(&id, &filter).map(Json).map_err(internal)
}
