use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::{AssetCacheManager, AssetRequest, FetchOutcome};
use crate::catalog::{Catalog, Track};
use crate::stats::StatsDatabase;

#[derive(Clone)]
pub struct AppState {
    pub stats_db: StatsDatabase,
    pub catalog: Catalog,
    pub audio_cache: AssetCacheManager,
}

pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    let static_service = ServeDir::new(static_dir);

    Router::new()
        .route("/api", get(root))
        .route("/api/track", post(record_play))
        .route("/api/stats", get(global_stats))
        .route("/api/catalog", get(list_catalog))
        .route("/audio", get(stream_audio))
        .fallback_service(static_service)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

/// Root endpoint
async fn root() -> &'static str {
    "CDN Player API v0.1.0"
}

#[derive(Debug, Deserialize)]
struct PlayLogRequest {
    user_id: Option<String>,
    song_id: Option<String>,
    title: Option<String>,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

/// Record one play of a song by a user
async fn record_play(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: PlayLogRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Rejecting play log body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid JSON body" })),
        )
    })?;

    let (Some(user_id), Some(song_id), Some(title)) = (
        required(request.user_id),
        required(request.song_id),
        required(request.title),
    ) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required fields: user_id, song_id, or title." })),
        ));
    };

    tracing::debug!("Recording play of {} by {}", song_id, user_id);

    let plays = state
        .stats_db
        .record_play(&user_id, &song_id, &title)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record play: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Internal Server Error" })),
            )
        })?;

    tracing::debug!("{} has now played {} {} times", user_id, song_id, plays);
    Ok(Json(json!({ "success": true, "message": "Play log recorded." })))
}

/// Total plays per song across all users
async fn global_stats(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, u64>>, ApiError> {
    let counts = state.stats_db.global_play_counts().await.map_err(|e| {
        tracing::error!("Error fetching global stats: {:#}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Error fetching global stats", "details": e.to_string() })),
        )
    })?;

    tracing::debug!("Returning stats for {} songs", counts.len());
    Ok(Json(counts))
}

/// List all catalog tracks
async fn list_catalog(State(state): State<AppState>) -> Json<Vec<Track>> {
    let tracks = state
        .catalog
        .tracks()
        .iter()
        .map(|t| t.as_ref().clone())
        .collect();
    Json(tracks)
}

#[derive(Debug, Deserialize)]
struct AudioQuery {
    src: String,
}

/// Audio through the asset cache
async fn stream_audio(
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
) -> Result<Response, ApiError> {
    tracing::debug!("Audio request for {}", query.src);

    let known = state.catalog.contains_source(&query.src)
        || state.audio_cache.is_listed(&query.src).await;
    if !known {
        tracing::warn!("Refusing audio request for unlisted source {}", query.src);
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Unknown audio source" })),
        ));
    }

    match state
        .audio_cache
        .handle_fetch(&AssetRequest::audio(query.src.as_str()))
        .await
    {
        FetchOutcome::Response(asset) => {
            let status = StatusCode::from_u16(asset.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let content_type = asset
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string());
            Ok((status, [(header::CONTENT_TYPE, content_type)], asset.body).into_response())
        }
        FetchOutcome::Missing => {
            tracing::warn!("Audio unavailable: {}", query.src);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Audio source unavailable" })),
            ))
        }
        FetchOutcome::Passthrough => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Audio cache not active yet" })),
        )),
    }
}

/// Install the audio cache and start intercepting
pub async fn start_audio_cache(cache: AssetCacheManager) -> AssetCacheManager {
    let partition = cache.install().await;
    let removed = cache.activate().await;
    tracing::info!("Audio cache ready ({}), {} stale partitions dropped", partition, removed);
    cache
}
