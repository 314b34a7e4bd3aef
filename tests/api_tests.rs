use axum::body::Body;
use axum::http::{Request, StatusCode};
use cdn_player::cache::{AssetCacheManager, ReqwestFetcher};
use cdn_player::catalog::{Catalog, Track};
use cdn_player::config::CacheConfig;
use cdn_player::server::{AppState, create_router, start_audio_cache};
use cdn_player::stats::StatsDatabase;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn app(dir: &tempfile::TempDir) -> axum::Router {
    let stats_db = StatsDatabase::new(&dir.path().join("stats.db")).await.unwrap();
    let catalog = Catalog::new(vec![
        Track::new("s0", "First", "A").with_sources(["https://cdn1/a.mp3", "https://cdn2/a.mp3"]),
        Track::new("s1", "Second", "B").with_sources(["http://127.0.0.1:9/none.mp3"]),
    ]);
    let config = CacheConfig {
        manifest_url: "http://127.0.0.1:9/music.yml".to_string(),
        ..CacheConfig::default()
    };
    let fetcher = ReqwestFetcher::new(Duration::from_secs(2)).unwrap();
    let audio_cache = start_audio_cache(AssetCacheManager::new(config, Arc::new(fetcher))).await;

    create_router(
        AppState {
            stats_db,
            catalog,
            audio_cache,
        },
        dir.path(),
    )
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/track")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_record_play_and_read_stats() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir).await;

    for user in ["u1", "u1", "u2"] {
        let body = format!(r#"{{"user_id":"{}","song_id":"s0","title":"First"}}"#, user);
        let response = app.clone().oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }

    let response = app
        .clone()
        .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "s0": 3 }));
}

#[tokio::test]
async fn test_record_play_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir).await;

    let response = app
        .clone()
        .oneshot(post_json(r#"{"user_id":"u1","song_id":"s0"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Missing required fields: user_id, song_id, or title."
    );

    let response = app.clone().oneshot(post_json("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir).await;

    let response = app
        .oneshot(Request::get("/api/track").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_catalog_lists_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir).await;

    let response = app
        .oneshot(Request::get("/api/catalog").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body[0]["id"], "s0");
    assert_eq!(body[0]["sources"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unreachable_audio_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir).await;

    let response = app
        .oneshot(
            Request::get("/audio?src=http://127.0.0.1:9/none.mp3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_audio_outside_catalog_is_not_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir).await;

    let response = app
        .oneshot(
            Request::get("/audio?src=http://169.254.169.254/latest/meta-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "Unknown audio source");
}
