use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use cdn_player::catalog::Track;
use cdn_player::clock::SystemClock;
use cdn_player::engine::{FailedUrlRegistry, FallbackEngine, PlayerStatus, SessionCell};
use cdn_player::resolver::{HttpSourceSurface, resolve_track};
use cdn_player::storage::{JsonFileStore, KeyValueStore, StorageKey};
use std::sync::Arc;

async fn spawn_origin() -> String {
    let app = Router::new()
        .route("/ok.mp3", get(|| async { (StatusCode::PARTIAL_CONTENT, "ID") }))
        .route("/broken.mp3", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn engine(state: &std::path::Path) -> FallbackEngine<HttpSourceSurface> {
    let store = JsonFileStore::open(state).unwrap();
    FallbackEngine::new(
        HttpSourceSurface::new(reqwest::Client::new()),
        SessionCell::new(),
        FailedUrlRegistry::new(Box::new(store), chrono::Duration::hours(1)),
        Arc::new(SystemClock),
    )
}

#[tokio::test]
async fn test_resolve_falls_back_past_broken_sources() {
    let origin = spawn_origin().await;
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("local_storage.json");
    let mut engine = engine(&state);

    let broken = format!("{}/broken.mp3", origin);
    let missing = format!("{}/missing.mp3", origin);
    let ok = format!("{}/ok.mp3", origin);
    let track = Arc::new(
        Track::new("s0", "Song", "Artist").with_sources([broken.clone(), missing.clone(), ok.clone()]),
    );

    let resolved = resolve_track(&mut engine, track).await;
    assert_eq!(resolved.as_deref(), Some(ok.as_str()));
    assert_eq!(engine.status(), &PlayerStatus::Playing { title: "Song".to_string() });

    // Failures are persisted for the next run
    let stored = JsonFileStore::open(&state).unwrap();
    let raw = stored.get(StorageKey::FAILED_URLS).unwrap();
    assert!(raw.contains(&broken));
    assert!(raw.contains(&missing));
}

#[tokio::test]
async fn test_resolve_reports_exhaustion() {
    let origin = spawn_origin().await;
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(&dir.path().join("local_storage.json"));

    let track = Arc::new(
        Track::new("s1", "Gone", "Artist").with_sources([format!("{}/broken.mp3", origin)]),
    );

    assert!(resolve_track(&mut engine, track.clone()).await.is_none());
    assert!(matches!(engine.status(), PlayerStatus::Exhausted { .. }));

    assert_eq!(engine.surface().requests(), 1);

    // Second run skips the known-bad source without touching the network
    assert!(resolve_track(&mut engine, track).await.is_none());
    assert_eq!(engine.surface().requests(), 1);
}
