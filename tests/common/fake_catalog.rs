//! In-process fake of the music catalog and classifier services
//!
//! Serves the [`CatalogFixture`] over the same HTTP surface the real
//! clients talk to and records every call so tests can inspect them.

use super::constants::*;
use super::fixtures::CatalogFixture;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Calls observed by the fake catalog.
#[derive(Default)]
pub struct CatalogCalls {
    /// `seed_tracks` of every recommendations call, in order.
    pub recommendations: Vec<String>,
    pub player: usize,
    pub me: usize,
    /// Names of created playlists.
    pub playlists: Vec<String>,
    /// `(playlist id, uris, position)` of every append.
    pub appended: Vec<(String, Vec<String>, usize)>,
    /// `(track id, label)` of every labelled example.
    pub labels: Vec<(String, i64)>,
    /// `context_uri` of every playback start.
    pub played: Vec<String>,
}

#[derive(Clone)]
struct FakeState {
    fixture: Arc<CatalogFixture>,
    calls: Arc<Mutex<CatalogCalls>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TEST_TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
    )
        .into_response()
}

async fn recommendations(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let seeds = params.get("seed_tracks").cloned().unwrap_or_default();
    state.calls.lock().unwrap().recommendations.push(seeds.clone());

    let tracks = state
        .fixture
        .pool(&seeds)
        .iter()
        .map(|id| json!({"id": id, "uri": format!("spotify:track:{}", id)}))
        .collect::<Vec<_>>();
    Json(json!({ "tracks": tracks })).into_response()
}

async fn audio_features(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let ids = params.get("ids").cloned().unwrap_or_default();
    let records = ids
        .split(',')
        .map(|id| state.fixture.features.get(id).cloned().unwrap_or(Value::Null))
        .collect::<Vec<_>>();
    Json(json!({ "audio_features": records })).into_response()
}

async fn player(State(state): State<FakeState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.calls.lock().unwrap().player += 1;
    match &state.fixture.active_item {
        Some(id) => Json(json!({"is_playing": true, "item": {"id": id}})).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn me(State(state): State<FakeState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.calls.lock().unwrap().me += 1;
    Json(json!({ "id": TEST_USER_ID })).into_response()
}

async fn create_playlist(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if user_id != TEST_USER_ID {
        return StatusCode::FORBIDDEN.into_response();
    }
    let mut calls = state.calls.lock().unwrap();
    calls
        .playlists
        .push(body["name"].as_str().unwrap_or_default().to_string());
    let id = format!("playlist-{}", calls.playlists.len());
    (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
}

async fn append_tracks(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(playlist_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let uris = body["uris"]
        .as_array()
        .map(|uris| {
            uris.iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let position = body["position"].as_u64().unwrap_or_default() as usize;
    state
        .calls
        .lock()
        .unwrap()
        .appended
        .push((playlist_id, uris, position));
    (StatusCode::CREATED, Json(json!({"snapshot_id": "snap"}))).into_response()
}

async fn start_playback(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let context_uri = body["context_uri"].as_str().unwrap_or_default().to_string();
    state.calls.lock().unwrap().played.push(context_uri);
    StatusCode::NO_CONTENT.into_response()
}

/// Keeps tracks whose danceability reaches `label / 10`, most danceable first.
async fn classify(Json(body): Json<Value>) -> Json<Value> {
    let threshold = body["label"].as_i64().unwrap_or_default() as f64 / 10.0;
    let mut kept = body["tracks"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|t| t["danceability"].as_f64().unwrap_or_default() >= threshold)
        .collect::<Vec<_>>();
    kept.sort_by(|a, b| {
        let a = a["danceability"].as_f64().unwrap_or_default();
        let b = b["danceability"].as_f64().unwrap_or_default();
        b.total_cmp(&a)
    });
    let ranked = kept.iter().map(|t| t["id"].clone()).collect::<Vec<_>>();
    Json(json!({ "ranked": ranked }))
}

async fn label(State(state): State<FakeState>, Json(body): Json<Value>) -> StatusCode {
    let id = body["track"]["id"].as_str().unwrap_or_default().to_string();
    let label = body["label"].as_i64().unwrap_or_default();
    state.calls.lock().unwrap().labels.push((id, label));
    StatusCode::NO_CONTENT
}

/// A running fake catalog. Shuts down when dropped.
pub struct FakeCatalog {
    /// Base URL of the catalog API
    pub base_url: String,
    /// Base URL of the classifier API
    pub classifier_url: String,
    calls: Arc<Mutex<CatalogCalls>>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeCatalog {
    pub async fn spawn(fixture: CatalogFixture) -> Self {
        let calls = Arc::new(Mutex::new(CatalogCalls::default()));
        let state = FakeState {
            fixture: Arc::new(fixture),
            calls: calls.clone(),
        };

        let app = Router::new()
            .route("/recommendations", get(recommendations))
            .route("/audio-features", get(audio_features))
            .route("/me", get(me))
            .route("/me/player", get(player))
            .route("/me/player/play", put(start_playback))
            .route("/users/{user_id}/playlists", post(create_playlist))
            .route("/playlists/{playlist_id}/tracks", post(append_tracks))
            .route("/classifier/classify", post(classify))
            .route("/classifier/label", post(label))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake catalog");
        let addr = listener.local_addr().expect("Failed to get local address");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake catalog failed");
        });

        Self {
            base_url: format!("http://{}", addr),
            classifier_url: format!("http://{}/classifier", addr),
            calls,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Runs `f` with the calls observed so far.
    pub fn inspect<R>(&self, f: impl FnOnce(&CatalogCalls) -> R) -> R {
        f(&self.calls.lock().unwrap())
    }
}

impl Drop for FakeCatalog {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
