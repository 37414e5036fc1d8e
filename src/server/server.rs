use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::metrics::{metrics_handler, record_suggestion_request};
use super::{log_requests, state::*, ServerConfig};
use crate::auth::DEFAULT_TOKEN_TTL;
use crate::catalog::TrackId;
use crate::engine::{RecommendationError, SuggestionRequest, TargetSource, MAX_SEEDS};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub logged_in: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Commands accepted by `POST /api`, discriminated by their `type` field.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ApiCommand {
    GetSuggestions(GetSuggestionsBody),
    GetPlaying,
    LabelPlaying(LabelPlayingBody),
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetSuggestionsBody {
    pub seeds: Option<Vec<TrackId>>,
    pub target_index: Option<usize>,
    pub radio_name: Option<String>,
    pub unique_level: Option<usize>,
    pub blacklist: Option<Vec<TrackId>>,
    pub label: Option<i64>,
    pub default_radio: Option<bool>,
    pub count: Option<usize>,
}

#[derive(Deserialize, Debug)]
pub struct LabelPlayingBody {
    pub label: i64,
}

/// Envelope of every `POST /api` response.
#[derive(Serialize, Debug)]
pub struct ApiResponse {
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    fn error(err: &RecommendationError) -> Self {
        ApiResponse {
            message: err.user_message(),
            data: None,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PutTokenBody {
    pub access_token: String,
    pub expires_in_sec: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionsData {
    tracks: Vec<TrackId>,
    requested: usize,
    playlist_id: Option<String>,
    playlist_name: String,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: state.version.clone(),
        logged_in: state.tokens.access_token().is_some(),
    };
    Json(stats)
}

async fn put_token(
    State(tokens): State<GuardedTokenProvider>,
    Json(body): Json<PutTokenBody>,
) -> Response {
    let token = body.access_token.trim();
    if token.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let ttl = body
        .expires_in_sec
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_TTL);
    tokens.store(token.to_string(), ttl);
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_token(State(tokens): State<GuardedTokenProvider>) -> Response {
    tokens.clear();
    info!("Access token cleared");
    StatusCode::NO_CONTENT.into_response()
}

/// Converts the wire body into a validated engine request.
fn build_suggestion_request(
    config: &ServerConfig,
    body: GetSuggestionsBody,
) -> Result<SuggestionRequest, RecommendationError> {
    let seeds = body.seeds.unwrap_or_default();
    if seeds.len() > MAX_SEEDS {
        return Err(RecommendationError::MalformedRequest(format!(
            "at most {} seeds are allowed",
            MAX_SEEDS
        )));
    }

    let target = match body.target_index {
        Some(index) => TargetSource::Fixed(seeds.get(index).cloned().ok_or_else(|| {
            RecommendationError::MalformedRequest(format!(
                "targetIndex {} is out of range for {} seeds",
                index,
                seeds.len()
            ))
        })?),
        None => TargetSource::PerSeed,
    };

    let count = body.count.unwrap_or(config.default_suggestion_count);
    if count == 0 || count > config.max_suggestion_count {
        return Err(RecommendationError::MalformedRequest(format!(
            "count must be between 1 and {}",
            config.max_suggestion_count
        )));
    }
    Ok(SuggestionRequest {
        seeds,
        target,
        unique_level: body.unique_level,
        blacklist: body.blacklist.unwrap_or_default().into_iter().collect::<HashSet<_>>(),
        label: body.label,
        classifier_assisted: !body.default_radio.unwrap_or(false),
        count,
    })
}

async fn resolve_get_suggestions(state: &ServerState, body: GetSuggestionsBody) -> ApiResponse {
    let radio_name = body.radio_name.clone();
    let request = match build_suggestion_request(&state.config, body) {
        Ok(request) => request,
        Err(err) => {
            record_suggestion_request(err.as_str(), 0);
            return ApiResponse::error(&err);
        }
    };

    let cancel = state.shutdown.child_token();
    match state.radio.poll_suggestions(request, radio_name, &cancel).await {
        Ok(outcome) => {
            let ids = outcome.suggestions.track_ids();
            let listing = format!("Suggested tracks: {}", ids.join("\n"));
            if let Some(shortfall) = outcome.suggestions.shortfall() {
                warn!("{}", shortfall);
                record_suggestion_request(shortfall.as_str(), ids.len());
                return ApiResponse {
                    message: format!("{}\n{}", shortfall.user_message(), listing),
                    data: None,
                };
            }
            record_suggestion_request("complete", ids.len());
            let data = SuggestionsData {
                tracks: ids,
                requested: outcome.suggestions.requested,
                playlist_id: outcome.playlist_id,
                playlist_name: outcome.playlist_name,
            };
            ApiResponse {
                message: listing,
                data: serde_json::to_value(data).ok(),
            }
        }
        Err(err) => {
            warn!("Suggestion request failed: {}", err);
            record_suggestion_request(err.as_str(), 0);
            ApiResponse::error(&err)
        }
    }
}

async fn resolve_get_playing(state: &ServerState) -> ApiResponse {
    match state.radio.current_track().await {
        Ok(track) => ApiResponse {
            message: format!("Currently playing: {}", track),
            data: Some(json!({ "trackId": track })),
        },
        Err(err) => ApiResponse::error(&err),
    }
}

async fn resolve_label_playing(state: &ServerState, body: LabelPlayingBody) -> ApiResponse {
    match state.radio.label_current_track(body.label).await {
        Ok(track) => ApiResponse {
            message: format!("Labelled {} as {}", track, body.label),
            data: Some(json!({ "trackId": track, "label": body.label })),
        },
        Err(err) => ApiResponse::error(&err),
    }
}

/// Dispatches `POST /api`. Every outcome, including a body that does not
/// parse, is reported with status 200 in the `{message, data}` envelope.
async fn post_api(
    State(state): State<ServerState>,
    payload: Result<Json<ApiCommand>, JsonRejection>,
) -> Json<ApiResponse> {
    let command = match payload {
        Ok(Json(command)) => command,
        Err(rejection) => {
            debug!("Rejected API payload: {}", rejection.body_text());
            let err = RecommendationError::MalformedRequest(rejection.body_text());
            return Json(ApiResponse::error(&err));
        }
    };

    let response = match command {
        ApiCommand::GetSuggestions(body) => resolve_get_suggestions(&state, body).await,
        ApiCommand::GetPlaying => resolve_get_playing(&state).await,
        ApiCommand::LabelPlaying(body) => resolve_label_playing(&state, body).await,
    };
    Json(response)
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .route("/api", post(post_api))
        .route("/auth/token", put(put_token).delete(delete_token))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone());

    home_router
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let shutdown = state.shutdown.clone();
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
