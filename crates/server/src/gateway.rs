//! HTTP endpoints
//!
//! Validates input, applies the per-client QPS ceiling, forwards to the
//! pipeline runner, and translates boundary errors into stable status codes:
//! 400 invalid body, 408 timeout, 429 rate limited, 503 no backend with
//! fallback disabled, 500 anything unexpected.

use axum::{
    extract::{ConnectInfo, Json, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use podwise_core::{Category, Episode, Error, Query, Response, ResponseSource};

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors = if state.settings.server.cors_enabled {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/query", post(handle_query))
        .route("/recommendations", get(handle_recommendations))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/admin/reload-vocabulary", post(handle_reload_vocabulary))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Gateway error with a stable status mapping
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Input(_) => StatusCode::BAD_REQUEST,
            Error::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Invariant(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> AxumResponse {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    text: String,
    user_id: Option<String>,
    session_id: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecommendationDto {
    episode_id: String,
    podcast_name: String,
    episode_title: String,
    audio_uri: String,
    image_uri: String,
}

impl From<&Episode> for RecommendationDto {
    fn from(episode: &Episode) -> Self {
        Self {
            episode_id: episode.episode_id.clone(),
            podcast_name: episode.podcast_name.clone(),
            episode_title: episode.title.clone(),
            audio_uri: episode.audio_uri.clone(),
            image_uri: episode.image_uri.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    answer: String,
    recommendations: Vec<RecommendationDto>,
    confidence: f32,
    source: ResponseSource,
    trace_id: String,
}

impl From<Response> for QueryResponse {
    fn from(response: Response) -> Self {
        Self {
            answer: response.answer_text,
            recommendations: response.recommendations.iter().map(Into::into).collect(),
            confidence: response.confidence,
            source: response.source,
            trace_id: response.trace_id,
        }
    }
}

fn valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 64
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// POST /query
async fn handle_query(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    // Rate limit before any validation work
    let client_key = request
        .user_id
        .clone()
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string());
    if !state.rate_limiter.allow(&client_key) {
        return Err(Error::ResourceExhausted(format!("qps ceiling for {}", client_key)).into());
    }

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }
    if text.chars().count() > state.settings.server.max_query_len {
        return Err(ApiError::bad_request(format!(
            "text exceeds {} characters",
            state.settings.server.max_query_len
        )));
    }
    if let Some(ref user_id) = request.user_id {
        if !valid_user_id(user_id) {
            return Err(ApiError::bad_request("invalid user_id"));
        }
    }

    let trace_id = Uuid::new_v4().to_string();
    let mut query = Query::new(trace_id, text);
    if let Some(user_id) = request.user_id {
        query = query.with_user(user_id);
    }
    if let Some(lang) = request.lang {
        query = query.with_lang(lang);
    }
    query.session_id = request.session_id;

    let report = state.runner.run(query).await?;
    Ok(Json(report.response.into()))
}

#[derive(Debug, Deserialize)]
struct RecommendationsParams {
    user_id: String,
    category: Option<String>,
    top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ScoredRecommendationDto {
    #[serde(flatten)]
    episode: RecommendationDto,
    score: f32,
}

/// GET /recommendations - direct CF results, skipping retrieval
async fn handle_recommendations(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<RecommendationsParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !valid_user_id(&params.user_id) {
        return Err(ApiError::bad_request("invalid user_id"));
    }
    let top_k = params.top_k.unwrap_or(3).clamp(1, 20);

    let candidate_ids = match params.category.as_deref() {
        Some(raw) => {
            state
                .episodes
                .episode_ids_in_category(Category::parse(raw))
                .await?
        }
        None => {
            let mut all = Vec::new();
            for category in Category::ALL {
                all.extend(state.episodes.episode_ids_in_category(category).await?);
            }
            all
        }
    };

    let model = state.recommender.current();
    let ranked = model.recommend(&params.user_id, &candidate_ids, top_k);

    let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
    let episodes = state.episodes.get_episodes_by_ids(&ids).await?;

    let scored: Vec<ScoredRecommendationDto> = ranked
        .iter()
        .filter_map(|(id, score)| {
            episodes
                .iter()
                .find(|e| &e.episode_id == id)
                .map(|episode| ScoredRecommendationDto {
                    episode: episode.into(),
                    score: *score,
                })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "user_id": params.user_id,
        "recommendations": scored,
    })))
}

/// GET /health
async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (status, components) = state.health.check().await;
    Json(serde_json::json!({
        "status": status.as_str(),
        "components": components,
    }))
}

/// GET /metrics
async fn handle_metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics {
        Some(handle) => Ok(handle.render()),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /admin/reload-vocabulary
///
/// Atomic swap; a malformed file leaves the running vocabulary untouched.
async fn handle_reload_vocabulary(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = &state.settings.tags.vocabulary_path;
    match state.vocabulary.reload_from(path) {
        Ok(tags) => Ok(Json(serde_json::json!({ "reloaded": true, "tags": tags }))),
        Err(e) => Err(ApiError::bad_request(format!("vocabulary reload failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_validation() {
        assert!(valid_user_id("u1"));
        assert!(valid_user_id("user_name-42"));
        assert!(!valid_user_id(""));
        assert!(!valid_user_id("has space"));
        assert!(!valid_user_id(&"x".repeat(65)));
    }
}
