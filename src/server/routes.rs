//! Axum route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::dialogue::{ChatRequest, Orchestrator, SpeechOutcome, SpeechRequest};
use crate::error::DialogueError;
use crate::providers::available_voices;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Model names reported by the health probe.
    pub llm_model: String,
    pub tts_model: String,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        llm_model: impl Into<String>,
        tts_model: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            llm_model: llm_model.into(),
            tts_model: tts_model.into(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(err: DialogueError) -> ApiError {
    (err.status(), Json(err.to_body()))
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/voices", get(voices_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/tts", post(tts_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/health
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": crate::VERSION,
        "services": {
            "llm": state.llm_model,
            "tts": state.tts_model,
        },
    }))
}

/// GET /api/voices
async fn voices_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "data": available_voices(),
    }))
}

/// POST /api/chat
///
/// Request: `{ "messages": [Turn], "persona": "bard", "flow_hint"?, "temperature"?, "max_tokens"? }`
/// Response: `{ "message": Turn, "augmentation": {...} }`
async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected chat payload");
        api_error(DialogueError::InvalidMessages)
    })?;

    let request_id = Uuid::new_v4();
    tracing::info!(
        %request_id,
        persona = %request.persona,
        turns = request.turns.len(),
        "chat request"
    );

    let reply = state.orchestrator.chat(request).await.map_err(|e| {
        tracing::error!(%request_id, code = e.code(), error = %e, "chat request failed");
        api_error(e)
    })?;

    Ok(Json(serde_json::json!({
        "id": request_id,
        "message": reply.message,
        "augmentation": reply.augmentation,
    })))
}

/// POST /api/tts
///
/// Request: `{ "text": "...", "persona": "commander", "tts_config"?: { voice, speed, volume, pitch } }`
///
/// Responds with `audio/mpeg` bytes, or `{ "fallback": true, "text": ... }`
/// when synthesis failed.
async fn tts_handler(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected tts payload");
        api_error(DialogueError::MissingText)
    })?;

    let outcome = state.orchestrator.speak(request).await.map_err(api_error)?;

    let response = match outcome {
        SpeechOutcome::Audio { audio, voice, speed } => {
            let mut response = (
                [(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"))],
                Bytes::from(audio),
            )
                .into_response();
            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&voice) {
                headers.insert("x-tts-voice", v);
            }
            if let Ok(v) = HeaderValue::from_str(&speed.to_string()) {
                headers.insert("x-tts-speed", v);
            }
            response
        }
        SpeechOutcome::Fallback { text } => Json(serde_json::json!({
            "fallback": true,
            "text": text,
        }))
        .into_response(),
    };
    Ok(response)
}
