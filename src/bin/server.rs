//! Role-play voice backend HTTP server.
//!
//! # Environment Variables
//!
//! - `QINIU_AI_API_KEY` — Provider API key (required)
//! - `OPENAI_BASE_URL` — OpenAI-compatible API root (default: https://openai.qiniu.com/v1)
//! - `LLM_MODEL` / `TTS_MODEL` — Model names (default: gpt-3.5-turbo / tts-1)
//! - `PORT` — HTTP port (default: 3000)
//! - `RETENTION_BUDGET` — History token budget (default: 3000)
//! - `RNG_SEED` — Fixed seed for reproducible output
//! - `RUST_LOG` — Tracing filter (default: "info,roleplay_voice=debug")
//!
//! A `.env` file in the working directory is loaded first if present.

use std::sync::Arc;

use anyhow::Context;
use roleplay_voice::config::AppConfig;
use roleplay_voice::dialogue::Orchestrator;
use roleplay_voice::providers::{GenerationParams, OpenAiChatClient, OpenAiSpeechClient};
use roleplay_voice::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,roleplay_voice=debug".into()),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let chat = OpenAiChatClient::new(&config.base_url, config.api_key.clone())
        .context("failed to build chat client")?;
    let speech = OpenAiSpeechClient::new(&config.base_url, config.api_key.clone(), &config.tts_model)
        .context("failed to build tts client")?;

    let mut orchestrator = Orchestrator::new(
        Arc::new(chat),
        Arc::new(speech),
        GenerationParams::new(&config.llm_model),
        config.retention_budget,
    );
    if let Some(seed) = config.rng_seed {
        tracing::info!(seed, "using fixed rng seed");
        orchestrator = orchestrator.with_seed(seed);
    }

    let state = AppState::new(orchestrator, &config.llm_model, &config.tts_model);
    let app = app_router(state);

    let bind_addr = config.bind_addr();
    tracing::info!("roleplay-voice server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /api/health — liveness probe");
    tracing::info!("  GET  /api/voices — voice catalogue");
    tracing::info!("  POST /api/chat   — persona chat");
    tracing::info!("  POST /api/tts    — expressive speech");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
