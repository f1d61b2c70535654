//! HTTP surface for the role-play backend.
//!
//! # Endpoints
//!
//! - `GET  /api/health` — Liveness probe
//! - `GET  /api/voices` — Voice catalogue
//! - `POST /api/chat`   — Persona-augmented chat completion
//! - `POST /api/tts`    — Expressive speech synthesis with text fallback

pub mod routes;

pub use routes::{app_router, AppState};
