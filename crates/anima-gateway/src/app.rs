use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use anima_agent::Orchestrator;
use anima_core::AnimaConfig;
use anima_cron::CronHandle;
use anima_store::Store;

/// Shared state for every HTTP handler.
pub struct AppState {
    pub config: AnimaConfig,
    pub store: Arc<Store>,
    pub orchestrator: Arc<Orchestrator>,
    pub cron: CronHandle,
}

/// Assemble the full axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route("/core-memory", get(crate::http::memory::get_core_memory))
        .route(
            "/core-memory/{block_type}",
            post(crate::http::memory::update_core_memory),
        )
        .route("/messages", get(crate::http::messages::list_messages))
        .route(
            "/cron/jobs",
            get(crate::http::cron::list_jobs).post(crate::http::cron::create_job),
        )
        .route(
            "/cron/jobs/{id}",
            get(crate::http::cron::get_job)
                .put(crate::http::cron::update_job)
                .delete(crate::http::cron::delete_job),
        )
        .route("/cron/jobs/{id}/pause", post(crate::http::cron::pause_job))
        .route("/cron/jobs/{id}/resume", post(crate::http::cron::resume_job))
        .route("/cron/jobs/{id}/clone", post(crate::http::cron::clone_job))
        .route("/cron/timezones", get(crate::http::cron::list_timezones))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
}

/// The local dashboard plus any configured extra origins.
fn cors_layer(config: &AnimaConfig) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = vec![
        HeaderValue::from_static("http://localhost:5173"),
        HeaderValue::from_static("http://127.0.0.1:5173"),
    ];
    for origin in &config.gateway.cors_origins {
        match origin.parse() {
            Ok(value) => origins.push(value),
            Err(_) => warn!(origin, "ignoring invalid CORS origin"),
        }
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
