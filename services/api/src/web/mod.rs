//! services/api/src/web/mod.rs
//!
//! The HTTP surface: handlers, shared state and the router that ties them together.

pub mod chat;
pub mod middleware;
pub mod resume;
pub mod rest;
pub mod state;
pub mod topic_content;

pub use middleware::require_user;
pub use state::{AppState, LlmBackends};

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

/// Builds the application router. Everything under `/api` requires the `x-user-id` header.
pub fn router(state: Arc<AppState>) -> Router {
    let roadmap_routes = Router::new()
        .route("/generate", post(rest::generate_roadmap_handler))
        .route("/save", post(rest::save_roadmap_handler))
        .route("/build", post(rest::build_roadmap_handler))
        .route("/journeys", get(rest::list_journeys_handler))
        .route("/{journey_id}", get(rest::get_journey_handler))
        .route(
            "/{journey_id}/topic/{topic_id}",
            patch(rest::update_topic_handler),
        )
        .route(
            "/{journey_id}/visit/{day_number}",
            put(rest::visit_day_handler),
        );

    let topic_content_routes = Router::new()
        .route(
            "/generate-initial/{journey_id}",
            post(topic_content::generate_initial_handler),
        )
        .route(
            "/topic/{topic_id}",
            get(topic_content::get_topic_content_handler),
        )
        .route("/status/{journey_id}", get(topic_content::status_handler));

    let ai_routes = Router::new()
        .route("/chat", post(chat::chat_handler))
        .route("/simplify", post(chat::simplify_handler));

    let resume_routes = Router::new()
        .route("/parse", post(resume::parse_resume_handler))
        .layer(DefaultBodyLimit::max(resume::RESUME_BODY_LIMIT));

    // Protected routes (caller id required)
    let protected_routes = Router::new()
        .nest("/api/roadmap", roadmap_routes)
        .nest("/api/topic-content", topic_content_routes)
        .nest("/api/ai", ai_routes)
        .nest("/api/resume-parser", resume_routes)
        .layer(axum_middleware::from_fn(require_user));

    Router::new()
        .route("/health", get(rest::health_handler))
        .merge(protected_routes)
        .with_state(state)
}
