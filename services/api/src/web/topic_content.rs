//! services/api/src/web/topic_content.rs
//!
//! Handlers for topic content: the initial Day 1 burst with background queueing,
//! the on-demand read path and the per-journey generation status.

use crate::error::{ApiError, ErrorBody};
use crate::web::rest::QueueStatusView;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
    Extension,
};
use roadmap_core::domain::GenerationStatus;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitialContentResponse {
    pub journey_id: Uuid,
    pub day_one_generated: Vec<Uuid>,
    pub day_one_failed: Vec<Uuid>,
    pub queued: usize,
    pub generation_queue: QueueStatusView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicContentResponse {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub generated_now: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatusView {
    pub journey_id: Uuid,
    pub total_topics: usize,
    pub generated_topics: usize,
    pub percent_complete: u32,
    pub is_complete: bool,
}

impl From<GenerationStatus> for GenerationStatusView {
    fn from(s: GenerationStatus) -> Self {
        Self {
            journey_id: s.journey_id,
            total_topics: s.total_topics,
            generated_topics: s.generated_topics,
            percent_complete: s.percent_complete,
            is_complete: s.is_complete,
        }
    }
}

/// Generate Day 1 content now and queue every later day in the background.
#[utoipa::path(
    post,
    path = "/api/topic-content/generate-initial/{journey_id}",
    responses(
        (status = 200, description = "Day 1 is ready; later days are queued", body = InitialContentResponse),
        (status = 404, description = "Journey not found or has no days", body = ErrorBody),
        (status = 500, description = "Every Day 1 topic failed", body = ErrorBody)
    ),
    params(
        ("journey_id" = Uuid, Path, description = "Journey id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_initial_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(journey_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_journey(user_id, journey_id).await?;
    let report = state.initial_content.generate_initial(journey_id).await?;
    info!(
        "Initial content for journey {}: {} generated, {} failed, {} queued.",
        journey_id,
        report.day_one_generated.len(),
        report.day_one_failed.len(),
        report.queued
    );
    Ok(Json(InitialContentResponse {
        journey_id,
        day_one_generated: report.day_one_generated,
        day_one_failed: report.day_one_failed,
        queued: report.queued,
        generation_queue: state.queue.snapshot().into(),
    }))
}

/// Read a topic's content, generating it first if the queue has not reached it yet.
#[utoipa::path(
    get,
    path = "/api/topic-content/topic/{topic_id}",
    responses(
        (status = 200, description = "Topic content", body = TopicContentResponse),
        (status = 404, description = "No such topic", body = ErrorBody)
    ),
    params(
        ("topic_id" = Uuid, Path, description = "Topic id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_topic_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(topic_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.repo.get_topic_context(topic_id).await?;
    state.owned_journey(user_id, ctx.journey_id).await?;
    let view = state.topic_content.get_or_generate(topic_id).await?;
    Ok(Json(TopicContentResponse {
        id: view.id,
        name: view.name,
        content: view.content,
        generated_now: view.generated_now,
    }))
}

#[utoipa::path(
    get,
    path = "/api/topic-content/status/{journey_id}",
    responses(
        (status = 200, description = "Content generation progress", body = GenerationStatusView),
        (status = 404, description = "No such journey", body = ErrorBody)
    ),
    params(
        ("journey_id" = Uuid, Path, description = "Journey id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(journey_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_journey(user_id, journey_id).await?;
    let status = state.topic_content.status(journey_id).await?;
    Ok(Json(GenerationStatusView::from(status)))
}
