//! services/api/src/web/chat.rs
//!
//! Handlers for the study assistant.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Json},
    Extension,
};
use roadmap_core::chat::ChatRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    /// Omit to start a new session.
    #[serde(default)]
    pub session_id: Option<String>,
    pub journey_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub current_topic_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SimplifyBody {
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct SimplifyResponse {
    pub simplified: String,
}

/// Ask the assistant a question in the context of a journey.
#[utoipa::path(
    post,
    path = "/api/ai/chat",
    request_body = ChatBody,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Empty message", body = ErrorBody),
        (status = 401, description = "Journey belongs to another user", body = ErrorBody)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<ChatBody>,
) -> Result<impl IntoResponse, ApiError> {
    let reply = state
        .chat
        .send(
            user_id,
            ChatRequest {
                session_id: body.session_id,
                journey_id: body.journey_id,
                message: body.message,
                current_topic_id: body.current_topic_id,
            },
        )
        .await?;
    Ok(Json(ChatResponse {
        session_id: reply.session_id,
        reply: reply.reply,
    }))
}

/// Rewrite a passage in simpler words.
#[utoipa::path(
    post,
    path = "/api/ai/simplify",
    request_body = SimplifyBody,
    responses(
        (status = 200, description = "Simplified text", body = SimplifyResponse),
        (status = 400, description = "No text provided", body = ErrorBody)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn simplify_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SimplifyBody>,
) -> Result<impl IntoResponse, ApiError> {
    let simplified = state.chat.simplify(&body.text).await?;
    Ok(Json(SimplifyResponse { simplified }))
}
