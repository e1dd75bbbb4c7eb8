//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the roadmap endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use crate::web::{chat, resume, topic_content};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use roadmap_core::domain::{DayWithTopics, Journey};
use roadmap_core::progress::ProgressReport;
use roadmap_core::queue::QueueSnapshot;
use roadmap_core::roadmap::{DraftDay, DraftTopic, RoadmapDraft, RoadmapRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        generate_roadmap_handler,
        save_roadmap_handler,
        build_roadmap_handler,
        list_journeys_handler,
        get_journey_handler,
        update_topic_handler,
        visit_day_handler,
        topic_content::generate_initial_handler,
        topic_content::get_topic_content_handler,
        topic_content::status_handler,
        chat::chat_handler,
        chat::simplify_handler,
        resume::parse_resume_handler,
    ),
    components(
        schemas(
            ErrorBody,
            HealthResponse,
            QueueStatusView,
            RoadmapRequestBody,
            RoadmapDraftBody,
            DraftDayBody,
            DraftTopicBody,
            SaveRoadmapBody,
            JourneySummary,
            JourneyDetail,
            DayView,
            TopicView,
            TopicCompletionBody,
            ProgressView,
            VisitView,
            topic_content::InitialContentResponse,
            topic_content::TopicContentResponse,
            topic_content::GenerationStatusView,
            chat::ChatBody,
            chat::ChatResponse,
            chat::SimplifyBody,
            chat::SimplifyResponse,
            resume::ParsedResumeResponse,
        )
    ),
    tags(
        (name = "Learning Roadmap API", description = "Roadmap planning, topic content generation and the study assistant.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusView {
    pub pending: usize,
    pub in_flight: usize,
    pub processing: bool,
}

impl From<QueueSnapshot> for QueueStatusView {
    fn from(s: QueueSnapshot) -> Self {
        Self {
            pending: s.pending,
            in_flight: s.in_flight,
            processing: s.processing,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub generation_queue: QueueStatusView,
}

/// Input for drafting or building a roadmap.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapRequestBody {
    pub goal: String,
    #[serde(default)]
    pub resume_text: Option<String>,
    /// Number of days, 1 to 365. Defaults to 30.
    #[serde(default, alias = "timelineInDays")]
    pub timeline_days: Option<u32>,
}

impl From<RoadmapRequestBody> for RoadmapRequest {
    fn from(body: RoadmapRequestBody) -> Self {
        RoadmapRequest {
            goal: body.goal,
            resume_text: body.resume_text,
            timeline_days: body.timeline_days,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DraftTopicBody {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DraftDayBody {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, alias = "summary")]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<DraftTopicBody>,
}

/// A roadmap preview as returned by the generate endpoint and accepted by save.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapDraftBody {
    pub title: String,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub prep_type: String,
    pub roadmap: Vec<DraftDayBody>,
}

impl From<RoadmapDraft> for RoadmapDraftBody {
    fn from(draft: RoadmapDraft) -> Self {
        Self {
            title: draft.title,
            timeline: draft.timeline,
            prep_type: draft.prep_type,
            roadmap: draft
                .roadmap
                .into_iter()
                .map(|day| DraftDayBody {
                    id: day.id,
                    title: day.title,
                    description: day.description,
                    topics: day
                        .topics
                        .into_iter()
                        .map(|t| DraftTopicBody {
                            id: t.id,
                            title: t.title,
                            description: t.description,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl From<RoadmapDraftBody> for RoadmapDraft {
    fn from(body: RoadmapDraftBody) -> Self {
        RoadmapDraft {
            title: body.title,
            timeline: body.timeline,
            prep_type: body.prep_type,
            roadmap: body
                .roadmap
                .into_iter()
                .map(|day| DraftDay {
                    id: day.id,
                    title: day.title,
                    description: day.description,
                    topics: day
                        .topics
                        .into_iter()
                        .map(|t| DraftTopic {
                            id: t.id,
                            title: t.title,
                            description: t.description,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRoadmapBody {
    pub goal: String,
    #[serde(default)]
    pub resume_text: Option<String>,
    pub roadmap: RoadmapDraftBody,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JourneySummary {
    pub id: Uuid,
    pub goal: String,
    pub title: String,
    pub duration_days: u32,
    pub prep_type: String,
    pub last_visited_day: u32,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl From<&Journey> for JourneySummary {
    fn from(j: &Journey) -> Self {
        Self {
            id: j.id,
            goal: j.goal.clone(),
            title: j.title.clone(),
            duration_days: j.duration_days,
            prep_type: j.prep_type.clone(),
            last_visited_day: j.last_visited_day,
            is_completed: j.is_completed,
            created_at: j.created_at,
            deadline: j.deadline(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    pub id: Uuid,
    pub name: String,
    pub is_completed: bool,
    pub has_content: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub id: Uuid,
    pub day_number: u32,
    pub title: String,
    pub summary: Option<String>,
    pub is_completed: bool,
    pub topics: Vec<TopicView>,
}

impl From<DayWithTopics> for DayView {
    fn from(d: DayWithTopics) -> Self {
        Self {
            id: d.day.id,
            day_number: d.day.day_number,
            title: d.day.title,
            summary: d.day.summary,
            is_completed: d.day.is_completed,
            topics: d
                .topics
                .iter()
                .map(|t| TopicView {
                    id: t.id,
                    name: t.name.clone(),
                    is_completed: t.is_completed,
                    has_content: t.has_content(),
                })
                .collect(),
        }
    }
}

/// A journey with its days in order.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JourneyDetail {
    pub journey: JourneySummary,
    pub days: Vec<DayView>,
}

#[derive(Deserialize, ToSchema)]
pub struct TopicCompletionBody {
    pub completed: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub is_completed: bool,
    pub progress_percent: u32,
    pub all_topics_completed: bool,
}

impl From<ProgressReport> for ProgressView {
    fn from(r: ProgressReport) -> Self {
        Self {
            is_completed: r.is_completed,
            progress_percent: r.progress_percent,
            all_topics_completed: r.all_topics_completed,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitView {
    pub journey_id: Uuid,
    pub last_visited_day: u32,
}

async fn journey_detail(state: &AppState, journey: &Journey) -> Result<JourneyDetail, ApiError> {
    let days = state.repo.get_days_with_topics(journey.id).await?;
    Ok(JourneyDetail {
        journey: JourneySummary::from(journey),
        days: days.into_iter().map(DayView::from).collect(),
    })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe with a view of the background generation queue.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        generation_queue: state.queue.snapshot().into(),
    })
}

/// Draft a roadmap without saving it.
#[utoipa::path(
    post,
    path = "/api/roadmap/generate",
    request_body = RoadmapRequestBody,
    responses(
        (status = 200, description = "Roadmap preview", body = RoadmapDraftBody),
        (status = 400, description = "Invalid goal or timeline", body = ErrorBody),
        (status = 500, description = "The LLM reply could not be used", body = ErrorBody)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn generate_roadmap_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoadmapRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request: RoadmapRequest = body.into();
    let draft = state.roadmaps.draft(&request).await?;
    Ok(Json(RoadmapDraftBody::from(draft)))
}

/// Save a previously drafted roadmap as a new journey.
#[utoipa::path(
    post,
    path = "/api/roadmap/save",
    request_body = SaveRoadmapBody,
    responses(
        (status = 201, description = "Journey created", body = JourneyDetail),
        (status = 400, description = "Invalid roadmap", body = ErrorBody)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn save_roadmap_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<SaveRoadmapBody>,
) -> Result<impl IntoResponse, ApiError> {
    let journey = state
        .roadmaps
        .save(user_id, &body.goal, body.resume_text, body.roadmap.into())
        .await?;
    let detail = journey_detail(&state, &journey).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Draft and save a roadmap in one call.
#[utoipa::path(
    post,
    path = "/api/roadmap/build",
    request_body = RoadmapRequestBody,
    responses(
        (status = 201, description = "Journey created", body = JourneyDetail),
        (status = 400, description = "Invalid goal or timeline", body = ErrorBody),
        (status = 500, description = "The LLM reply could not be used", body = ErrorBody)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn build_roadmap_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<RoadmapRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let journey = state.roadmaps.build(user_id, body.into()).await?;
    info!("Built journey {} for user {}.", journey.id, user_id);
    let detail = journey_detail(&state, &journey).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// List the caller's journeys, newest first.
#[utoipa::path(
    get,
    path = "/api/roadmap/journeys",
    responses((status = 200, description = "The caller's journeys", body = [JourneySummary])),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_journeys_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let journeys = state.repo.list_journeys_for_user(user_id).await?;
    let summaries: Vec<JourneySummary> = journeys.iter().map(JourneySummary::from).collect();
    Ok(Json(summaries))
}

#[utoipa::path(
    get,
    path = "/api/roadmap/{journey_id}",
    responses(
        (status = 200, description = "The journey with its days", body = JourneyDetail),
        (status = 401, description = "Journey belongs to another user", body = ErrorBody),
        (status = 404, description = "No such journey", body = ErrorBody)
    ),
    params(
        ("journey_id" = Uuid, Path, description = "Journey id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_journey_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(journey_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let journey = state.owned_journey(user_id, journey_id).await?;
    Ok(Json(journey_detail(&state, &journey).await?))
}

/// Mark a topic complete or incomplete.
#[utoipa::path(
    patch,
    path = "/api/roadmap/{journey_id}/topic/{topic_id}",
    request_body = TopicCompletionBody,
    responses(
        (status = 200, description = "Updated progress", body = ProgressView),
        (status = 404, description = "Topic is not part of the journey", body = ErrorBody)
    ),
    params(
        ("journey_id" = Uuid, Path, description = "Journey id"),
        ("topic_id" = Uuid, Path, description = "Topic id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn update_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((journey_id, topic_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<TopicCompletionBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_journey(user_id, journey_id).await?;
    let report = state
        .progress
        .set_topic_completion(journey_id, topic_id, body.completed)
        .await?;
    Ok(Json(ProgressView::from(report)))
}

/// Record the day the learner last opened.
#[utoipa::path(
    put,
    path = "/api/roadmap/{journey_id}/visit/{day_number}",
    responses(
        (status = 200, description = "Visit recorded", body = VisitView),
        (status = 400, description = "Day is outside the journey", body = ErrorBody)
    ),
    params(
        ("journey_id" = Uuid, Path, description = "Journey id"),
        ("day_number" = u32, Path, description = "1-based day number"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn visit_day_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((journey_id, day_number)): Path<(Uuid, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_journey(user_id, journey_id).await?;
    state.progress.visit_day(journey_id, day_number).await?;
    Ok(Json(VisitView {
        journey_id,
        last_visited_day: day_number,
    }))
}
