//! services/api/src/web/resume.rs
//!
//! Resume upload: pull the raw text out of a PDF or DOCX so the client can send it
//! back as `resumeText` when drafting a roadmap.

use crate::adapters::resume_parser::{self, ResumeFormat};
use crate::error::{ApiError, ErrorBody};
use axum::extract::Multipart;
use axum::response::{IntoResponse, Json};
use roadmap_core::ports::PortError;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Largest accepted resume file.
pub const RESUME_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Request body limit for the upload route: the file plus room for multipart framing.
pub const RESUME_BODY_LIMIT: usize = RESUME_MAX_BYTES + 64 * 1024;

const FILE_FIELD: &str = "file";

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResumeResponse {
    pub raw_text: String,
}

/// Extract the text of a resume.
///
/// Accepts a multipart/form-data request whose `file` part is a PDF or DOCX of at
/// most 5 MB.
#[utoipa::path(
    post,
    path = "/api/resume-parser/parse",
    request_body(content_type = "multipart/form-data", description = "The resume, in a part named `file`."),
    responses(
        (status = 200, description = "Extracted text", body = ParsedResumeResponse),
        (status = 400, description = "Missing file, unsupported type or unreadable document", body = ErrorBody),
        (status = 413, description = "File larger than 5 MB", body = ErrorBody)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn parse_resume_handler(mut multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let format = field
            .content_type()
            .and_then(ResumeFormat::from_mime)
            .ok_or_else(|| {
                PortError::Validation(
                    "Invalid file type. Please upload a PDF or DOCX file.".to_string(),
                )
            })?;
        let data = field.bytes().await?;
        upload = Some((format, data));
        break;
    }

    let (format, data) =
        upload.ok_or_else(|| PortError::Validation("No file provided".to_string()))?;
    if data.len() > RESUME_MAX_BYTES {
        return Err(ApiError::UploadTooLarge(RESUME_MAX_BYTES));
    }

    let size = data.len();
    let raw_text = tokio::task::spawn_blocking(move || resume_parser::extract_text(format, &data))
        .await
        .map_err(|e| ApiError::Internal(format!("Resume extraction task failed: {}", e)))?
        .map_err(PortError::from)?;
    info!(
        "Extracted {} character(s) from a {:?} resume of {} byte(s).",
        raw_text.chars().count(),
        format,
        size
    );

    Ok(Json(ParsedResumeResponse { raw_text }))
}
