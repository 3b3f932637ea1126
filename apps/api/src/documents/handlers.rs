use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::documents::phase::DocumentPhase;
use crate::errors::AppError;
use crate::models::document::{Document, ModeOverrides};
use crate::models::job::SourceDocumentRow;
use crate::sections::aggregator::AggregatedContent;
use crate::sections::assembler::AssembledDocument;
use crate::sections::fallback::{AsyncRun, GenerationRun};
use crate::sections::models::SectionId;
use crate::sections::orchestrator::Submission;
use crate::sections::source::json_kind;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SourceRequest {
    pub user_id: Uuid,
    pub data: Value,
}

/// POST /api/v1/sources
pub async fn handle_create_source(
    State(state): State<AppState>,
    Json(req): Json<SourceRequest>,
) -> Result<(StatusCode, Json<SourceDocumentRow>), AppError> {
    if !req.data.is_object() {
        return Err(AppError::Validation(format!(
            "source resume must be a JSON object, got {}",
            json_kind(&req.data)
        )));
    }

    let row: SourceDocumentRow = sqlx::query_as(
        "INSERT INTO source_documents (id, user_id, data) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(req.user_id)
    .bind(&req.data)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Deserialize)]
pub struct CreateDocumentRequest {
    pub user_id: Uuid,
    pub source_id: Uuid,
    pub job_posting_id: Uuid,
    #[serde(default)]
    pub mode_overrides: ModeOverrides,
}

/// POST /api/v1/documents
pub async fn handle_create_document(
    State(state): State<AppState>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let owned: Option<(bool, bool)> = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM source_documents WHERE id = $1 AND user_id = $3),
            EXISTS(SELECT 1 FROM job_postings WHERE id = $2 AND user_id = $3)
        "#,
    )
    .bind(req.source_id)
    .bind(req.job_posting_id)
    .bind(req.user_id)
    .fetch_optional(&state.db)
    .await?;
    match owned {
        Some((true, true)) => {}
        Some((false, _)) | None => {
            return Err(AppError::NotFound(format!("Source {} not found", req.source_id)))
        }
        Some((_, false)) => {
            return Err(AppError::NotFound(format!(
                "Job posting {} not found",
                req.job_posting_id
            )))
        }
    }

    let document = Document::new(req.user_id, req.source_id, req.job_posting_id, req.mode_overrides);
    let document = state.generation.create_document(document).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// POST /api/v1/documents/:id/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GenerationRun>, AppError> {
    Ok(Json(state.generation.generate(id).await?))
}

/// POST /api/v1/documents/:id/generate/async
pub async fn handle_generate_async(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AsyncRun>), AppError> {
    let run = state.generation.generate_async(id).await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// GET /api/v1/documents/:id/status
pub async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AggregatedContent>, AppError> {
    Ok(Json(state.generation.status(id).await?))
}

/// POST /api/v1/documents/:id/sections/:section/regenerate
pub async fn handle_regenerate(
    State(state): State<AppState>,
    Path((id, section)): Path<(Uuid, String)>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let section_id = section
        .parse::<SectionId>()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let submission = state.generation.regenerate(id, section_id).await?;
    let status = match submission {
        Submission::Dispatched { .. } => StatusCode::ACCEPTED,
        Submission::Conflict { .. } => StatusCode::CONFLICT,
        Submission::Failed { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((status, Json(submission)))
}

/// POST /api/v1/documents/:id/assemble
pub async fn handle_assemble(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssembledDocument>, AppError> {
    Ok(Json(state.generation.assemble(id).await?))
}

#[derive(Deserialize)]
pub struct PhaseUpdate {
    pub phase: DocumentPhase,
}

/// PATCH /api/v1/documents/:id/phase
pub async fn handle_update_phase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PhaseUpdate>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.generation.advance_phase(id, req.phase).await?))
}
