use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::parser::parse_posting;
use crate::models::job::JobPostingRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct JobIngestRequest {
    pub user_id: Uuid,
    pub raw_text: String,
}

/// POST /api/v1/jobs
pub async fn handle_ingest_job(
    State(state): State<AppState>,
    Json(req): Json<JobIngestRequest>,
) -> Result<(StatusCode, Json<JobPostingRow>), AppError> {
    if req.raw_text.trim().is_empty() {
        return Err(AppError::Validation("raw_text must not be empty".to_string()));
    }

    let parsed = parse_posting(&req.raw_text, state.llm.as_ref()).await?;
    let parsed_json = serde_json::to_value(&parsed)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("could not encode parsed posting: {e}")))?;

    let row: JobPostingRow = sqlx::query_as(
        r#"
        INSERT INTO job_postings (id, user_id, title, company, description, parsed)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.user_id)
    .bind(&parsed.title)
    .bind(&parsed.company)
    .bind(&req.raw_text)
    .bind(&parsed_json)
    .fetch_one(&state.db)
    .await?;

    info!(
        job_posting_id = %row.id,
        tone = ?parsed.detected_tone,
        keywords = parsed.keyword_inventory.len(),
        "job posting ingested"
    );
    Ok((StatusCode::CREATED, Json(row)))
}
