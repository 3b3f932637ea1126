use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// An ingested job posting. `parsed` holds the structured `ParsedPosting`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub company: String,
    pub description: String,
    pub parsed: Value,
    pub created_at: DateTime<Utc>,
}

/// A structured resume the user tailors from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SourceDocumentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}
