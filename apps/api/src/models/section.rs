use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::sections::error::StoreError;
use crate::sections::models::{SectionError, SectionRecord};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SectionRecordRow {
    pub document_id: Uuid,
    pub section_id: String,
    pub state: String,
    pub mode: String,
    pub content: Option<Value>,
    pub last_error: Option<Value>,
    pub attempt_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SectionRecordRow> for SectionRecord {
    type Error = StoreError;

    fn try_from(row: SectionRecordRow) -> Result<Self, Self::Error> {
        let key = format!("{}/{}", row.document_id, row.section_id);
        let corrupt = |e: &dyn std::fmt::Display| StoreError::Corrupt(format!("{key}: {e}"));

        let content = match row.content {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(_) => return Err(corrupt(&"content is not an object")),
        };
        let last_error = row
            .last_error
            .map(serde_json::from_value::<SectionError>)
            .transpose()
            .map_err(|e| corrupt(&e))?;

        Ok(SectionRecord {
            document_id: row.document_id,
            section_id: row.section_id.parse().map_err(|e| corrupt(&e))?,
            state: row.state.parse().map_err(|e| corrupt(&e))?,
            mode: row.mode.parse().map_err(|e| corrupt(&e))?,
            content,
            last_error,
            attempt_id: row.attempt_id,
            updated_at: row.updated_at,
        })
    }
}
