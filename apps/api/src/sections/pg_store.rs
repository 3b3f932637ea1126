//! PostgreSQL-backed `SectionStore`. The CAS is a single conditional `UPDATE ... RETURNING`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::document::{Document, DocumentRow};
use crate::models::section::SectionRecordRow;
use crate::sections::error::StoreError;
use crate::sections::models::{
    SectionDescriptor, SectionId, SectionRecord, SectionState, Transition,
};
use crate::sections::state_machine::validate_transition;
use crate::sections::store::{conflict, SectionStore};

#[derive(Clone)]
pub struct PgSectionStore {
    pool: PgPool,
}

impl PgSectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn into_records(rows: Vec<SectionRecordRow>) -> Result<Vec<SectionRecord>, StoreError> {
    let mut records = rows
        .into_iter()
        .map(SectionRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    records.sort_by_key(|r| r.section_id);
    Ok(records)
}

#[async_trait]
impl SectionStore for PgSectionStore {
    async fn create_document(&self, document: &Document) -> Result<(), StoreError> {
        let required: Vec<&str> = document.required_sections.iter().map(|s| s.as_str()).collect();
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, user_id, source_id, job_posting_id, phase, required_sections,
                 mode_overrides, artifacts, degraded, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(document.id)
        .bind(document.user_id)
        .bind(document.source_id)
        .bind(document.job_posting_id)
        .bind(document.phase.as_str())
        .bind(&required)
        .bind(to_json(&document.mode_overrides)?)
        .bind(to_json(&document.artifacts)?)
        .bind(document.degraded)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))?;
        Document::try_from(row)
    }

    async fn update_document(&self, document: &Document) -> Result<(), StoreError> {
        let required: Vec<&str> = document.required_sections.iter().map(|s| s.as_str()).collect();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET phase = $2, required_sections = $3, mode_overrides = $4,
                artifacts = $5, degraded = $6, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(document.id)
        .bind(document.phase.as_str())
        .bind(&required)
        .bind(to_json(&document.mode_overrides)?)
        .bind(to_json(&document.artifacts)?)
        .bind(document.degraded)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("document {}", document.id)));
        }
        Ok(())
    }

    async fn init_sections(
        &self,
        document_id: Uuid,
        descriptors: &[SectionDescriptor],
    ) -> Result<Vec<SectionRecord>, StoreError> {
        let mut tx = self.pool.begin().await?;
        for descriptor in descriptors {
            sqlx::query(
                r#"
                INSERT INTO section_records (document_id, section_id, state, mode)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (document_id, section_id) DO NOTHING
                "#,
            )
            .bind(document_id)
            .bind(descriptor.id.as_str())
            .bind(SectionState::Locked.as_str())
            .bind(descriptor.mode.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.list_sections(document_id).await
    }

    async fn get_section(
        &self,
        document_id: Uuid,
        section_id: SectionId,
    ) -> Result<SectionRecord, StoreError> {
        let row = sqlx::query_as::<_, SectionRecordRow>(
            "SELECT * FROM section_records WHERE document_id = $1 AND section_id = $2",
        )
        .bind(document_id)
        .bind(section_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("section {document_id}/{section_id}")))?;
        SectionRecord::try_from(row)
    }

    async fn list_sections(&self, document_id: Uuid) -> Result<Vec<SectionRecord>, StoreError> {
        let rows = sqlx::query_as::<_, SectionRecordRow>(
            "SELECT * FROM section_records WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        into_records(rows)
    }

    async fn transition(
        &self,
        document_id: Uuid,
        section_id: SectionId,
        transition: Transition,
    ) -> Result<SectionRecord, StoreError> {
        validate_transition(transition.from, transition.to)?;

        let content = match (&transition.to, &transition.content) {
            (SectionState::Complete, Some(map)) => Some(Value::Object(map.clone())),
            _ => None,
        };
        let last_error = match (&transition.to, &transition.last_error) {
            (SectionState::Error, Some(error)) => Some(to_json(error)?),
            _ => None,
        };

        let updated = sqlx::query_as::<_, SectionRecordRow>(
            r#"
            UPDATE section_records
            SET state = $3,
                attempt_id = CASE WHEN $3 = 'generating' THEN $5 ELSE attempt_id END,
                content = $6,
                last_error = $7,
                updated_at = now()
            WHERE document_id = $1
              AND section_id = $2
              AND state = $4
              AND ($4 <> 'generating' OR attempt_id = $5)
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(section_id.as_str())
        .bind(transition.to.as_str())
        .bind(transition.from.as_str())
        .bind(transition.attempt_id)
        .bind(content)
        .bind(last_error)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => SectionRecord::try_from(row),
            None => {
                let current = self.get_section(document_id, section_id).await?;
                Err(conflict(&transition, &current))
            }
        }
    }

    async fn put_record(&self, record: &SectionRecord) -> Result<(), StoreError> {
        let content = record.content.clone().map(Value::Object);
        let last_error = record.last_error.as_ref().map(to_json).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO section_records
                (document_id, section_id, state, mode, content, last_error, attempt_id, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (document_id, section_id) DO UPDATE
            SET state = EXCLUDED.state,
                mode = EXCLUDED.mode,
                content = EXCLUDED.content,
                last_error = EXCLUDED.last_error,
                attempt_id = EXCLUDED.attempt_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.document_id)
        .bind(record.section_id.as_str())
        .bind(record.state.as_str())
        .bind(record.mode.as_str())
        .bind(content)
        .bind(last_error)
        .bind(record.attempt_id)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
