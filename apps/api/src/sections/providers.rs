//! Input providers. Workers resolve the source document and target context at execution
//! time so a `GenerationRequest` stays small enough for a queue message.

#[cfg(test)]
use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use parking_lot::Mutex;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::job::JobPostingRow;
use crate::sections::error::ProviderError;
use crate::sections::models::{SourceDocument, TargetContext};

#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// The source resume the document was created from.
    async fn get(&self, document_id: Uuid) -> Result<SourceDocument, ProviderError>;

    /// A source resume by its own id, before any document points at it.
    async fn get_by_id(&self, source_id: Uuid) -> Result<SourceDocument, ProviderError>;
}

#[async_trait]
pub trait TargetProvider: Send + Sync {
    /// The job posting the document is tailored to.
    async fn get(&self, document_id: Uuid) -> Result<TargetContext, ProviderError>;
}

/// The shape section generators read a posting in.
pub fn target_context(posting: &JobPostingRow) -> TargetContext {
    json!({
        "title": posting.title,
        "company": posting.company,
        "description": posting.description,
        "parsed": posting.parsed,
    })
}

#[derive(Clone)]
pub struct PgSourceProvider {
    pool: PgPool,
}

impl PgSourceProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceProvider for PgSourceProvider {
    async fn get(&self, document_id: Uuid) -> Result<SourceDocument, ProviderError> {
        let data: Option<Value> = sqlx::query_scalar(
            r#"
            SELECT s.data FROM source_documents s
            JOIN documents d ON d.source_id = s.id
            WHERE d.id = $1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        data.ok_or_else(|| ProviderError::NotFound(format!("source for document {document_id}")))
    }

    async fn get_by_id(&self, source_id: Uuid) -> Result<SourceDocument, ProviderError> {
        let data: Option<Value> =
            sqlx::query_scalar("SELECT data FROM source_documents WHERE id = $1")
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await?;
        data.ok_or_else(|| ProviderError::NotFound(format!("source {source_id}")))
    }
}

#[derive(Clone)]
pub struct PgTargetProvider {
    pool: PgPool,
}

impl PgTargetProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetProvider for PgTargetProvider {
    async fn get(&self, document_id: Uuid) -> Result<TargetContext, ProviderError> {
        let posting = sqlx::query_as::<_, JobPostingRow>(
            r#"
            SELECT j.* FROM job_postings j
            JOIN documents d ON d.job_posting_id = j.id
            WHERE d.id = $1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("job posting for document {document_id}")))?;
        Ok(target_context(&posting))
    }
}

/// Sources and targets keyed by document id, plus sources keyed by their own id.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryInputs {
    sources: Mutex<HashMap<Uuid, SourceDocument>>,
    targets: Mutex<HashMap<Uuid, TargetContext>>,
    by_id: Mutex<HashMap<Uuid, SourceDocument>>,
}

#[cfg(test)]
impl InMemoryInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document_id: Uuid, source: SourceDocument, target: TargetContext) {
        self.sources.lock().insert(document_id, source);
        self.targets.lock().insert(document_id, target);
    }

    pub fn insert_source(&self, source_id: Uuid, source: SourceDocument) {
        self.by_id.lock().insert(source_id, source);
    }
}

#[cfg(test)]
#[async_trait]
impl SourceProvider for InMemoryInputs {
    async fn get(&self, document_id: Uuid) -> Result<SourceDocument, ProviderError> {
        self.sources
            .lock()
            .get(&document_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("source for document {document_id}")))
    }

    async fn get_by_id(&self, source_id: Uuid) -> Result<SourceDocument, ProviderError> {
        self.by_id
            .lock()
            .get(&source_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("source {source_id}")))
    }
}

#[cfg(test)]
#[async_trait]
impl TargetProvider for InMemoryInputs {
    async fn get(&self, document_id: Uuid) -> Result<TargetContext, ProviderError> {
        self.targets
            .lock()
            .get(&document_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("target for document {document_id}")))
    }
}
