use thiserror::Error;

use crate::sections::models::{ErrorKind, SectionError, SectionId, SectionState};

/// Failure of a single generation attempt. Captured onto the record, never propagated
/// out of the orchestrator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("missing source data: {field}")]
    MissingSourceData { field: String },

    #[error("upstream completion failed: {0}")]
    Upstream(String),

    #[error("could not parse generated content: {0}")]
    Parse(String),

    #[error("generation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::MissingSourceData { .. } => ErrorKind::MissingSourceData,
            GenerationError::Upstream(_) => ErrorKind::Upstream,
            GenerationError::Parse(_) => ErrorKind::Parse,
            GenerationError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

impl From<GenerationError> for SectionError {
    fn from(err: GenerationError) -> Self {
        SectionError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// CAS failure: someone else moved the record first.
    #[error("section {section_id} is {actual}, expected {expected}")]
    Conflict {
        section_id: SectionId,
        expected: SectionState,
        actual: SectionState,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: SectionState, to: SectionState },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Outages worth retrying. CAS and validation failures never change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Database(_))
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("source document must be a JSON object, got {0}")]
    InvalidSource(&'static str),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Anything that stops a pipeline before the first dispatch. Triggers the fallback path.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("source unavailable: {0}")]
    Source(#[from] ProviderError),
}
