use std::sync::Arc;

use sqlx::PgPool;

use crate::llm_client::CompletionCapability;
use crate::sections::service::GenerationService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Completion capability used for posting parsing. Section generation holds its own handle.
    pub llm: Arc<dyn CompletionCapability>,
    pub generation: Arc<GenerationService>,
}
