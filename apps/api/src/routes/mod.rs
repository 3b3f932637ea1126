pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::documents::handlers as documents;
use crate::jobs::handlers as jobs;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Inputs
        .route("/api/v1/sources", post(documents::handle_create_source))
        .route("/api/v1/jobs", post(jobs::handle_ingest_job))
        // Documents and section generation
        .route("/api/v1/documents", post(documents::handle_create_document))
        .route(
            "/api/v1/documents/:id/generate",
            post(documents::handle_generate),
        )
        .route(
            "/api/v1/documents/:id/generate/async",
            post(documents::handle_generate_async),
        )
        .route("/api/v1/documents/:id/status", get(documents::handle_status))
        .route(
            "/api/v1/documents/:id/sections/:section/regenerate",
            post(documents::handle_regenerate),
        )
        .route(
            "/api/v1/documents/:id/assemble",
            post(documents::handle_assemble),
        )
        .route(
            "/api/v1/documents/:id/phase",
            patch(documents::handle_update_phase),
        )
        .with_state(state)
}
