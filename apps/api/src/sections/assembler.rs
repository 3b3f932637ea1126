//! Document Assembler: the only consumer of the completeness gate. Refuses with
//! `NotReady` until every required section is complete, then renders and stores artifacts.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::documents::phase::DocumentPhase;
use crate::models::document::ArtifactRef;
use crate::render::{ArtifactRenderer, RenderError};
use crate::sections::aggregator::{aggregate, OutstandingSection};
use crate::sections::error::StoreError;
use crate::sections::store::SectionStore;
use crate::storage::{ArtifactStorage, StorageError};

#[derive(Debug, Error)]
pub enum AssembleError {
    /// Expected while generation is running; not a failure.
    #[error("document is not ready: {} section(s) outstanding", outstanding.len())]
    NotReady { outstanding: Vec<OutstandingSection> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembledDocument {
    pub document_id: Uuid,
    pub phase: DocumentPhase,
    pub artifacts: Vec<ArtifactRef>,
    pub degraded: bool,
}

pub struct DocumentAssembler {
    store: Arc<dyn SectionStore>,
    renderer: Arc<dyn ArtifactRenderer>,
    storage: Arc<dyn ArtifactStorage>,
}

impl DocumentAssembler {
    pub fn new(
        store: Arc<dyn SectionStore>,
        renderer: Arc<dyn ArtifactRenderer>,
        storage: Arc<dyn ArtifactStorage>,
    ) -> Self {
        Self {
            store,
            renderer,
            storage,
        }
    }

    pub async fn assemble(&self, document_id: Uuid) -> Result<AssembledDocument, AssembleError> {
        let mut document = self.store.get_document(document_id).await?;
        let records = self.store.list_sections(document_id).await?;
        let content = aggregate(document_id, &document.required_sections, &records);

        if !content.is_complete {
            debug!(
                %document_id,
                outstanding = content.outstanding.len(),
                "assembly refused, document incomplete"
            );
            return Err(AssembleError::NotReady {
                outstanding: content.outstanding,
            });
        }

        let artifacts = self.renderer.render(&content)?;
        let mut refs = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            refs.push(self.storage.put(document_id, artifact).await?);
        }

        document.artifacts = refs;
        document.advance_phase(DocumentPhase::Ready);
        document.updated_at = chrono::Utc::now();
        self.store.update_document(&document).await?;

        info!(
            %document_id,
            artifacts = document.artifacts.len(),
            degraded = document.degraded,
            "document assembled"
        );
        Ok(AssembledDocument {
            document_id,
            phase: document.phase,
            artifacts: document.artifacts,
            degraded: document.degraded,
        })
    }
}
