//! Generation service: the pipeline as the HTTP layer sees it.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{DispatchMode, GenerationConfig};
use crate::documents::phase::DocumentPhase;
use crate::errors::AppError;
use crate::models::document::Document;
use crate::render::ArtifactRenderer;
use crate::sections::aggregator::{AggregatedContent, Aggregator};
use crate::sections::assembler::{AssembleError, AssembledDocument, DocumentAssembler};
use crate::sections::catalog::identify_sections;
use crate::sections::dispatch::{InProcessDispatcher, QueueConsumer, RedisDispatcher, WorkDispatcher};
use crate::sections::error::{PipelineError, StoreError};
use crate::sections::fallback::{AsyncRun, FallbackController, GenerationRun};
use crate::sections::generator::Generators;
use crate::sections::models::{SectionId, SectionState, Transition};
use crate::sections::orchestrator::{expire_abandoned, Orchestrator, RunOptions, Submission};
use crate::sections::progress::ProgressSink;
use crate::sections::providers::{SourceProvider, TargetProvider};
use crate::sections::store::SectionStore;
use crate::sections::worker::SectionWorker;
use crate::storage::ArtifactStorage;

/// Collaborators the service is built from.
pub struct ServiceDeps {
    pub store: Arc<dyn SectionStore>,
    pub sources: Arc<dyn SourceProvider>,
    pub targets: Arc<dyn TargetProvider>,
    pub generators: Generators,
    pub renderer: Arc<dyn ArtifactRenderer>,
    pub storage: Arc<dyn ArtifactStorage>,
    /// Required for `DispatchMode::Queue`.
    pub redis: Option<redis::Client>,
}

pub struct GenerationService {
    store: Arc<dyn SectionStore>,
    sources: Arc<dyn SourceProvider>,
    worker: Arc<SectionWorker>,
    orchestrator: Arc<Orchestrator>,
    controller: FallbackController,
    aggregator: Aggregator,
    assembler: DocumentAssembler,
    dispatcher: Arc<dyn WorkDispatcher>,
    options: RunOptions,
}

/// Logs every transition. The relay runs on its own task.
fn progress_log() -> ProgressSink {
    ProgressSink::spawn(|event| {
        debug!(
            document_id = %event.document_id,
            section = %event.section_id,
            state = %event.state,
            "section progress"
        );
    })
}

impl GenerationService {
    pub fn new(deps: ServiceDeps, config: GenerationConfig) -> Self {
        let options = RunOptions::from_config(&config);
        let worker = Arc::new(SectionWorker::new(
            deps.store.clone(),
            deps.sources.clone(),
            deps.targets.clone(),
            deps.generators.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(deps.store.clone(), worker.clone()));

        let dispatcher: Arc<dyn WorkDispatcher> = match (config.dispatch, deps.redis) {
            (DispatchMode::Queue, Some(client)) => Arc::new(RedisDispatcher::new(client)),
            (mode, _) => {
                if mode == DispatchMode::Queue {
                    warn!("queue dispatch requested without a redis client, using in-process dispatch");
                }
                Arc::new(InProcessDispatcher::new(worker.clone(), &options, progress_log()))
            }
        };

        let controller = FallbackController::new(
            deps.store.clone(),
            deps.sources.clone(),
            deps.targets,
            deps.generators,
            orchestrator.clone(),
            config,
        );

        Self {
            aggregator: Aggregator::new(deps.store.clone()),
            assembler: DocumentAssembler::new(deps.store.clone(), deps.renderer, deps.storage),
            store: deps.store,
            sources: deps.sources,
            worker,
            orchestrator,
            controller,
            dispatcher,
            options,
        }
    }

    /// Consumer loops for the Redis queue, sharing this service's worker.
    pub fn queue_consumer(&self, client: redis::Client) -> QueueConsumer {
        QueueConsumer::new(client, self.worker.clone(), &self.options, progress_log())
    }

    /// Stores a new document and creates its section records (all `locked`). The source
    /// and catalog are resolved first, so a failure there writes nothing.
    pub async fn create_document(&self, mut document: Document) -> Result<Document, PipelineError> {
        let source = self.sources.get_by_id(document.source_id).await?;
        let descriptors = identify_sections(&source, &document.mode_overrides)?;
        document.required_sections = descriptors
            .iter()
            .filter(|d| d.required)
            .map(|d| d.id)
            .collect();

        self.store.create_document(&document).await?;
        self.store.init_sections(document.id, &descriptors).await?;

        info!(
            document_id = %document.id,
            sections = descriptors.len(),
            required = document.required_sections.len(),
            "document created"
        );
        Ok(document)
    }

    pub async fn generate(&self, document_id: Uuid) -> Result<GenerationRun, PipelineError> {
        self.controller.generate(document_id, progress_log()).await
    }

    pub async fn generate_async(&self, document_id: Uuid) -> Result<AsyncRun, PipelineError> {
        self.controller
            .generate_async(document_id, self.dispatcher.as_ref())
            .await
    }

    pub async fn status(&self, document_id: Uuid) -> Result<AggregatedContent, StoreError> {
        self.aggregator.snapshot(document_id).await
    }

    /// `complete|error -> ready`, then dispatch. A section that is already `ready` is
    /// dispatched as is. A `generating` attempt past its timeout is expired to `error` and
    /// retried; a live one, like a `locked` section, is reported as a conflict.
    pub async fn regenerate(
        &self,
        document_id: Uuid,
        section_id: SectionId,
    ) -> Result<Submission, StoreError> {
        let mut document = self.store.get_document(document_id).await?;
        let mut record = self.store.get_section(document_id, section_id).await?;

        if record.state == SectionState::Generating {
            let timeout = self.options.timeout_for(section_id);
            if expire_abandoned(self.store.as_ref(), document_id, section_id, timeout)
                .await
                .is_some()
            {
                record.state = SectionState::Error;
            }
        }

        match record.state {
            SectionState::Complete | SectionState::Error => {
                match self
                    .store
                    .transition(document_id, section_id, Transition::reset(record.state))
                    .await
                {
                    Ok(_) => {}
                    Err(StoreError::Conflict { actual, .. }) => {
                        return Ok(Submission::Conflict { state: actual })
                    }
                    Err(e) => return Err(e),
                }
            }
            SectionState::Ready => {}
            state => return Ok(Submission::Conflict { state }),
        }

        if !document.phase.is_submitted() && document.advance_phase(DocumentPhase::Generating) {
            self.store.update_document(&document).await?;
        }

        info!(%document_id, section = %section_id, previous = %record.state, "section regeneration requested");
        let mut submissions = self
            .orchestrator
            .submit(
                document_id,
                &[section_id],
                self.dispatcher.as_ref(),
                &self.options,
            )
            .await;
        Ok(submissions
            .remove(&section_id)
            .unwrap_or(Submission::Failed {
                error: "section was not submitted".to_string(),
            }))
    }

    pub async fn assemble(&self, document_id: Uuid) -> Result<AssembledDocument, AssembleError> {
        self.assembler.assemble(document_id).await
    }

    /// User-driven application phase changes (applied, interviewing, ...).
    pub async fn advance_phase(
        &self,
        document_id: Uuid,
        next: DocumentPhase,
    ) -> Result<Document, AppError> {
        let mut document = self.store.get_document(document_id).await?;
        let current = document.phase;
        if !document.advance_phase(next) {
            return Err(AppError::Conflict(format!(
                "cannot move document from {current} to {next}"
            )));
        }
        self.store.update_document(&document).await?;
        info!(%document_id, from = %current, to = %next, "document phase advanced");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::render::DocumentRenderer;
    use crate::models::document::ModeOverrides;
    use crate::sections::models::{ErrorKind, Outcome};
    use crate::sections::providers::InMemoryInputs;
    use crate::sections::store::InMemorySectionStore;
    use crate::sections::test_support::{required, ScriptedGenerator};
    use crate::storage::InMemoryArtifactStorage;

    struct Harness {
        service: Arc<GenerationService>,
        store: Arc<InMemorySectionStore>,
        inputs: Arc<InMemoryInputs>,
        generator: Arc<ScriptedGenerator>,
    }

    fn harness(generator: ScriptedGenerator) -> Harness {
        let store = Arc::new(InMemorySectionStore::new());
        let inputs = Arc::new(InMemoryInputs::new());
        let generator = Arc::new(generator);
        let service = Arc::new(GenerationService::new(
            ServiceDeps {
                store: store.clone(),
                sources: inputs.clone(),
                targets: inputs.clone(),
                generators: Generators::new(generator.clone(), generator.clone()),
                renderer: Arc::new(DocumentRenderer),
                storage: Arc::new(InMemoryArtifactStorage::new()),
                redis: None,
            },
            GenerationConfig::default(),
        ));
        Harness {
            service,
            store,
            inputs,
            generator,
        }
    }

    fn document(h: &Harness) -> Document {
        let document = Document::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), ModeOverrides::new());
        let source = json!({
            "basics": {"name": "Ada", "summary": "Analyst."},
            "work": [{"name": "Acme", "position": "Engineer"}]
        });
        h.inputs.insert_source(document.source_id, source.clone());
        h.inputs.insert(
            document.id,
            source,
            json!({"title": "Engineer", "company": "Acme"}),
        );
        document
    }

    /// Moves a section's last write an hour into the past.
    async fn backdate(h: &Harness, document_id: Uuid, section_id: SectionId) {
        let mut record = h.store.get_section(document_id, section_id).await.unwrap();
        record.updated_at -= chrono::Duration::hours(1);
        h.store.put_record(&record).await.unwrap();
    }

    async fn create(h: &Harness) -> Document {
        h.service.create_document(document(h)).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_document_initializes_locked_records() {
        let h = harness(ScriptedGenerator::new());
        let document = create(&h).await;

        let records = h.store.list_sections(document.id).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.section_id).collect();
        assert_eq!(
            ids,
            vec![
                SectionId::Contact,
                SectionId::Summary,
                SectionId::Skills,
                SectionId::Experience,
                SectionId::CoverLetter
            ]
        );
        assert!(records.iter().all(|r| r.state == SectionState::Locked));
        assert_eq!(document.required_sections, ids);
        assert_eq!(document.phase, DocumentPhase::Draft);
    }

    #[tokio::test]
    async fn test_create_document_without_source_fails() {
        let h = harness(ScriptedGenerator::new());
        let orphan = Document::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), ModeOverrides::new());
        let result = h.service.create_document(orphan).await;
        assert!(matches!(result, Err(PipelineError::Source(_))));
    }

    #[tokio::test]
    async fn test_create_document_with_invalid_source_writes_nothing() {
        let h = harness(ScriptedGenerator::new());
        let document = Document::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), ModeOverrides::new());
        h.inputs.insert_source(document.source_id, json!(["not", "a", "resume"]));

        let result = h.service.create_document(document.clone()).await;

        assert!(matches!(result, Err(PipelineError::Catalog(_))));
        assert!(matches!(
            h.store.get_document(document.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(h.store.list_sections(document.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_then_assemble() {
        let h = harness(ScriptedGenerator::new());
        let document = create(&h).await;

        let run = h.service.generate(document.id).await.unwrap();
        assert!(run.outcomes.values().all(Outcome::is_complete));

        let status = h.service.status(document.id).await.unwrap();
        assert!(status.is_complete);

        let assembled = h.service.assemble(document.id).await.unwrap();
        assert_eq!(assembled.phase, DocumentPhase::Ready);
        assert!(!assembled.degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_resets_and_redispatches() {
        let h = harness(ScriptedGenerator::new());
        let document = create(&h).await;
        h.service.generate(document.id).await.unwrap();

        let submission = h.service.regenerate(document.id, SectionId::Summary).await.unwrap();
        assert!(matches!(submission, Submission::Dispatched { .. }));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let record = h.store.get_section(document.id, SectionId::Summary).await.unwrap();
        assert_eq!(record.state, SectionState::Complete);
        assert_eq!(h.generator.calls(SectionId::Summary), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_generating_section_is_conflict() {
        let h = harness(ScriptedGenerator::new().delay(SectionId::Summary, Duration::from_secs(30)));
        let document = create(&h).await;
        let _ = h.service.generate_async(document.id).await.unwrap();

        let submission = h.service.regenerate(document.id, SectionId::Summary).await.unwrap();

        assert_eq!(
            submission,
            Submission::Conflict {
                state: SectionState::Generating
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecorded_attempt_is_recovered() {
        let h = harness(ScriptedGenerator::new().delay(SectionId::Summary, Duration::from_millis(50)));
        let document = create(&h).await;

        let run = tokio::spawn({
            let service = h.service.clone();
            let document_id = document.id;
            async move { service.generate(document_id).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.store.set_unavailable(true);
        tokio::time::sleep(Duration::from_secs(5)).await;
        h.store.set_unavailable(false);

        let run = run.await.unwrap().unwrap();
        assert!(!run.outcomes[&SectionId::Summary].is_complete());
        let stuck = h.store.get_section(document.id, SectionId::Summary).await.unwrap();
        assert_eq!(stuck.state, SectionState::Generating);

        // A live attempt is left alone; one that outlived its timeout is expired.
        let again = h.service.generate(document.id).await.unwrap();
        assert_eq!(
            again.outcomes[&SectionId::Summary],
            Outcome::Conflict {
                state: SectionState::Generating
            }
        );
        backdate(&h, document.id, SectionId::Summary).await;
        let again = h.service.generate(document.id).await.unwrap();
        assert!(matches!(
            again.outcomes[&SectionId::Summary],
            Outcome::Error { ref error } if error.kind == ErrorKind::Timeout
        ));

        let submission = h.service.regenerate(document.id, SectionId::Summary).await.unwrap();
        assert!(matches!(submission, Submission::Dispatched { .. }));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let record = h.store.get_section(document.id, SectionId::Summary).await.unwrap();
        assert_eq!(record.state, SectionState::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_expires_abandoned_attempt() {
        let h = harness(ScriptedGenerator::new());
        let document = create(&h).await;
        h.service.generate(document.id).await.unwrap();
        let mut record = h.store.get_section(document.id, SectionId::Skills).await.unwrap();
        record.state = SectionState::Generating;
        record.content = None;
        record.attempt_id = Some(Uuid::new_v4());
        h.store.put_record(&record).await.unwrap();
        backdate(&h, document.id, SectionId::Skills).await;

        let submission = h.service.regenerate(document.id, SectionId::Skills).await.unwrap();
        assert!(matches!(submission, Submission::Dispatched { .. }));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let record = h.store.get_section(document.id, SectionId::Skills).await.unwrap();
        assert_eq!(record.state, SectionState::Complete);
        assert_eq!(h.generator.calls(SectionId::Skills), 2);
    }

    #[tokio::test]
    async fn test_regenerate_locked_section_is_conflict() {
        let h = harness(ScriptedGenerator::new());
        let document = create(&h).await;
        h.store
            .init_sections(document.id, &[required(SectionId::Skills)])
            .await
            .unwrap();

        let submission = h.service.regenerate(document.id, SectionId::Skills).await.unwrap();
        assert_eq!(
            submission,
            Submission::Conflict {
                state: SectionState::Locked
            }
        );
    }

    #[tokio::test]
    async fn test_phase_rules_are_enforced() {
        let h = harness(ScriptedGenerator::new());
        let document = create(&h).await;

        let result = h.service.advance_phase(document.id, DocumentPhase::Offer).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let withdrawn = h
            .service
            .advance_phase(document.id, DocumentPhase::Withdrawn)
            .await
            .unwrap();
        assert_eq!(withdrawn.phase, DocumentPhase::Withdrawn);
    }
}
