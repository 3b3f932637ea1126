//! Fallback Controller: picks the modular pipeline or the legacy sequential pass.
//!
//! Only failures before the first dispatch (document or source lookup, catalog, store
//! outage) switch paths. Once sections are dispatched, per-section errors stay on their
//! records and never trigger the fallback.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::documents::phase::DocumentPhase;
use crate::sections::catalog::identify_sections;
use crate::sections::dispatch::WorkDispatcher;
use crate::sections::error::{PipelineError, StoreError};
use crate::sections::generator::{GenerationInput, Generators};
use crate::sections::models::{
    Outcome, SectionDescriptor, SectionError, SectionId, SectionRecord, SectionState, Transition,
};
use crate::sections::orchestrator::{Orchestrator, RunOptions, Submission};
use crate::sections::progress::ProgressSink;
use crate::sections::providers::{SourceProvider, TargetProvider};
use crate::sections::store::SectionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPath {
    Modular,
    /// Legacy sequential pass. The document is flagged `degraded`.
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRun {
    pub document_id: Uuid,
    pub path: RunPath,
    pub outcomes: HashMap<SectionId, Outcome>,
    pub pending: Vec<SectionId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum AsyncRun {
    Modular {
        document_id: Uuid,
        submissions: HashMap<SectionId, Submission>,
    },
    Degraded {
        run: GenerationRun,
    },
}

enum Start {
    Modular(Vec<SectionId>),
    Degraded(GenerationRun),
}

pub struct FallbackController {
    store: Arc<dyn SectionStore>,
    sources: Arc<dyn SourceProvider>,
    targets: Arc<dyn TargetProvider>,
    generators: Generators,
    orchestrator: Arc<Orchestrator>,
    config: GenerationConfig,
}

impl FallbackController {
    pub fn new(
        store: Arc<dyn SectionStore>,
        sources: Arc<dyn SourceProvider>,
        targets: Arc<dyn TargetProvider>,
        generators: Generators,
        orchestrator: Arc<Orchestrator>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            store,
            sources,
            targets,
            generators,
            orchestrator,
            config,
        }
    }

    /// Runs generation and waits for it, up to the configured run deadline.
    pub async fn generate(
        &self,
        document_id: Uuid,
        progress: ProgressSink,
    ) -> Result<GenerationRun, PipelineError> {
        let sections = match self.start(document_id, &progress).await? {
            Start::Modular(sections) => sections,
            Start::Degraded(run) => return Ok(run),
        };

        let report = self
            .orchestrator
            .run(
                document_id,
                &sections,
                RunOptions::from_config(&self.config),
                progress,
            )
            .await;

        Ok(GenerationRun {
            document_id,
            path: RunPath::Modular,
            outcomes: report.outcomes,
            pending: report.pending,
        })
    }

    /// Claims every section and hands it to `dispatcher` without waiting. The legacy pass
    /// has nothing to hand off, so a degraded start still runs to completion here.
    pub async fn generate_async(
        &self,
        document_id: Uuid,
        dispatcher: &dyn WorkDispatcher,
    ) -> Result<AsyncRun, PipelineError> {
        match self.start(document_id, &ProgressSink::noop()).await? {
            Start::Modular(sections) => {
                let submissions = self
                    .orchestrator
                    .submit(
                        document_id,
                        &sections,
                        dispatcher,
                        &RunOptions::from_config(&self.config),
                    )
                    .await;
                Ok(AsyncRun::Modular {
                    document_id,
                    submissions,
                })
            }
            Start::Degraded(run) => Ok(AsyncRun::Degraded { run }),
        }
    }

    async fn start(&self, document_id: Uuid, progress: &ProgressSink) -> Result<Start, PipelineError> {
        if !self.config.modular_enabled {
            info!(%document_id, path = "legacy", "modular generation disabled");
            return Ok(Start::Degraded(self.run_legacy(document_id, progress).await));
        }

        match self.prepare(document_id).await {
            Ok(sections) => Ok(Start::Modular(sections)),
            // An unknown document is the caller's problem, not a pipeline failure.
            Err(e @ PipelineError::Store(StoreError::NotFound(_))) => Err(e),
            Err(e) if self.config.fallback_enabled => {
                warn!(
                    %document_id,
                    path = "legacy",
                    error = %e,
                    "pipeline could not start, falling back to sequential generation"
                );
                Ok(Start::Degraded(self.run_legacy(document_id, progress).await))
            }
            Err(e) => Err(e),
        }
    }

    /// Catalog, record initialization and unlock. Returns the sections to run.
    pub async fn prepare(&self, document_id: Uuid) -> Result<Vec<SectionId>, PipelineError> {
        let mut document = self.store.get_document(document_id).await?;
        let source = self.sources.get(document_id).await?;
        let descriptors = identify_sections(&source, &document.mode_overrides)?;
        let records = self.store.init_sections(document_id, &descriptors).await?;

        document.required_sections = descriptors
            .iter()
            .filter(|d| d.required)
            .map(|d| d.id)
            .collect();
        document.degraded = false;
        if !document.phase.is_submitted() {
            document.advance_phase(DocumentPhase::Generating);
        }
        self.store.update_document(&document).await?;

        for record in records.iter().filter(|r| r.state == SectionState::Locked) {
            match self
                .store
                .transition(document_id, record.section_id, Transition::unlock())
                .await
            {
                Ok(_) | Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(descriptors.into_iter().map(|d| d.id).collect())
    }

    /// One sequential pass in canonical order with default modes. No timeouts, no CAS:
    /// each record is written straight to `complete` or `error`.
    async fn run_legacy(&self, document_id: Uuid, progress: &ProgressSink) -> GenerationRun {
        warn!(%document_id, path = "legacy", "running degraded sequential generation");

        let source = self
            .sources
            .get(document_id)
            .await
            .unwrap_or_else(|e| {
                warn!(%document_id, path = "legacy", error = %e, "source unavailable");
                Value::Null
            });
        let target = self
            .targets
            .get(document_id)
            .await
            .unwrap_or_else(|e| {
                warn!(%document_id, path = "legacy", error = %e, "target unavailable");
                Value::Null
            });

        let mut outcomes = HashMap::new();
        for section_id in SectionId::ALL {
            let descriptor = SectionDescriptor {
                id: section_id,
                mode: section_id.default_mode(),
                required: section_id != SectionId::Highlights,
            };
            let input = GenerationInput {
                section_id,
                mode: descriptor.mode,
                source: source.clone(),
                target: target.clone(),
            };

            let mut record = SectionRecord::locked(document_id, &descriptor);
            let outcome = match self.generators.for_mode(descriptor.mode).generate(&input).await {
                Ok(content) => {
                    record.state = SectionState::Complete;
                    record.content = Some(content.clone());
                    Outcome::Complete { content }
                }
                Err(err) => {
                    let error = SectionError::from(err);
                    record.state = SectionState::Error;
                    record.last_error = Some(error.clone());
                    Outcome::Error { error }
                }
            };

            if let Err(e) = self.store.put_record(&record).await {
                warn!(%document_id, section = %section_id, path = "legacy", error = %e, "could not persist section");
            }
            progress.emit(document_id, section_id, record.state);
            outcomes.insert(section_id, outcome);
        }

        match self.store.get_document(document_id).await {
            Ok(mut document) => {
                document.degraded = true;
                document.required_sections = SectionId::ALL
                    .into_iter()
                    .filter(|id| *id != SectionId::Highlights)
                    .collect();
                if !document.phase.is_submitted() {
                    document.advance_phase(DocumentPhase::Generating);
                }
                if let Err(e) = self.store.update_document(&document).await {
                    warn!(%document_id, path = "legacy", error = %e, "could not flag document as degraded");
                }
            }
            Err(e) => {
                warn!(%document_id, path = "legacy", error = %e, "could not flag document as degraded");
            }
        }

        let completed = outcomes.values().filter(|o| o.is_complete()).count();
        warn!(%document_id, path = "legacy", completed, total = outcomes.len(), "degraded run finished");

        GenerationRun {
            document_id,
            path: RunPath::Degraded,
            outcomes,
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sections::test_support::{Fixture, ScriptedGenerator};

    fn controller(fixture: &Fixture, config: GenerationConfig) -> FallbackController {
        FallbackController::new(
            fixture.store.clone(),
            fixture.inputs.clone(),
            fixture.inputs.clone(),
            fixture.generators(),
            Arc::new(fixture.orchestrator()),
            config,
        )
    }

    fn break_catalog(fixture: &Fixture) {
        fixture.inputs.insert(
            fixture.document_id,
            json!("not a resume"),
            json!({"title": "Engineer", "company": "Acme"}),
        );
    }

    #[tokio::test]
    async fn test_modular_path_catalogs_and_runs_sections() {
        let fixture = Fixture::new(ScriptedGenerator::new(), &[]).await;

        let run = controller(&fixture, GenerationConfig::default())
            .generate(fixture.document_id, ProgressSink::noop())
            .await
            .unwrap();

        assert_eq!(run.path, RunPath::Modular);
        // Name only: contact plus the three mandatory sections.
        assert_eq!(run.outcomes.len(), 4);
        assert!(run.outcomes.values().all(Outcome::is_complete));
        let document = fixture.store.get_document(fixture.document_id).await.unwrap();
        assert_eq!(document.phase, DocumentPhase::Generating);
        assert!(!document.degraded);
        assert_eq!(
            document.required_sections,
            vec![SectionId::Contact, SectionId::Summary, SectionId::Skills, SectionId::CoverLetter]
        );
    }

    #[tokio::test]
    async fn test_catalog_failure_falls_back_to_degraded_run() {
        let fixture = Fixture::new(ScriptedGenerator::new(), &[]).await;
        break_catalog(&fixture);

        let run = controller(&fixture, GenerationConfig::default())
            .generate(fixture.document_id, ProgressSink::noop())
            .await
            .unwrap();

        assert_eq!(run.path, RunPath::Degraded);
        assert_eq!(run.outcomes.len(), SectionId::ALL.len());
        let records = fixture.store.list_sections(fixture.document_id).await.unwrap();
        assert_eq!(records.len(), SectionId::ALL.len());
        assert!(records.iter().all(|r| r.state.is_terminal()));
        let document = fixture.store.get_document(fixture.document_id).await.unwrap();
        assert!(document.degraded);
    }

    #[tokio::test]
    async fn test_store_outage_still_returns_terminal_outcomes() {
        let fixture = Fixture::new(ScriptedGenerator::new(), &[]).await;
        fixture.store.set_unavailable(true);

        let run = controller(&fixture, GenerationConfig::default())
            .generate(fixture.document_id, ProgressSink::noop())
            .await
            .unwrap();

        assert_eq!(run.path, RunPath::Degraded);
        assert!(run
            .outcomes
            .values()
            .all(|o| matches!(o, Outcome::Complete { .. } | Outcome::Error { .. })));
    }

    #[tokio::test]
    async fn test_fallback_disabled_propagates_error() {
        let fixture = Fixture::new(ScriptedGenerator::new(), &[]).await;
        break_catalog(&fixture);
        let config = GenerationConfig {
            fallback_enabled: false,
            ..GenerationConfig::default()
        };

        let result = controller(&fixture, config)
            .generate(fixture.document_id, ProgressSink::noop())
            .await;

        assert!(matches!(result, Err(PipelineError::Catalog(_))));
        let records = fixture.store.list_sections(fixture.document_id).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_modular_disabled_goes_straight_to_legacy() {
        let fixture = Fixture::new(ScriptedGenerator::new(), &[]).await;
        let config = GenerationConfig {
            modular_enabled: false,
            ..GenerationConfig::default()
        };

        let run = controller(&fixture, config)
            .generate(fixture.document_id, ProgressSink::noop())
            .await
            .unwrap();

        assert_eq!(run.path, RunPath::Degraded);
        assert_eq!(fixture.generator.calls(SectionId::Awards), 1);
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_a_fallback() {
        let fixture = Fixture::new(ScriptedGenerator::new(), &[]).await;

        let result = controller(&fixture, GenerationConfig::default())
            .generate(Uuid::new_v4(), ProgressSink::noop())
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Store(StoreError::NotFound(_)))
        ));
    }
}
