//! Section Worker: runs one `GenerationRequest` against the store. Shared by the in-process
//! pool and the queue consumers, so it must tolerate redelivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::sections::error::{GenerationError, ProviderError, StoreError};
use crate::sections::generator::{GenerationInput, Generators};
use crate::sections::models::{
    GenerationRequest, Outcome, SectionContent, SectionError, SectionState, Transition,
};
use crate::sections::progress::ProgressSink;
use crate::sections::providers::{SourceProvider, TargetProvider};
use crate::sections::store::SectionStore;

const RECORD_ATTEMPTS: u32 = 4;
const RECORD_BACKOFF: Duration = Duration::from_millis(100);

pub struct SectionWorker {
    store: Arc<dyn SectionStore>,
    sources: Arc<dyn SourceProvider>,
    targets: Arc<dyn TargetProvider>,
    generators: Generators,
}

impl SectionWorker {
    pub fn new(
        store: Arc<dyn SectionStore>,
        sources: Arc<dyn SourceProvider>,
        targets: Arc<dyn TargetProvider>,
        generators: Generators,
    ) -> Self {
        Self {
            store,
            sources,
            targets,
            generators,
        }
    }

    /// Executes one attempt within `timeout` and records the result with a CAS keyed on the
    /// request's attempt id. A request that is no longer the current attempt is a no-op.
    pub async fn execute(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
        progress: &ProgressSink,
    ) -> Outcome {
        let GenerationRequest {
            document_id,
            section_id,
            attempt_id,
            ..
        } = *request;

        match self.store.get_section(document_id, section_id).await {
            Ok(record)
                if record.state == SectionState::Generating
                    && record.attempt_id == Some(attempt_id) => {}
            Ok(record) => {
                debug!(
                    %document_id,
                    section = %section_id,
                    state = %record.state,
                    "skipping stale or duplicate request"
                );
                return Outcome::Duplicate;
            }
            Err(e) => {
                error!(%document_id, section = %section_id, error = %e, "could not load section record");
                return Outcome::Error {
                    error: SectionError::upstream(format!("store unavailable: {e}")),
                };
            }
        }

        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, self.produce(request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (transition, outcome) = match result {
            Ok(content) => {
                info!(%document_id, section = %section_id, elapsed_ms, "section complete");
                (
                    Transition::complete(attempt_id, content.clone()),
                    Outcome::Complete { content },
                )
            }
            Err(err) => {
                warn!(%document_id, section = %section_id, elapsed_ms, error = %err, "section failed");
                let error = SectionError::from(err);
                (
                    Transition::fail(attempt_id, error.clone()),
                    Outcome::Error { error },
                )
            }
        };

        self.record(request, transition, outcome, progress).await
    }

    /// Writes the attempt's terminal state, retrying outages with exponential backoff.
    /// The returned outcome always matches what the store holds: a result that could not
    /// be persisted is reported as an error, never as complete.
    async fn record(
        &self,
        request: &GenerationRequest,
        transition: Transition,
        outcome: Outcome,
        progress: &ProgressSink,
    ) -> Outcome {
        let GenerationRequest {
            document_id,
            section_id,
            ..
        } = *request;
        let mut delay = RECORD_BACKOFF;
        let mut attempt = 1;

        loop {
            match self
                .store
                .transition(document_id, section_id, transition.clone())
                .await
            {
                Ok(record) => {
                    progress.emit(document_id, section_id, record.state);
                    return outcome;
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    debug!(%document_id, section = %section_id, %actual, "attempt superseded, result dropped");
                    return Outcome::Duplicate;
                }
                Err(e) if e.is_transient() && attempt < RECORD_ATTEMPTS => {
                    warn!(
                        %document_id,
                        section = %section_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "could not record section result, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    error!(%document_id, section = %section_id, attempt, error = %e, "could not record section result");
                    return Outcome::Error {
                        error: SectionError::upstream(format!("result not recorded: {e}")),
                    };
                }
            }
        }
    }

    async fn produce(&self, request: &GenerationRequest) -> Result<SectionContent, GenerationError> {
        let source = self
            .sources
            .get(request.document_id)
            .await
            .map_err(|e| input_error("source", e))?;
        let target = self
            .targets
            .get(request.document_id)
            .await
            .map_err(|e| input_error("target", e))?;

        let input = GenerationInput {
            section_id: request.section_id,
            mode: request.mode,
            source,
            target,
        };
        self.generators.for_mode(request.mode).generate(&input).await
    }
}

fn input_error(what: &str, err: ProviderError) -> GenerationError {
    match err {
        ProviderError::NotFound(_) => GenerationError::MissingSourceData {
            field: what.to_string(),
        },
        ProviderError::Database(e) => GenerationError::Upstream(format!("{what} lookup failed: {e}")),
    }
}
