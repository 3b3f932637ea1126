//! Orchestrator: drives a document's sections through the worker pool.
//!
//! `run` is the synchronous realization: a `Semaphore` bounds concurrent attempts, each
//! section is a detached task, and the caller waits for terminal outcomes up to an overall
//! deadline. `submit` is the asynchronous one: claim and hand off to a `WorkDispatcher`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::sections::dispatch::WorkDispatcher;
use crate::sections::error::{GenerationError, StoreError};
use crate::sections::models::{
    GenerationRequest, Outcome, SectionError, SectionId, SectionRecord, SectionState,
    Transition,
};
use crate::sections::progress::ProgressSink;
use crate::sections::store::SectionStore;
use crate::sections::worker::SectionWorker;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub budget: usize,
    pub per_section_timeout: Duration,
    /// Per-section overrides of `per_section_timeout`.
    pub section_timeouts: BTreeMap<SectionId, Duration>,
    /// Bounds how long `run` waits; in-flight sections keep going after it.
    pub overall_deadline: Duration,
}

impl RunOptions {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            budget: config.worker_budget,
            per_section_timeout: config.section_timeout,
            section_timeouts: config.section_timeouts.clone(),
            overall_deadline: config.run_deadline,
        }
    }

    pub fn timeout_for(&self, section_id: SectionId) -> Duration {
        self.section_timeouts
            .get(&section_id)
            .copied()
            .unwrap_or(self.per_section_timeout)
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub document_id: Uuid,
    pub outcomes: HashMap<SectionId, Outcome>,
    /// Dispatched but not terminal when the deadline hit. Still running.
    pub pending: Vec<SectionId>,
}

/// Result of handing one section to a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Submission {
    Dispatched { attempt_id: Uuid },
    Conflict { state: SectionState },
    Failed { error: String },
}

pub struct Orchestrator {
    store: Arc<dyn SectionStore>,
    worker: Arc<SectionWorker>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn SectionStore>, worker: Arc<SectionWorker>) -> Self {
        Self { store, worker }
    }

    /// CAS `ready -> generating` with a fresh attempt id. `Conflict` means someone else
    /// owns the section (or it is not unlocked yet).
    pub async fn claim(
        &self,
        document_id: Uuid,
        section_id: SectionId,
    ) -> Result<GenerationRequest, StoreError> {
        claim(self.store.as_ref(), document_id, section_id).await
    }

    /// Runs every listed section and waits for terminal outcomes, at most
    /// `options.overall_deadline`. Duplicate ids are run once.
    pub async fn run(
        &self,
        document_id: Uuid,
        sections: &[SectionId],
        options: RunOptions,
        progress: ProgressSink,
    ) -> RunReport {
        let permits = Arc::new(Semaphore::new(options.budget.max(1)));
        let (tx, mut rx) = mpsc::unbounded_channel::<(SectionId, Outcome)>();
        let mut in_flight = BTreeSet::new();
        let mut seen = HashSet::new();

        for &section_id in sections {
            if !seen.insert(section_id) {
                continue;
            }
            in_flight.insert(section_id);

            let store = self.store.clone();
            let worker = self.worker.clone();
            let permits = permits.clone();
            let progress = progress.clone();
            let tx = tx.clone();
            let timeout = options.timeout_for(section_id);

            tokio::spawn(async move {
                // The semaphore is never closed.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let outcome = match claim(store.as_ref(), document_id, section_id).await {
                    Ok(request) => {
                        progress.emit(document_id, section_id, SectionState::Generating);
                        worker.execute(&request, timeout, &progress).await
                    }
                    Err(StoreError::Conflict {
                        actual: SectionState::Generating,
                        ..
                    }) => match expire_abandoned(store.as_ref(), document_id, section_id, timeout).await {
                        Some(error) => {
                            progress.emit(document_id, section_id, SectionState::Error);
                            Outcome::Error { error }
                        }
                        None => Outcome::Conflict {
                            state: SectionState::Generating,
                        },
                    },
                    Err(StoreError::Conflict { actual, .. }) => {
                        debug!(%document_id, section = %section_id, state = %actual, "section not ready, skipped");
                        Outcome::Conflict { state: actual }
                    }
                    Err(e) => {
                        warn!(%document_id, section = %section_id, error = %e, "could not claim section");
                        Outcome::Error {
                            error: SectionError::upstream(format!("claim failed: {e}")),
                        }
                    }
                };
                // The receiver is gone once the run's deadline passed.
                let _ = tx.send((section_id, outcome));
            });
        }
        drop(tx);

        let mut outcomes = HashMap::new();
        let deadline = tokio::time::sleep(options.overall_deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some((section_id, outcome)) => {
                        in_flight.remove(&section_id);
                        outcomes.insert(section_id, outcome);
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        %document_id,
                        pending = ?in_flight,
                        "run deadline reached, returning with sections still running"
                    );
                    break;
                }
            }
        }

        let completed = outcomes.values().filter(|o| o.is_complete()).count();
        info!(
            %document_id,
            completed,
            finished = outcomes.len(),
            pending = in_flight.len(),
            "generation run finished"
        );

        RunReport {
            document_id,
            outcomes,
            pending: in_flight.into_iter().collect(),
        }
    }

    /// Claims each section and hands the request to `dispatcher` without waiting for it.
    /// A claimed section whose hand-off fails is moved to `error` so it can be retried, as
    /// is one found stuck in `generating` past its timeout.
    pub async fn submit(
        &self,
        document_id: Uuid,
        sections: &[SectionId],
        dispatcher: &dyn WorkDispatcher,
        options: &RunOptions,
    ) -> HashMap<SectionId, Submission> {
        let mut submissions = HashMap::new();
        for &section_id in sections {
            if submissions.contains_key(&section_id) {
                continue;
            }
            let submission = match self.claim(document_id, section_id).await {
                Ok(request) => {
                    let attempt_id = request.attempt_id;
                    match dispatcher.dispatch(request).await {
                        Ok(()) => Submission::Dispatched { attempt_id },
                        Err(e) => {
                            warn!(%document_id, section = %section_id, error = %e, "dispatch failed");
                            let error = SectionError::upstream(format!("dispatch failed: {e}"));
                            if let Err(store_err) = self
                                .store
                                .transition(document_id, section_id, Transition::fail(attempt_id, error))
                                .await
                            {
                                warn!(%document_id, section = %section_id, error = %store_err, "could not release failed dispatch");
                            }
                            Submission::Failed {
                                error: e.to_string(),
                            }
                        }
                    }
                }
                Err(StoreError::Conflict {
                    actual: SectionState::Generating,
                    ..
                }) => {
                    let timeout = options.timeout_for(section_id);
                    let state = match expire_abandoned(self.store.as_ref(), document_id, section_id, timeout).await {
                        Some(_) => SectionState::Error,
                        None => SectionState::Generating,
                    };
                    Submission::Conflict { state }
                }
                Err(StoreError::Conflict { actual, .. }) => Submission::Conflict { state: actual },
                Err(e) => Submission::Failed {
                    error: e.to_string(),
                },
            };
            submissions.insert(section_id, submission);
        }
        submissions
    }
}

/// Headroom past the attempt timeout before an attempt counts as abandoned. Covers the
/// worker's result-write retries.
const ABANDON_GRACE: Duration = Duration::from_secs(5);

/// True when `record` is a `generating` attempt that outlived `timeout` without a result.
pub fn is_abandoned(record: &SectionRecord, timeout: Duration, now: DateTime<Utc>) -> bool {
    if record.state != SectionState::Generating {
        return false;
    }
    match (now - record.updated_at).to_std() {
        Ok(age) => age > timeout + ABANDON_GRACE,
        Err(_) => false,
    }
}

/// CAS `generating -> error{timeout}` for an abandoned attempt (its worker died, panicked
/// or could not record a result). Returns the recorded error when this call expired it.
pub async fn expire_abandoned(
    store: &dyn SectionStore,
    document_id: Uuid,
    section_id: SectionId,
    timeout: Duration,
) -> Option<SectionError> {
    let record = match store.get_section(document_id, section_id).await {
        Ok(record) => record,
        Err(e) => {
            warn!(%document_id, section = %section_id, error = %e, "could not inspect generating section");
            return None;
        }
    };
    let attempt_id = record.attempt_id?;
    if !is_abandoned(&record, timeout, Utc::now()) {
        return None;
    }

    let error = SectionError::from(GenerationError::Timeout {
        after_ms: timeout.as_millis() as u64,
    });
    match store
        .transition(document_id, section_id, Transition::fail(attempt_id, error.clone()))
        .await
    {
        Ok(_) => {
            warn!(
                %document_id,
                section = %section_id,
                %attempt_id,
                since = %record.updated_at,
                "abandoned attempt expired"
            );
            Some(error)
        }
        Err(e) => {
            debug!(%document_id, section = %section_id, error = %e, "abandoned attempt already moved");
            None
        }
    }
}

async fn claim(
    store: &dyn SectionStore,
    document_id: Uuid,
    section_id: SectionId,
) -> Result<GenerationRequest, StoreError> {
    let attempt_id = Uuid::new_v4();
    let record = store
        .transition(document_id, section_id, Transition::dispatch(attempt_id))
        .await?;
    Ok(GenerationRequest {
        document_id,
        section_id,
        mode: record.mode,
        attempt_id,
    })
}
