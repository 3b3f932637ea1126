//! Work dispatch: how a claimed `GenerationRequest` reaches a `SectionWorker`.
//!
//! `InProcessDispatcher` spawns onto this process's bounded pool. `RedisDispatcher` pushes
//! onto a Redis list that `QueueConsumer` loops drain with `BRPOP`. Redis delivery is
//! at-least-once; the worker's attempt check makes redelivery harmless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::sections::error::DispatchError;
use crate::sections::models::{GenerationRequest, Outcome};
use crate::sections::orchestrator::RunOptions;
use crate::sections::progress::ProgressSink;
use crate::sections::worker::SectionWorker;

pub const QUEUE_KEY: &str = "tailor:generation:queue";

/// Seconds a consumer blocks in `BRPOP` before looping.
const POP_TIMEOUT_SECS: u64 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[async_trait]
pub trait WorkDispatcher: Send + Sync {
    /// Hands the request off. Returning `Ok` means it was accepted, not that it ran.
    async fn dispatch(&self, request: GenerationRequest) -> Result<(), DispatchError>;
}

pub struct InProcessDispatcher {
    worker: Arc<SectionWorker>,
    permits: Arc<Semaphore>,
    options: RunOptions,
    progress: ProgressSink,
}

impl InProcessDispatcher {
    pub fn new(worker: Arc<SectionWorker>, options: &RunOptions, progress: ProgressSink) -> Self {
        Self {
            worker,
            permits: Arc::new(Semaphore::new(options.budget.max(1))),
            options: options.clone(),
            progress,
        }
    }
}

#[async_trait]
impl WorkDispatcher for InProcessDispatcher {
    async fn dispatch(&self, request: GenerationRequest) -> Result<(), DispatchError> {
        let worker = self.worker.clone();
        let permits = self.permits.clone();
        let progress = self.progress.clone();
        let timeout = self.options.timeout_for(request.section_id);

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            worker.execute(&request, timeout, &progress).await;
        });
        Ok(())
    }
}

#[derive(Clone)]
pub struct RedisDispatcher {
    client: redis::Client,
}

impl RedisDispatcher {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkDispatcher for RedisDispatcher {
    async fn dispatch(&self, request: GenerationRequest) -> Result<(), DispatchError> {
        let payload = serde_json::to_string(&request)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let depth: i64 = redis::cmd("LPUSH")
            .arg(QUEUE_KEY)
            .arg(&payload)
            .query_async(&mut conn)
            .await?;
        debug!(
            document_id = %request.document_id,
            section = %request.section_id,
            depth,
            "generation request queued"
        );
        Ok(())
    }
}

/// Drains the Redis queue with a fixed number of consumer loops, each running one
/// request at a time.
pub struct QueueConsumer {
    client: redis::Client,
    worker: Arc<SectionWorker>,
    options: RunOptions,
    progress: ProgressSink,
}

impl QueueConsumer {
    pub fn new(
        client: redis::Client,
        worker: Arc<SectionWorker>,
        options: &RunOptions,
        progress: ProgressSink,
    ) -> Self {
        Self {
            client,
            worker,
            options: options.clone(),
            progress,
        }
    }

    pub fn spawn(self, consumers: usize) -> Vec<tokio::task::JoinHandle<()>> {
        let consumer = Arc::new(self);
        (0..consumers.max(1))
            .map(|slot| {
                let consumer = consumer.clone();
                tokio::spawn(async move { consumer.run(slot).await })
            })
            .collect()
    }

    async fn run(&self, slot: usize) {
        info!(slot, queue = QUEUE_KEY, "queue consumer started");
        loop {
            let mut conn = match self.client.get_multiplexed_async_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(slot, error = %e, "redis connect failed, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            loop {
                let popped: redis::RedisResult<Option<(String, String)>> = redis::cmd("BRPOP")
                    .arg(QUEUE_KEY)
                    .arg(POP_TIMEOUT_SECS)
                    .query_async(&mut conn)
                    .await;
                match popped {
                    Ok(Some((_key, payload))) => {
                        self.handle(&payload).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(slot, error = %e, "BRPOP failed, reconnecting");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        break;
                    }
                }
            }
        }
    }

    /// Runs one queued payload. Malformed payloads are logged and dropped.
    pub async fn handle(&self, payload: &str) -> Option<Outcome> {
        let request: GenerationRequest = match serde_json::from_str(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "dropping malformed generation request");
                return None;
            }
        };
        let timeout = self.options.timeout_for(request.section_id);
        Some(self.worker.execute(&request, timeout, &self.progress).await)
    }
}
