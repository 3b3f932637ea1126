//! Shared fixtures for the pipeline tests: a scripted generator and a seeded in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::models::document::{Document, ModeOverrides};
use crate::sections::error::GenerationError;
use crate::sections::generator::{GenerationInput, Generators, SectionGenerator};
use crate::sections::models::{
    SectionContent, SectionDescriptor, SectionId, SectionRecord, SectionState, Transition,
};
use crate::sections::orchestrator::Orchestrator;
use crate::sections::providers::InMemoryInputs;
use crate::sections::static_extract::StaticExtractor;
use crate::sections::store::{InMemorySectionStore, SectionStore};
use crate::sections::worker::SectionWorker;

/// Minimal content that satisfies the section's schema.
pub fn content_for(section_id: SectionId) -> SectionContent {
    let value = match section_id {
        SectionId::Contact => json!({"name": "Test Candidate"}),
        SectionId::Summary => json!({"summary": "Engineer with a record of shipping."}),
        SectionId::Skills => json!({"groups": [{"name": "Languages", "keywords": ["Rust"]}]}),
        SectionId::Highlights => json!({"items": ["Led the migration"]}),
        SectionId::Experience => {
            json!({"positions": [{"company": "Acme", "title": "Engineer", "bullets": []}]})
        }
        SectionId::Education => json!({"entries": [{"institution": "State University"}]}),
        SectionId::Awards => json!({"entries": [{"title": "Engineer of the Year"}]}),
        SectionId::CoverLetter => json!({
            "greeting": "Dear Acme hiring team,",
            "paragraphs": ["I would like to apply."],
            "closing": "Sincerely, Test Candidate"
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Sleeps for a per-section delay, then returns the scripted result (success by default).
#[derive(Default)]
pub struct ScriptedGenerator {
    delays: HashMap<SectionId, Duration>,
    failures: HashMap<SectionId, GenerationError>,
    calls: Mutex<HashMap<SectionId, usize>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, section_id: SectionId, delay: Duration) -> Self {
        self.delays.insert(section_id, delay);
        self
    }

    pub fn fail(mut self, section_id: SectionId, error: GenerationError) -> Self {
        self.failures.insert(section_id, error);
        self
    }

    pub fn calls(&self, section_id: SectionId) -> usize {
        self.calls.lock().get(&section_id).copied().unwrap_or(0)
    }

    /// Highest number of attempts that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SectionGenerator for ScriptedGenerator {
    async fn generate(&self, input: &GenerationInput) -> Result<SectionContent, GenerationError> {
        *self.calls.lock().entry(input.section_id).or_default() += 1;
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        if let Some(delay) = self.delays.get(&input.section_id) {
            tokio::time::sleep(*delay).await;
        }
        match self.failures.get(&input.section_id) {
            Some(error) => Err(error.clone()),
            None => Ok(content_for(input.section_id)),
        }
    }
}

pub fn required(section_id: SectionId) -> SectionDescriptor {
    SectionDescriptor {
        id: section_id,
        mode: section_id.default_mode(),
        required: true,
    }
}

/// A document whose sections are initialized and unlocked.
pub struct Fixture {
    pub store: Arc<InMemorySectionStore>,
    pub inputs: Arc<InMemoryInputs>,
    pub generator: Arc<ScriptedGenerator>,
    pub document_id: Uuid,
}

impl Fixture {
    pub async fn new(generator: ScriptedGenerator, sections: &[SectionId]) -> Self {
        let descriptors: Vec<_> = sections.iter().copied().map(required).collect();
        Self::with_descriptors(generator, &descriptors).await
    }

    pub async fn with_descriptors(
        generator: ScriptedGenerator,
        descriptors: &[SectionDescriptor],
    ) -> Self {
        let store = Arc::new(InMemorySectionStore::new());
        let mut document = Document::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            ModeOverrides::new(),
        );
        document.required_sections = descriptors
            .iter()
            .filter(|d| d.required)
            .map(|d| d.id)
            .collect();
        store.create_document(&document).await.unwrap();
        store.init_sections(document.id, descriptors).await.unwrap();
        for descriptor in descriptors {
            store
                .transition(document.id, descriptor.id, Transition::unlock())
                .await
                .unwrap();
        }

        let inputs = Arc::new(InMemoryInputs::new());
        inputs.insert(
            document.id,
            json!({"basics": {"name": "Test Candidate"}}),
            json!({"title": "Engineer", "company": "Acme"}),
        );

        Self {
            store,
            inputs,
            generator: Arc::new(generator),
            document_id: document.id,
        }
    }

    pub fn generators(&self) -> Generators {
        Generators::new(self.generator.clone(), self.generator.clone())
    }

    pub fn worker(&self) -> Arc<SectionWorker> {
        self.worker_with(self.generators())
    }

    pub fn worker_with(&self, generators: Generators) -> Arc<SectionWorker> {
        Arc::new(SectionWorker::new(
            self.store.clone(),
            self.inputs.clone(),
            self.inputs.clone(),
            generators,
        ))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.store.clone(), self.worker())
    }

    /// Static extraction for `manual`/`template` sections, the scripted generator for `ai`.
    pub fn orchestrator_with_static(&self) -> Orchestrator {
        let generators = Generators::new(Arc::new(StaticExtractor), self.generator.clone());
        Orchestrator::new(self.store.clone(), self.worker_with(generators))
    }

    pub async fn record(&self, section_id: SectionId) -> SectionRecord {
        self.store
            .get_section(self.document_id, section_id)
            .await
            .unwrap()
    }

    pub async fn state(&self, section_id: SectionId) -> SectionState {
        self.record(section_id).await.state
    }
}
