use std::sync::Arc;

use async_trait::async_trait;

use crate::llm_client::CompletionCapability;
use crate::sections::ai_assist::AiSectionGenerator;
use crate::sections::error::GenerationError;
use crate::sections::models::{
    SectionContent, SectionId, SectionMode, SourceDocument, TargetContext,
};
use crate::sections::static_extract::StaticExtractor;

/// Everything one generation attempt reads. Resolved by the worker, owned so it can cross
/// task boundaries.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub section_id: SectionId,
    pub mode: SectionMode,
    pub source: SourceDocument,
    pub target: TargetContext,
}

/// Produces content for one section. Must not touch the store: the worker owns state.
#[async_trait]
pub trait SectionGenerator: Send + Sync {
    async fn generate(&self, input: &GenerationInput) -> Result<SectionContent, GenerationError>;
}

/// The two generation capabilities, selected per section by mode.
#[derive(Clone)]
pub struct Generators {
    manual: Arc<dyn SectionGenerator>,
    ai: Arc<dyn SectionGenerator>,
}

impl Generators {
    pub fn new(manual: Arc<dyn SectionGenerator>, ai: Arc<dyn SectionGenerator>) -> Self {
        Self { manual, ai }
    }

    pub fn from_completion(llm: Arc<dyn CompletionCapability>) -> Self {
        Self::new(
            Arc::new(StaticExtractor),
            Arc::new(AiSectionGenerator::new(llm)),
        )
    }

    /// `Template` belongs to static extraction.
    pub fn for_mode(&self, mode: SectionMode) -> &dyn SectionGenerator {
        match mode {
            SectionMode::Manual | SectionMode::Template => self.manual.as_ref(),
            SectionMode::Ai => self.ai.as_ref(),
        }
    }
}
