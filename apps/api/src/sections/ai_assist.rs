//! AI-assisted generation: one completion per section, parsed into the section's schema.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::llm_client::{strip_json_fences, CompletionCapability};
use crate::sections::content::parse_section;
use crate::sections::error::GenerationError;
use crate::sections::generator::{GenerationInput, SectionGenerator};
use crate::sections::models::SectionContent;
use crate::sections::prompts::{build_section_prompt, SECTION_SYSTEM};
use crate::sections::static_extract;

pub struct AiSectionGenerator {
    llm: Arc<dyn CompletionCapability>,
}

impl AiSectionGenerator {
    pub fn new(llm: Arc<dyn CompletionCapability>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SectionGenerator for AiSectionGenerator {
    async fn generate(&self, input: &GenerationInput) -> Result<SectionContent, GenerationError> {
        // No prompt for verbatim-only sections.
        if !input.section_id.supports_ai() {
            return static_extract::extract(
                input.section_id,
                input.mode,
                &input.source,
                &input.target,
            );
        }

        let prompt = build_section_prompt(input.section_id, &input.source, &input.target);
        let text = self
            .llm
            .complete(&prompt, SECTION_SYSTEM)
            .await
            .map_err(|e| GenerationError::Upstream(e.to_string()))?;

        debug!(section = %input.section_id, chars = text.len(), "completion received");
        parse_section(input.section_id, strip_json_fences(&text))
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::llm_client::LlmError;
    use crate::sections::models::{SectionId, SectionMode};

    struct Scripted {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionCapability for Scripted {
        async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.prompts.lock().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(LlmError::Api {
                    status: *status,
                    message: "quota exceeded".to_string(),
                }),
            }
        }
    }

    fn input(section_id: SectionId) -> GenerationInput {
        GenerationInput {
            section_id,
            mode: SectionMode::Ai,
            source: json!({
                "basics": {"name": "Ada"},
                "education": [{"institution": "Home"}]
            }),
            target: json!({"title": "Engineer", "company": "Acme"}),
        }
    }

    #[tokio::test]
    async fn test_fenced_json_is_parsed() {
        let llm = Scripted::replying("```json\n{\"summary\": \"Engineer who ships.\"}\n```");
        let generator = AiSectionGenerator::new(llm.clone());

        let content = generator.generate(&input(SectionId::Summary)).await.unwrap();

        assert_eq!(content["summary"], "Engineer who ships.");
        assert_eq!(llm.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_classified() {
        let generator = AiSectionGenerator::new(Scripted::failing(429));
        let err = generator.generate(&input(SectionId::Skills)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Upstream(msg) if msg.contains("429")));
    }

    #[tokio::test]
    async fn test_raw_text_is_never_passed_through() {
        let generator = AiSectionGenerator::new(Scripted::replying("Sure! Here's a summary."));
        let err = generator.generate(&input(SectionId::Summary)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[tokio::test]
    async fn test_sections_without_prompt_skip_the_model() {
        let llm = Scripted::replying("{}");
        let generator = AiSectionGenerator::new(llm.clone());

        let content = generator.generate(&input(SectionId::Education)).await.unwrap();

        assert_eq!(content["entries"][0]["institution"], "Home");
        assert!(llm.prompts.lock().is_empty());
    }
}
