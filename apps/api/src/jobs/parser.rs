//! Posting parser: extracts title, company, requirements, keywords and tone from raw text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::jobs::prompts::{POSTING_PARSE_PROMPT_TEMPLATE, POSTING_PARSE_SYSTEM};
use crate::llm_client::{strip_json_fences, CompletionCapability};

/// Detected tone of a posting. Drives verb selection in section prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingTone {
    AggressiveStartup,
    #[default]
    CollaborativeEnterprise,
    ResearchOriented,
    ProductOriented,
}

impl PostingTone {
    /// Reads the tone out of a target context; unknown or missing means the default.
    pub fn from_target(target: &Value) -> Self {
        target
            .pointer("/parsed/detected_tone")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub text: String,
    pub is_required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleSignals {
    pub is_startup: bool,
    pub is_ic_focused: bool,
    pub is_research: bool,
    pub seniority: String,
}

/// A keyword from the posting, weighted by position and frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub frequency: u32,
    /// title=1.0, requirements=0.8, responsibilities=0.6, about=0.3
    pub position_weight: f32,
    /// frequency * position_weight
    pub weighted_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPosting {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    pub hard_requirements: Vec<Requirement>,
    #[serde(default)]
    pub soft_signals: Vec<String>,
    #[serde(default)]
    pub role_signals: RoleSignals,
    #[serde(default)]
    pub keyword_inventory: Vec<KeywordEntry>,
    #[serde(default)]
    pub detected_tone: PostingTone,
}

impl ParsedPosting {
    /// Highest-weighted keywords first.
    pub fn top_keywords(&self, limit: usize) -> Vec<&str> {
        let mut entries: Vec<&KeywordEntry> = self.keyword_inventory.iter().collect();
        entries.sort_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score));
        entries
            .into_iter()
            .take(limit)
            .map(|e| e.keyword.as_str())
            .collect()
    }
}

/// Parses a raw posting through the completion capability.
pub async fn parse_posting(
    posting_text: &str,
    llm: &dyn CompletionCapability,
) -> Result<ParsedPosting, AppError> {
    let prompt = POSTING_PARSE_PROMPT_TEMPLATE.replace("{posting_text}", posting_text);
    let text = llm
        .complete(&prompt, POSTING_PARSE_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("posting parsing failed: {e}")))?;
    serde_json::from_str(strip_json_fences(&text))
        .map_err(|e| AppError::Llm(format!("posting parsing returned invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::llm_client::LlmError;

    const PARSED: &str = r#"{
        "title": "Senior Rust Engineer",
        "company": "Ferrous Systems",
        "hard_requirements": [
            {"text": "5+ years Rust", "is_required": true},
            {"text": "Systems programming", "is_required": true}
        ],
        "soft_signals": ["Kubernetes experience", "Kafka"],
        "role_signals": {
            "is_startup": true,
            "is_ic_focused": true,
            "is_research": false,
            "seniority": "senior"
        },
        "keyword_inventory": [
            {"keyword": "distributed systems", "frequency": 2, "position_weight": 0.6, "weighted_score": 1.2},
            {"keyword": "Rust", "frequency": 5, "position_weight": 0.8, "weighted_score": 4.0}
        ],
        "detected_tone": "AggressiveStartup"
    }"#;

    struct Canned(String);

    #[async_trait]
    impl CompletionCapability for Canned {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_posting_tone_serde() {
        let tone: PostingTone = serde_json::from_str(r#""ResearchOriented""#).unwrap();
        assert_eq!(tone, PostingTone::ResearchOriented);
        assert_eq!(PostingTone::default(), PostingTone::CollaborativeEnterprise);
    }

    #[test]
    fn test_parsed_posting_deserializes() {
        let parsed: ParsedPosting = serde_json::from_str(PARSED).unwrap();
        assert_eq!(parsed.company, "Ferrous Systems");
        assert_eq!(parsed.detected_tone, PostingTone::AggressiveStartup);
        assert_eq!(parsed.hard_requirements.len(), 2);
        assert!(parsed.role_signals.is_startup);
    }

    #[test]
    fn test_top_keywords_orders_by_weighted_score() {
        let parsed: ParsedPosting = serde_json::from_str(PARSED).unwrap();
        assert_eq!(parsed.top_keywords(1), vec!["Rust"]);
        assert_eq!(parsed.top_keywords(5).len(), 2);
    }

    #[test]
    fn test_tone_from_target_context() {
        let target = json!({"parsed": {"detected_tone": "ProductOriented"}});
        assert_eq!(PostingTone::from_target(&target), PostingTone::ProductOriented);
        assert_eq!(
            PostingTone::from_target(&json!({})),
            PostingTone::CollaborativeEnterprise
        );
    }

    #[tokio::test]
    async fn test_parse_posting_accepts_fenced_json() {
        let fenced = format!("```json\n{PARSED}\n```");
        let parsed = parse_posting("Senior Rust Engineer...", &Canned(fenced))
            .await
            .unwrap();
        assert_eq!(parsed.title, "Senior Rust Engineer");
    }

    #[tokio::test]
    async fn test_parse_posting_rejects_prose() {
        let result = parse_posting("anything", &Canned("I could not parse that.".to_string())).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }
}
