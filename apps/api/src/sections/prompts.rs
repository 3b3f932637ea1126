// Section generation prompts. Reuses cross-cutting fragments from llm_client::prompts.

use serde_json::{json, Value};

use crate::jobs::parser::{ParsedPosting, PostingTone};
use crate::jobs::tone::tone_guidance;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, PLAIN_TEXT_INSTRUCTION};
use crate::sections::models::{SectionId, SourceDocument, TargetContext};

/// System prompt for every section. JSON only.
pub const SECTION_SYSTEM: &str = "You are an expert resume writer tailoring one section \
    of a resume or cover letter to a specific job posting. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT invent facts not present in the candidate data.";

/// Replace: {grounding_instruction}, {plain_text_instruction}, {tone}, {role},
///          {keywords}, {candidate_json}, {task}, {schema}
const SECTION_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

{plain_text_instruction}

{tone}

TARGET ROLE: {role}

POSTING KEYWORDS to incorporate naturally (do NOT keyword-stuff):
{keywords}

CANDIDATE DATA (source of truth, ONLY use facts from here):
{candidate_json}

TASK: {task}

Return a JSON object with this EXACT schema (no extra fields):
{schema}"#;

const KEYWORD_LIMIT: usize = 12;

fn task(section_id: SectionId) -> &'static str {
    match section_id {
        SectionId::Summary => {
            "Write a 2-3 sentence professional summary aimed at this role."
        }
        SectionId::Skills => {
            "Group the candidate's skills for this role. Put the most relevant group first \
             and drop skills that do not matter for it."
        }
        SectionId::Highlights => {
            "Pick at most 5 career highlights that best match this role and tighten their wording."
        }
        SectionId::Experience => {
            "Rewrite each position's bullets to emphasize what matters for this role. \
             Keep every company, title and date exactly as given. At most 4 bullets per position."
        }
        SectionId::CoverLetter => {
            "Write a concise cover letter of 3-4 paragraphs for this role."
        }
        SectionId::Contact | SectionId::Education | SectionId::Awards => {
            "Return the data reshaped into the schema without changes."
        }
    }
}

fn schema(section_id: SectionId) -> &'static str {
    match section_id {
        SectionId::Contact => r#"{"name": "...", "email": "...", "profiles": [{"network": "...", "url": "..."}]}"#,
        SectionId::Summary => r#"{"summary": "..."}"#,
        SectionId::Skills => r#"{"groups": [{"name": "Languages", "keywords": ["Rust", "Go"]}]}"#,
        SectionId::Highlights => r#"{"items": ["..."]}"#,
        SectionId::Experience => {
            r#"{"positions": [{"company": "...", "title": "...", "start_date": "...", "end_date": "...", "bullets": ["..."]}]}"#
        }
        SectionId::Education => r#"{"entries": [{"institution": "...", "area": "...", "study_type": "..."}]}"#,
        SectionId::Awards => r#"{"entries": [{"title": "...", "awarder": "...", "date": "..."}]}"#,
        SectionId::CoverLetter => {
            r#"{"greeting": "Dear ... team,", "paragraphs": ["...", "..."], "closing": "Sincerely, <name>"}"#
        }
    }
}

/// The slice of the source a section's prompt is allowed to see.
fn candidate_slice(section_id: SectionId, source: &SourceDocument) -> Value {
    let pick = |keys: &[&str]| {
        let mut slice = serde_json::Map::new();
        for key in keys {
            if let Some(value) = source.get(*key) {
                slice.insert((*key).to_string(), value.clone());
            }
        }
        Value::Object(slice)
    };
    match section_id {
        SectionId::Contact => pick(&["basics"]),
        SectionId::Summary => pick(&["basics", "work", "skills"]),
        SectionId::Skills => pick(&["skills", "work"]),
        SectionId::Highlights | SectionId::Experience => pick(&["work"]),
        SectionId::Education => pick(&["education"]),
        SectionId::Awards => pick(&["awards"]),
        SectionId::CoverLetter => pick(&["basics", "work", "skills", "coverLetter"]),
    }
}

fn role(target: &TargetContext) -> String {
    let field = |key: &str| {
        target
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("unspecified")
            .to_string()
    };
    format!("{} at {}", field("title"), field("company"))
}

/// Builds the user prompt for one section.
pub fn build_section_prompt(
    section_id: SectionId,
    source: &SourceDocument,
    target: &TargetContext,
) -> String {
    let tone = match section_id {
        SectionId::Summary | SectionId::Experience | SectionId::CoverLetter => {
            tone_guidance(PostingTone::from_target(target))
        }
        _ => String::new(),
    };
    let keywords = target
        .get("parsed")
        .cloned()
        .and_then(|parsed| serde_json::from_value::<ParsedPosting>(parsed).ok())
        .map(|parsed| json!(parsed.top_keywords(KEYWORD_LIMIT)))
        .unwrap_or_else(|| json!([]));
    let candidate = serde_json::to_string_pretty(&candidate_slice(section_id, source))
        .unwrap_or_else(|_| "{}".to_string());

    SECTION_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{plain_text_instruction}", PLAIN_TEXT_INSTRUCTION)
        .replace("{tone}", &tone)
        .replace("{role}", &role(target))
        .replace("{keywords}", &keywords.to_string())
        .replace("{candidate_json}", &candidate)
        .replace("{task}", task(section_id))
        .replace("{schema}", schema(section_id))
}
