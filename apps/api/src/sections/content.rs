//! Typed content schemas per section, plus the markup guard.
//!
//! Content is structured data only. Presentation (LaTeX, Markdown) is added by the
//! renderer, so no string stored here may carry markup of its own.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sections::error::GenerationError;
use crate::sections::models::{SectionContent, SectionId};

fn is_false(value: &bool) -> bool {
    !*value
}

/// A section schema. `validate` rejects output that parsed but says nothing.
pub trait SectionSchema: Serialize + DeserializeOwned {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactContent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl SectionSchema for ContactContent {
    fn validate(&self) -> Result<(), String> {
        require(!self.name.trim().is_empty(), "contact name is empty")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryContent {
    pub summary: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl SectionSchema for SummaryContent {
    fn validate(&self) -> Result<(), String> {
        require(!self.summary.trim().is_empty(), "summary is empty")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillGroup {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsContent {
    pub groups: Vec<SkillGroup>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl SectionSchema for SkillsContent {
    fn validate(&self) -> Result<(), String> {
        require(!self.groups.is_empty(), "no skill groups")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighlightsContent {
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl SectionSchema for HighlightsContent {
    fn validate(&self) -> Result<(), String> {
        require(!self.items.is_empty(), "no highlights")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub company: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceContent {
    pub positions: Vec<Position>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl SectionSchema for ExperienceContent {
    fn validate(&self) -> Result<(), String> {
        require(!self.positions.is_empty(), "no positions")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationContent {
    pub entries: Vec<EducationEntry>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl SectionSchema for EducationContent {
    fn validate(&self) -> Result<(), String> {
        require(!self.entries.is_empty(), "no education entries")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awarder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwardsContent {
    pub entries: Vec<Award>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl SectionSchema for AwardsContent {
    fn validate(&self) -> Result<(), String> {
        require(!self.entries.is_empty(), "no awards")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverLetterContent {
    pub greeting: String,
    pub paragraphs: Vec<String>,
    pub closing: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl SectionSchema for CoverLetterContent {
    fn validate(&self) -> Result<(), String> {
        require(
            self.paragraphs.iter().any(|p| !p.trim().is_empty()),
            "cover letter has no body",
        )
    }
}

fn require(condition: bool, message: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_string())
    }
}

/// Serializes a schema value into the map stored on the record.
pub fn to_content<T: Serialize>(value: &T) -> Result<SectionContent, GenerationError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GenerationError::Parse("content is not an object".to_string())),
        Err(e) => Err(GenerationError::Parse(e.to_string())),
    }
}

fn parse_as<T: SectionSchema>(text: &str) -> Result<SectionContent, GenerationError> {
    let parsed: T =
        serde_json::from_str(text).map_err(|e| GenerationError::Parse(e.to_string()))?;
    parsed.validate().map_err(GenerationError::Parse)?;
    let content = to_content(&parsed)?;
    ensure_markup_free(&content).map_err(GenerationError::Parse)?;
    Ok(content)
}

/// Parses model output into the section's schema. Anything that is not valid,
/// non-empty, markup-free JSON of the right shape is a `Parse` error.
pub fn parse_section(section_id: SectionId, text: &str) -> Result<SectionContent, GenerationError> {
    match section_id {
        SectionId::Contact => parse_as::<ContactContent>(text),
        SectionId::Summary => parse_as::<SummaryContent>(text),
        SectionId::Skills => parse_as::<SkillsContent>(text),
        SectionId::Highlights => parse_as::<HighlightsContent>(text),
        SectionId::Experience => parse_as::<ExperienceContent>(text),
        SectionId::Education => parse_as::<EducationContent>(text),
        SectionId::Awards => parse_as::<AwardsContent>(text),
        SectionId::CoverLetter => parse_as::<CoverLetterContent>(text),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Markup guard
// ────────────────────────────────────────────────────────────────────────────

/// Walks every string in the content and reports the first one carrying markup.
pub fn ensure_markup_free(content: &SectionContent) -> Result<(), String> {
    content
        .iter()
        .try_for_each(|(key, value)| check_value(value).map_err(|s| format!("{key}: {s:?}")))
}

fn check_value(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if contains_markup(s) => Err(s.clone()),
        Value::Array(values) => values.iter().try_for_each(check_value),
        Value::Object(map) => map.values().try_for_each(check_value),
        _ => Ok(()),
    }
}

/// LaTeX commands, HTML tags, Markdown emphasis/code/headings.
pub fn contains_markup(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let latex = chars
        .windows(2)
        .any(|w| w[0] == '\\' && w[1].is_ascii_alphabetic());
    let html = chars.windows(2).enumerate().any(|(i, w)| {
        w[0] == '<' && (w[1].is_ascii_alphabetic() || w[1] == '/') && chars[i..].contains(&'>')
    });
    let markdown = s.contains("**")
        || s.contains("__")
        || s.contains('`')
        || s.lines().any(|line| heading_text(line).is_some());
    latex || html || markdown
}

/// The text of a Markdown ATX heading (`#` to `######` then whitespace). `#1 in sales`
/// is prose, not a heading.
fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed.trim_start_matches('#');
    let level = trimmed.len() - rest.len();
    if (1..=6).contains(&level) && rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Strips markup from verbatim source text so static content obeys the same rule.
pub fn sanitize_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic()) => {
                while chars.peek().is_some_and(|n| n.is_ascii_alphabetic()) {
                    chars.next();
                }
            }
            '<' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '/') => {
                for skipped in chars.by_ref() {
                    if skipped == '>' {
                        break;
                    }
                }
            }
            '{' | '}' | '`' => {}
            '*' | '_' if chars.peek() == Some(&c) => {
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out.lines()
        .map(|line| heading_text(line).unwrap_or(line).trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
