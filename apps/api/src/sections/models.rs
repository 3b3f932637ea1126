//! Section-level data model shared by the catalog, store, workers and aggregator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// A structured resume (JSON Resume shaped mapping). Arbitrary JSON; readers are lenient.
pub type SourceDocument = Value;

/// The target of tailoring: an ingested job posting (title, company, description, parsed).
pub type TargetContext = Value;

/// Named fields produced for one section. Schema is section-specific; never carries markup.
pub type SectionContent = Map<String, Value>;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers and enums
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    Contact,
    Summary,
    Skills,
    Highlights,
    Experience,
    Education,
    Awards,
    CoverLetter,
}

impl SectionId {
    /// Canonical document order.
    pub const ALL: [SectionId; 8] = [
        SectionId::Contact,
        SectionId::Summary,
        SectionId::Skills,
        SectionId::Highlights,
        SectionId::Experience,
        SectionId::Education,
        SectionId::Awards,
        SectionId::CoverLetter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionId::Contact => "contact",
            SectionId::Summary => "summary",
            SectionId::Skills => "skills",
            SectionId::Highlights => "highlights",
            SectionId::Experience => "experience",
            SectionId::Education => "education",
            SectionId::Awards => "awards",
            SectionId::CoverLetter => "cover_letter",
        }
    }

    /// Sections every document carries, even when the source has nothing for them.
    pub fn is_mandatory(&self) -> bool {
        matches!(
            self,
            SectionId::Summary | SectionId::Skills | SectionId::CoverLetter
        )
    }

    /// Sections with an AI prompt. The rest are always verbatim.
    pub fn supports_ai(&self) -> bool {
        matches!(
            self,
            SectionId::Summary
                | SectionId::Skills
                | SectionId::Highlights
                | SectionId::Experience
                | SectionId::CoverLetter
        )
    }

    /// Mode used when nothing else decides (legacy path, catalog defaults).
    pub fn default_mode(&self) -> SectionMode {
        if self.supports_ai() {
            SectionMode::Ai
        } else {
            SectionMode::Manual
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionId {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "section id",
                value: s.to_string(),
            })
    }
}

/// Lifecycle state of one section. See `state_machine` for legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    Locked,
    Ready,
    Generating,
    Complete,
    Error,
}

impl SectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionState::Locked => "locked",
            SectionState::Ready => "ready",
            SectionState::Generating => "generating",
            SectionState::Complete => "complete",
            SectionState::Error => "error",
        }
    }

    /// Terminal for a single attempt (the section may still be re-dispatched later).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SectionState::Complete | SectionState::Error)
    }
}

impl fmt::Display for SectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "locked" => Ok(SectionState::Locked),
            "ready" => Ok(SectionState::Ready),
            "generating" => Ok(SectionState::Generating),
            "complete" => Ok(SectionState::Complete),
            "error" => Ok(SectionState::Error),
            other => Err(UnknownVariant {
                kind: "section state",
                value: other.to_string(),
            }),
        }
    }
}

/// How a section's content is produced.
///
/// `Template` is the placeholder producer the catalog picks for a mandatory section whose
/// source fields are absent. It belongs to the static-extraction capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionMode {
    Manual,
    Ai,
    Template,
}

impl SectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionMode::Manual => "manual",
            SectionMode::Ai => "ai",
            SectionMode::Template => "template",
        }
    }
}

impl FromStr for SectionMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SectionMode::Manual),
            "ai" => Ok(SectionMode::Ai),
            "template" => Ok(SectionMode::Template),
            other => Err(UnknownVariant {
                kind: "section mode",
                value: other.to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors captured on a record
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingSourceData,
    Upstream,
    Parse,
    Timeout,
}

/// Structured cause stored in `SectionRecord::last_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SectionError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Upstream,
            message: message.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Records, descriptors, requests
// ────────────────────────────────────────────────────────────────────────────

/// What the catalog decided for one section of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDescriptor {
    pub id: SectionId,
    pub mode: SectionMode,
    /// Only required sections gate assembly.
    pub required: bool,
}

/// System of record for one (document, section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub document_id: Uuid,
    pub section_id: SectionId,
    pub state: SectionState,
    pub mode: SectionMode,
    /// Present only when `state == Complete`.
    pub content: Option<SectionContent>,
    /// Present only when `state == Error`.
    pub last_error: Option<SectionError>,
    /// Minted on `ready -> generating`; completion writes must match it.
    pub attempt_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl SectionRecord {
    pub fn locked(document_id: Uuid, descriptor: &SectionDescriptor) -> Self {
        Self {
            document_id,
            section_id: descriptor.id,
            state: SectionState::Locked,
            mode: descriptor.mode,
            content: None,
            last_error: None,
            attempt_id: None,
            updated_at: Utc::now(),
        }
    }
}

/// Ephemeral task descriptor. Inputs are resolved by the worker so the request fits in a
/// queue message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub document_id: Uuid,
    pub section_id: SectionId,
    pub mode: SectionMode,
    pub attempt_id: Uuid,
}

/// A conditional write against a `SectionRecord`.
///
/// Applies only when the record is currently in `from` and, for writes out of
/// `Generating`, carries the same `attempt_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: SectionState,
    pub to: SectionState,
    pub attempt_id: Option<Uuid>,
    pub content: Option<SectionContent>,
    pub last_error: Option<SectionError>,
}

impl Transition {
    fn new(from: SectionState, to: SectionState) -> Self {
        Self {
            from,
            to,
            attempt_id: None,
            content: None,
            last_error: None,
        }
    }

    pub fn unlock() -> Self {
        Self::new(SectionState::Locked, SectionState::Ready)
    }

    pub fn dispatch(attempt_id: Uuid) -> Self {
        Self {
            attempt_id: Some(attempt_id),
            ..Self::new(SectionState::Ready, SectionState::Generating)
        }
    }

    pub fn complete(attempt_id: Uuid, content: SectionContent) -> Self {
        Self {
            attempt_id: Some(attempt_id),
            content: Some(content),
            ..Self::new(SectionState::Generating, SectionState::Complete)
        }
    }

    pub fn fail(attempt_id: Uuid, error: SectionError) -> Self {
        Self {
            attempt_id: Some(attempt_id),
            last_error: Some(error),
            ..Self::new(SectionState::Generating, SectionState::Error)
        }
    }

    /// Regeneration (`complete -> ready`) or retry (`error -> ready`).
    pub fn reset(from: SectionState) -> Self {
        Self::new(from, SectionState::Ready)
    }

    /// True when the record is in the state (and attempt) this write was computed against.
    pub fn matches(&self, record: &SectionRecord) -> bool {
        record.state == self.from
            && (self.from != SectionState::Generating || record.attempt_id == self.attempt_id)
    }

    /// Applies the write. Callers must have checked `matches` and the state machine.
    pub fn apply(self, record: &mut SectionRecord) {
        record.state = self.to;
        if self.to == SectionState::Generating {
            record.attempt_id = self.attempt_id;
        }
        record.content = match self.to {
            SectionState::Complete => self.content,
            _ => None,
        };
        record.last_error = match self.to {
            SectionState::Error => self.last_error,
            _ => None,
        };
        record.updated_at = Utc::now();
    }
}

/// Per-section result reported by the orchestrator and the workers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Complete { content: SectionContent },
    Error { error: SectionError },
    /// The section was not `ready` when dispatch was attempted.
    Conflict { state: SectionState },
    /// A redelivered or superseded request; nothing was written.
    Duplicate,
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete { .. })
    }
}

/// Emitted on every state transition driven by a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionProgress {
    pub document_id: Uuid,
    pub section_id: SectionId,
    pub state: SectionState,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: SectionState, attempt_id: Option<Uuid>) -> SectionRecord {
        SectionRecord {
            document_id: Uuid::new_v4(),
            section_id: SectionId::Summary,
            state,
            mode: SectionMode::Ai,
            content: None,
            last_error: None,
            attempt_id,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_section_id_round_trips_through_str() {
        for id in SectionId::ALL {
            assert_eq!(id.as_str().parse::<SectionId>().unwrap(), id);
        }
        assert!("references".parse::<SectionId>().is_err());
    }

    #[test]
    fn test_section_id_serializes_snake_case() {
        let json = serde_json::to_string(&SectionId::CoverLetter).unwrap();
        assert_eq!(json, "\"cover_letter\"");
    }

    #[test]
    fn test_completion_requires_matching_attempt() {
        let attempt = Uuid::new_v4();
        let current = record(SectionState::Generating, Some(attempt));

        assert!(Transition::complete(attempt, Map::new()).matches(&current));
        assert!(!Transition::complete(Uuid::new_v4(), Map::new()).matches(&current));
    }

    #[test]
    fn test_apply_clears_content_when_leaving_complete() {
        let mut current = record(SectionState::Complete, Some(Uuid::new_v4()));
        current.content = Some(Map::new());

        Transition::reset(SectionState::Complete).apply(&mut current);

        assert_eq!(current.state, SectionState::Ready);
        assert!(current.content.is_none());
        assert!(current.last_error.is_none());
    }

    #[test]
    fn test_dispatch_stamps_attempt_id() {
        let attempt = Uuid::new_v4();
        let mut current = record(SectionState::Ready, None);

        Transition::dispatch(attempt).apply(&mut current);

        assert_eq!(current.state, SectionState::Generating);
        assert_eq!(current.attempt_id, Some(attempt));
    }
}
