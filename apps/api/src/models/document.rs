use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::documents::phase::DocumentPhase;
use crate::sections::error::StoreError;
use crate::sections::models::{SectionId, SectionMode};

/// Per-document mode choices made by the user (e.g. keep experience verbatim).
pub type ModeOverrides = BTreeMap<SectionId, SectionMode>;

/// Pointer to one rendered artifact in object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    pub content_type: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_id: Uuid,
    pub job_posting_id: Uuid,
    pub phase: String,
    pub required_sections: Vec<String>,
    pub mode_overrides: Value,
    pub artifacts: Value,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One job application: a source resume tailored against one posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_id: Uuid,
    pub job_posting_id: Uuid,
    pub phase: DocumentPhase,
    /// Filled by the catalog on the first generation run. Empty means never cataloged.
    pub required_sections: Vec<SectionId>,
    pub mode_overrides: ModeOverrides,
    pub artifacts: Vec<ArtifactRef>,
    /// True when the content came from the legacy sequential path.
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        user_id: Uuid,
        source_id: Uuid,
        job_posting_id: Uuid,
        mode_overrides: ModeOverrides,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            source_id,
            job_posting_id,
            phase: DocumentPhase::Draft,
            required_sections: Vec::new(),
            mode_overrides,
            artifacts: Vec::new(),
            degraded: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the phase forward if the phase rules allow it; otherwise leaves it alone.
    pub fn advance_phase(&mut self, next: DocumentPhase) -> bool {
        if self.phase.can_advance_to(next) {
            self.phase = next;
            self.updated_at = Utc::now();
            true
        } else {
            false
        }
    }
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt =
            |e: &dyn std::fmt::Display| StoreError::Corrupt(format!("document {id}: {e}"));
        let phase = row.phase.parse::<DocumentPhase>().map_err(|e| corrupt(&e))?;
        let required_sections = row
            .required_sections
            .iter()
            .map(|s| s.parse::<SectionId>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt(&e))?;
        let mode_overrides = serde_json::from_value::<ModeOverrides>(row.mode_overrides)
            .map_err(|e| corrupt(&e))?;
        let artifacts = serde_json::from_value::<Vec<ArtifactRef>>(row.artifacts)
            .map_err(|e| corrupt(&e))?;

        Ok(Document {
            id: row.id,
            user_id: row.user_id,
            source_id: row.source_id,
            job_posting_id: row.job_posting_id,
            phase,
            required_sections,
            mode_overrides,
            artifacts,
            degraded: row.degraded,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> DocumentRow {
        DocumentRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            job_posting_id: Uuid::new_v4(),
            phase: "ready".to_string(),
            required_sections: vec!["summary".to_string(), "cover_letter".to_string()],
            mode_overrides: json!({"experience": "manual"}),
            artifacts: json!([]),
            degraded: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_converts_to_document() {
        let doc = Document::try_from(row()).unwrap();
        assert_eq!(doc.phase, DocumentPhase::Ready);
        assert_eq!(
            doc.required_sections,
            vec![SectionId::Summary, SectionId::CoverLetter]
        );
        assert_eq!(
            doc.mode_overrides.get(&SectionId::Experience),
            Some(&SectionMode::Manual)
        );
    }

    #[test]
    fn test_unknown_section_in_row_is_corrupt() {
        let mut bad = row();
        bad.required_sections.push("hobbies".to_string());
        assert!(matches!(
            Document::try_from(bad),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_advance_phase_respects_rules() {
        let mut doc = Document::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            ModeOverrides::new(),
        );
        assert!(!doc.advance_phase(DocumentPhase::Applied));
        assert!(doc.advance_phase(DocumentPhase::Generating));
        assert_eq!(doc.phase, DocumentPhase::Generating);
    }
}
