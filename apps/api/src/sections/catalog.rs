//! Section Catalog: decides which sections a document gets and how each is produced.

use crate::models::document::ModeOverrides;
use crate::sections::error::CatalogError;
use crate::sections::models::{SectionDescriptor, SectionId, SectionMode, SourceDocument};
use crate::sections::source::{items, json_kind, text};

/// Deterministic and side-effect free. Output is in canonical section order.
///
/// Mandatory sections (summary, skills, cover letter) are always present; when the source
/// has nothing to build them from they get `SectionMode::Template`.
pub fn identify_sections(
    source: &SourceDocument,
    overrides: &ModeOverrides,
) -> Result<Vec<SectionDescriptor>, CatalogError> {
    if !source.is_object() {
        return Err(CatalogError::InvalidSource(json_kind(source)));
    }

    let has_name = text(source, "/basics/name").is_some();
    let has_work = !items(source, "work").is_empty();

    let descriptors = SectionId::ALL
        .into_iter()
        .filter(|id| {
            id.is_mandatory()
                || match id {
                    SectionId::Contact => has_name,
                    SectionId::Highlights => items(source, "work")
                        .iter()
                        .any(|job| !items(job, "highlights").is_empty()),
                    SectionId::Experience => has_work,
                    SectionId::Education => !items(source, "education").is_empty(),
                    SectionId::Awards => !items(source, "awards").is_empty(),
                    _ => false,
                }
        })
        .map(|id| {
            let has_source_data = match id {
                SectionId::Summary => text(source, "/basics/summary").is_some() || has_work,
                SectionId::Skills => !items(source, "skills").is_empty(),
                SectionId::CoverLetter => has_name,
                _ => true,
            };
            let mode = if has_source_data {
                resolve_mode(id, overrides)
            } else {
                SectionMode::Template
            };
            SectionDescriptor {
                id,
                mode,
                required: id != SectionId::Highlights,
            }
        })
        .collect();

    Ok(descriptors)
}

/// A user may ask for verbatim output of an AI section, or AI output where a prompt exists.
fn resolve_mode(id: SectionId, overrides: &ModeOverrides) -> SectionMode {
    match overrides.get(&id) {
        Some(SectionMode::Manual) => SectionMode::Manual,
        Some(SectionMode::Ai) if id.supports_ai() => SectionMode::Ai,
        _ => id.default_mode(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_source() -> SourceDocument {
        json!({
            "basics": {"name": "Ada Lovelace", "summary": "Analyst of engines."},
            "work": [{
                "name": "Analytical Co",
                "position": "Engineer",
                "highlights": ["Wrote the first program"]
            }],
            "education": [{"institution": "Home", "area": "Mathematics"}],
            "awards": [{"title": "Countess"}],
            "skills": [{"name": "Math", "keywords": ["Algebra"]}]
        })
    }

    fn ids(descriptors: &[SectionDescriptor]) -> Vec<SectionId> {
        descriptors.iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_full_source_yields_every_section() {
        let descriptors = identify_sections(&full_source(), &ModeOverrides::new()).unwrap();
        assert_eq!(ids(&descriptors), SectionId::ALL.to_vec());
        assert!(descriptors.iter().all(|d| d.mode != SectionMode::Template));
    }

    #[test]
    fn test_empty_source_keeps_mandatory_sections_as_templates() {
        let descriptors = identify_sections(&json!({}), &ModeOverrides::new()).unwrap();
        assert_eq!(
            ids(&descriptors),
            vec![SectionId::Summary, SectionId::Skills, SectionId::CoverLetter]
        );
        let mandatory: Vec<_> = SectionId::ALL.into_iter().filter(SectionId::is_mandatory).collect();
        assert_eq!(ids(&descriptors), mandatory);
        assert!(descriptors
            .iter()
            .all(|d| d.mode == SectionMode::Template && d.required));
    }

    #[test]
    fn test_highlights_are_optional() {
        let descriptors = identify_sections(&full_source(), &ModeOverrides::new()).unwrap();
        let highlights = descriptors
            .iter()
            .find(|d| d.id == SectionId::Highlights)
            .unwrap();
        assert!(!highlights.required);
    }

    #[test]
    fn test_manual_override_applies_to_ai_section() {
        let overrides = ModeOverrides::from([(SectionId::Experience, SectionMode::Manual)]);
        let descriptors = identify_sections(&full_source(), &overrides).unwrap();
        let experience = descriptors
            .iter()
            .find(|d| d.id == SectionId::Experience)
            .unwrap();
        assert_eq!(experience.mode, SectionMode::Manual);
    }

    #[test]
    fn test_ai_override_ignored_without_prompt() {
        let overrides = ModeOverrides::from([(SectionId::Education, SectionMode::Ai)]);
        let descriptors = identify_sections(&full_source(), &overrides).unwrap();
        let education = descriptors
            .iter()
            .find(|d| d.id == SectionId::Education)
            .unwrap();
        assert_eq!(education.mode, SectionMode::Manual);
    }

    #[test]
    fn test_override_never_replaces_template() {
        let overrides = ModeOverrides::from([(SectionId::Skills, SectionMode::Ai)]);
        let descriptors = identify_sections(&json!({"basics": {"name": "A"}}), &overrides).unwrap();
        let skills = descriptors.iter().find(|d| d.id == SectionId::Skills).unwrap();
        assert_eq!(skills.mode, SectionMode::Template);
    }

    #[test]
    fn test_summary_falls_back_to_work_history() {
        let source = json!({"work": [{"name": "Acme", "position": "Dev"}]});
        let descriptors = identify_sections(&source, &ModeOverrides::new()).unwrap();
        let summary = descriptors.iter().find(|d| d.id == SectionId::Summary).unwrap();
        assert_eq!(summary.mode, SectionMode::Ai);
    }

    #[test]
    fn test_non_object_source_is_rejected() {
        let err = identify_sections(&json!(["not", "a", "resume"]), &ModeOverrides::new());
        assert!(matches!(err, Err(CatalogError::InvalidSource("array"))));
    }
}
