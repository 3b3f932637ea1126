//! Static extraction: reshapes source sub-trees into section content without any
//! external call. Serves both `manual` and `template` modes.

use async_trait::async_trait;
use serde_json::Value;

use crate::sections::content::{
    sanitize_text, to_content, Award, AwardsContent, ContactContent, CoverLetterContent,
    EducationContent, EducationEntry, ExperienceContent, HighlightsContent, Position, Profile,
    SkillGroup, SkillsContent, SummaryContent,
};
use crate::sections::error::GenerationError;
use crate::sections::generator::{GenerationInput, SectionGenerator};
use crate::sections::models::{SectionContent, SectionId, SectionMode, TargetContext};
use crate::sections::source::{items, strings, text};

const MAX_HIGHLIGHTS: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticExtractor;

#[async_trait]
impl SectionGenerator for StaticExtractor {
    async fn generate(&self, input: &GenerationInput) -> Result<SectionContent, GenerationError> {
        extract(input.section_id, input.mode, &input.source, &input.target)
    }
}

/// Synchronous core, shared with the AI generator for sections that have no prompt.
pub fn extract(
    section_id: SectionId,
    mode: SectionMode,
    source: &Value,
    target: &TargetContext,
) -> Result<SectionContent, GenerationError> {
    let template = mode == SectionMode::Template;
    match section_id {
        SectionId::Contact => to_content(&contact(source)?),
        SectionId::Summary if template => to_content(&summary_template(source, target)),
        SectionId::Summary => to_content(&summary(source)?),
        SectionId::Skills if template => to_content(&skills_template(target)),
        SectionId::Skills => to_content(&skills(source)?),
        SectionId::Highlights => to_content(&highlights(source)),
        SectionId::Experience => to_content(&experience(source)),
        SectionId::Education => to_content(&education(source)),
        SectionId::Awards => to_content(&awards(source)),
        SectionId::CoverLetter if template => to_content(&cover_letter_template(source, target)),
        SectionId::CoverLetter => to_content(&cover_letter(source, target)?),
    }
}

fn missing(field: &str) -> GenerationError {
    GenerationError::MissingSourceData {
        field: field.to_string(),
    }
}

fn clean(value: &Value, pointer: &str) -> Option<String> {
    text(value, pointer).map(sanitize_text)
}

fn target_role(target: &TargetContext) -> (Option<String>, Option<String>) {
    let title = clean(target, "/title").or_else(|| clean(target, "/parsed/title"));
    let company = clean(target, "/company").or_else(|| clean(target, "/parsed/company"));
    (title, company)
}

fn contact(source: &Value) -> Result<ContactContent, GenerationError> {
    let name = clean(source, "/basics/name").ok_or_else(|| missing("basics.name"))?;
    let location = source.pointer("/basics/location").map(|loc| {
        ["/city", "/region", "/countryCode"]
            .iter()
            .filter_map(|p| clean(loc, p))
            .collect::<Vec<_>>()
            .join(", ")
    });
    let profiles = source
        .pointer("/basics/profiles")
        .and_then(Value::as_array)
        .map(|profiles| {
            profiles
                .iter()
                .filter_map(|p| {
                    Some(Profile {
                        network: clean(p, "/network")?,
                        url: clean(p, "/url"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ContactContent {
        name,
        label: clean(source, "/basics/label"),
        email: clean(source, "/basics/email"),
        phone: clean(source, "/basics/phone"),
        url: clean(source, "/basics/url"),
        location: location.filter(|l| !l.is_empty()),
        profiles,
    })
}

fn summary(source: &Value) -> Result<SummaryContent, GenerationError> {
    if let Some(summary) = clean(source, "/basics/summary") {
        return Ok(SummaryContent {
            summary,
            placeholder: false,
        });
    }
    let latest = items(source, "work").first().ok_or_else(|| missing("basics.summary"))?;
    let role = clean(latest, "/position").unwrap_or_else(|| "Professional".to_string());
    let summary = match clean(latest, "/name") {
        Some(company) => format!("{role}, most recently at {company}."),
        None => format!("{role}."),
    };
    Ok(SummaryContent {
        summary,
        placeholder: false,
    })
}

fn summary_template(source: &Value, target: &TargetContext) -> SummaryContent {
    let label = clean(source, "/basics/label").unwrap_or_else(|| "professional".to_string());
    let summary = match target_role(target) {
        (Some(title), Some(company)) => {
            format!("Motivated {label} applying for the {title} role at {company}.")
        }
        (Some(title), None) => format!("Motivated {label} applying for the {title} role."),
        _ => format!("Motivated {label}."),
    };
    SummaryContent {
        summary,
        placeholder: true,
    }
}

fn skills(source: &Value) -> Result<SkillsContent, GenerationError> {
    let groups: Vec<SkillGroup> = items(source, "skills")
        .iter()
        .filter_map(|skill| {
            Some(SkillGroup {
                name: clean(skill, "/name")?,
                keywords: strings(skill, "keywords")
                    .iter()
                    .map(|k| sanitize_text(k))
                    .collect(),
            })
        })
        .collect();
    if groups.is_empty() {
        return Err(missing("skills"));
    }
    Ok(SkillsContent {
        groups,
        placeholder: false,
    })
}

/// Seeds the skills list from the posting's keywords when the source has none.
fn skills_template(target: &TargetContext) -> SkillsContent {
    let keywords = target
        .pointer("/parsed/keyword_inventory")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| clean(e, "/keyword"))
                .take(8)
                .collect()
        })
        .unwrap_or_default();
    SkillsContent {
        groups: vec![SkillGroup {
            name: "Skills".to_string(),
            keywords,
        }],
        placeholder: true,
    }
}

fn highlights(source: &Value) -> HighlightsContent {
    let items: Vec<String> = items(source, "work")
        .iter()
        .flat_map(|job| strings(job, "highlights"))
        .map(|h| sanitize_text(&h))
        .take(MAX_HIGHLIGHTS)
        .collect();
    HighlightsContent {
        placeholder: items.is_empty(),
        items,
    }
}

fn experience(source: &Value) -> ExperienceContent {
    let positions: Vec<Position> = items(source, "work")
        .iter()
        .map(|job| Position {
            company: clean(job, "/name").unwrap_or_default(),
            title: clean(job, "/position").unwrap_or_default(),
            start_date: clean(job, "/startDate"),
            end_date: clean(job, "/endDate"),
            summary: clean(job, "/summary"),
            bullets: strings(job, "highlights")
                .iter()
                .map(|h| sanitize_text(h))
                .collect(),
        })
        .collect();
    ExperienceContent {
        placeholder: positions.is_empty(),
        positions,
    }
}

fn education(source: &Value) -> EducationContent {
    let entries: Vec<EducationEntry> = items(source, "education")
        .iter()
        .filter_map(|e| {
            Some(EducationEntry {
                institution: clean(e, "/institution")?,
                area: clean(e, "/area"),
                study_type: clean(e, "/studyType"),
                start_date: clean(e, "/startDate"),
                end_date: clean(e, "/endDate"),
            })
        })
        .collect();
    EducationContent {
        placeholder: entries.is_empty(),
        entries,
    }
}

fn awards(source: &Value) -> AwardsContent {
    let entries: Vec<Award> = items(source, "awards")
        .iter()
        .filter_map(|a| {
            Some(Award {
                title: clean(a, "/title")?,
                awarder: clean(a, "/awarder"),
                date: clean(a, "/date"),
                summary: clean(a, "/summary"),
            })
        })
        .collect();
    AwardsContent {
        placeholder: entries.is_empty(),
        entries,
    }
}

fn greeting(target: &TargetContext) -> String {
    match target_role(target).1 {
        Some(company) => format!("Dear {company} hiring team,"),
        None => "Dear Hiring Manager,".to_string(),
    }
}

fn cover_letter(
    source: &Value,
    target: &TargetContext,
) -> Result<CoverLetterContent, GenerationError> {
    let name = clean(source, "/basics/name").ok_or_else(|| missing("basics.name"))?;

    // A hand-written letter in the source is used verbatim.
    let written: Vec<String> = text(source, "/coverLetter")
        .map(|letter| {
            letter
                .split("\n\n")
                .map(sanitize_text)
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let paragraphs = if written.is_empty() {
        let mut paragraphs = Vec::new();
        if let (Some(title), company) = target_role(target) {
            paragraphs.push(match company {
                Some(company) => format!("I am writing to apply for the {title} role at {company}."),
                None => format!("I am writing to apply for the {title} role."),
            });
        }
        if let Some(summary) = clean(source, "/basics/summary") {
            paragraphs.push(summary);
        }
        if let Some(latest) = items(source, "work").first() {
            if let (Some(position), Some(company)) =
                (clean(latest, "/position"), clean(latest, "/name"))
            {
                paragraphs.push(format!("Most recently I worked as {position} at {company}."));
            }
        }
        if paragraphs.is_empty() {
            return Err(missing("coverLetter"));
        }
        paragraphs
    } else {
        written
    };

    Ok(CoverLetterContent {
        greeting: greeting(target),
        paragraphs,
        closing: format!("Sincerely, {name}"),
        placeholder: false,
    })
}

fn cover_letter_template(source: &Value, target: &TargetContext) -> CoverLetterContent {
    let role = match target_role(target) {
        (Some(title), Some(company)) => format!("the {title} role at {company}"),
        (Some(title), None) => format!("the {title} role"),
        _ => "this role".to_string(),
    };
    let closing = match clean(source, "/basics/name") {
        Some(name) => format!("Sincerely, {name}"),
        None => "Sincerely".to_string(),
    };
    CoverLetterContent {
        greeting: greeting(target),
        paragraphs: vec![
            format!("I am writing to express my interest in {role}."),
            "I would welcome the opportunity to discuss how my experience fits your team."
                .to_string(),
        ],
        closing,
        placeholder: true,
    }
}
