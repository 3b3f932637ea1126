//! Artifact rendering. Every artifact of a document is rendered from the same
//! `AggregatedContent`, so the résumé, cover letter and index page never disagree.

pub mod latex;
pub mod markdown;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::sections::aggregator::AggregatedContent;
use crate::sections::content::{
    AwardsContent, ContactContent, CoverLetterContent, EducationContent, ExperienceContent,
    HighlightsContent, SkillsContent, SummaryContent,
};
use crate::sections::models::SectionId;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("section {0} has no content to render")]
    MissingSection(SectionId),

    #[error("section {section} does not match its schema: {message}")]
    Schema { section: SectionId, message: String },
}

/// One rendered file, ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub content_type: String,
    pub body: Bytes,
}

impl Artifact {
    fn text(name: &str, content_type: &str, body: String) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            body: Bytes::from(body),
        }
    }
}

pub trait ArtifactRenderer: Send + Sync {
    fn render(&self, content: &AggregatedContent) -> Result<Vec<Artifact>, RenderError>;
}

/// The typed view renderers work from. Optional sections are `None` when absent.
#[derive(Debug, Clone)]
pub struct ResumeView {
    pub contact: ContactContent,
    pub summary: Option<SummaryContent>,
    pub skills: Option<SkillsContent>,
    pub highlights: Option<HighlightsContent>,
    pub experience: Option<ExperienceContent>,
    pub education: Option<EducationContent>,
    pub awards: Option<AwardsContent>,
    pub cover_letter: Option<CoverLetterContent>,
}

impl ResumeView {
    pub fn from_content(content: &AggregatedContent) -> Result<Self, RenderError> {
        Ok(Self {
            contact: section(content, SectionId::Contact)?
                .ok_or(RenderError::MissingSection(SectionId::Contact))?,
            summary: section(content, SectionId::Summary)?,
            skills: section(content, SectionId::Skills)?,
            highlights: section(content, SectionId::Highlights)?,
            experience: section(content, SectionId::Experience)?,
            education: section(content, SectionId::Education)?,
            awards: section(content, SectionId::Awards)?,
            cover_letter: section(content, SectionId::CoverLetter)?,
        })
    }
}

fn section<T: DeserializeOwned>(
    content: &AggregatedContent,
    section_id: SectionId,
) -> Result<Option<T>, RenderError> {
    content
        .content(section_id)
        .map(|map| {
            serde_json::from_value(serde_json::Value::Object(map.clone())).map_err(|e| {
                RenderError::Schema {
                    section: section_id,
                    message: e.to_string(),
                }
            })
        })
        .transpose()
}

/// `resume.tex`, `cover_letter.tex` (when the letter exists) and `index.md`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRenderer;

impl ArtifactRenderer for DocumentRenderer {
    fn render(&self, content: &AggregatedContent) -> Result<Vec<Artifact>, RenderError> {
        let view = ResumeView::from_content(content)?;

        let mut artifacts = vec![Artifact::text(
            "resume.tex",
            "application/x-tex",
            latex::render_resume(&view),
        )];
        if let Some(letter) = &view.cover_letter {
            artifacts.push(Artifact::text(
                "cover_letter.tex",
                "application/x-tex",
                latex::render_cover_letter(&view.contact, letter),
            ));
        }
        artifacts.push(Artifact::text(
            "index.md",
            "text/markdown; charset=utf-8",
            markdown::render_index(&view),
        ));
        Ok(artifacts)
    }
}
