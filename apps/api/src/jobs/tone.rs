//! Tone calibration: maps a posting's detected tone to verb guidance for section prompts.

use crate::jobs::parser::PostingTone;

/// Verb sets and phrasing calibrated to a specific posting tone.
#[derive(Debug, Clone)]
pub struct ToneExamples {
    pub strong_verbs: Vec<&'static str>,
    pub ownership_prefix: &'static str,
    pub avoid_verbs: Vec<&'static str>,
}

pub fn get_tone_examples(tone: PostingTone) -> ToneExamples {
    match tone {
        PostingTone::AggressiveStartup => ToneExamples {
            strong_verbs: vec!["Architected", "Spearheaded", "Owned", "Drove", "Shipped", "Launched"],
            ownership_prefix: "end-to-end ownership of",
            avoid_verbs: vec!["assisted", "helped", "participated in"],
        },
        PostingTone::CollaborativeEnterprise => ToneExamples {
            strong_verbs: vec!["Partnered with", "Contributed to", "Enabled", "Collaborated on", "Facilitated"],
            ownership_prefix: "as part of a team,",
            avoid_verbs: vec!["spearheaded", "solely built", "disrupted"],
        },
        PostingTone::ResearchOriented => ToneExamples {
            strong_verbs: vec!["Investigated", "Designed and evaluated", "Published", "Proposed", "Analyzed"],
            ownership_prefix: "research into",
            avoid_verbs: vec!["shipped", "moved fast", "disrupted"],
        },
        PostingTone::ProductOriented => ToneExamples {
            strong_verbs: vec!["Shipped", "Delivered", "Launched", "Improved", "Reduced friction for"],
            ownership_prefix: "shipped",
            avoid_verbs: vec!["investigated", "researched", "proposed"],
        },
    }
}

/// Prompt fragment for the summary, experience and cover letter prompts.
pub fn tone_guidance(tone: PostingTone) -> String {
    let examples = get_tone_examples(tone);
    format!(
        "TONE: {tone:?}. Prefer verbs like: {}. Frame ownership as \"{}\". Avoid: {}.",
        examples.strong_verbs.join(", "),
        examples.ownership_prefix,
        examples.avoid_verbs.join(", ")
    )
}
