use std::fmt::Write;

use crate::render::ResumeView;

/// Plain index page listing the document's content, used for previews.
pub fn render_index(view: &ResumeView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", view.contact.name);
    if let Some(label) = &view.contact.label {
        let _ = writeln!(out, "_{label}_\n");
    }

    if let Some(summary) = &view.summary {
        let _ = writeln!(out, "## Summary\n\n{}\n", summary.summary);
    }

    if let Some(skills) = view.skills.as_ref().filter(|s| !s.groups.is_empty()) {
        out.push_str("## Skills\n\n");
        for group in &skills.groups {
            let _ = writeln!(out, "- **{}**: {}", group.name, group.keywords.join(", "));
        }
        out.push('\n');
    }

    if let Some(highlights) = view.highlights.as_ref().filter(|h| !h.items.is_empty()) {
        out.push_str("## Highlights\n\n");
        for item in &highlights.items {
            let _ = writeln!(out, "- {item}");
        }
        out.push('\n');
    }

    if let Some(experience) = view.experience.as_ref().filter(|e| !e.positions.is_empty()) {
        out.push_str("## Experience\n\n");
        for p in &experience.positions {
            let _ = writeln!(out, "### {} at {}\n", p.title, p.company);
            for bullet in &p.bullets {
                let _ = writeln!(out, "- {bullet}");
            }
            out.push('\n');
        }
    }

    if let Some(education) = view.education.as_ref().filter(|e| !e.entries.is_empty()) {
        out.push_str("## Education\n\n");
        for entry in &education.entries {
            match &entry.area {
                Some(area) => {
                    let _ = writeln!(out, "- {} ({area})", entry.institution);
                }
                None => {
                    let _ = writeln!(out, "- {}", entry.institution);
                }
            }
        }
        out.push('\n');
    }

    if let Some(awards) = view.awards.as_ref().filter(|a| !a.entries.is_empty()) {
        out.push_str("## Awards\n\n");
        for award in &awards.entries {
            let _ = writeln!(out, "- {}", award.title);
        }
        out.push('\n');
    }

    if view.cover_letter.is_some() {
        out.push_str("## Cover letter\n\nSee `cover_letter.tex`.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::sample_content;

    #[test]
    fn test_index_lists_present_sections_in_order() {
        let view = ResumeView::from_content(&sample_content()).unwrap();
        let md = render_index(&view);
        assert!(md.starts_with("# Ada Lovelace"));
        let summary = md.find("## Summary").unwrap();
        let skills = md.find("## Skills").unwrap();
        let experience = md.find("## Experience").unwrap();
        assert!(summary < skills && skills < experience);
        assert!(md.contains("### Engineer at Analytical Engines"));
        assert!(!md.contains("## Awards"));
    }
}
