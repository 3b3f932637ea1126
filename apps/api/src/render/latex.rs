use std::fmt::Write;

use crate::render::ResumeView;
use crate::sections::content::{ContactContent, CoverLetterContent, Position};

const PREAMBLE: &str = r"\documentclass[11pt,letterpaper]{article}
\usepackage[margin=1in]{geometry}
\usepackage[T1]{fontenc}
\usepackage{enumitem}
\usepackage[hidelinks]{hyperref}
\setlength{\parindent}{0pt}
\pagestyle{empty}
";

/// Escapes the ten LaTeX special characters. Content never carries markup of its own.
pub fn escape_latex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n\\section*{{{title}}}");
}

fn itemize<'a>(out: &mut String, items: impl IntoIterator<Item = &'a String>) {
    let items: Vec<_> = items.into_iter().filter(|i| !i.trim().is_empty()).collect();
    if items.is_empty() {
        return;
    }
    out.push_str("\\begin{itemize}[leftmargin=*,noitemsep]\n");
    for item in items {
        let _ = writeln!(out, "  \\item {}", escape_latex(item));
    }
    out.push_str("\\end{itemize}\n");
}

fn date_range(start: Option<&str>, end: Option<&str>) -> Option<String> {
    match (start, end) {
        (Some(s), Some(e)) => Some(format!("{s} -- {e}")),
        (Some(s), None) => Some(format!("{s} -- Present")),
        (None, Some(e)) => Some(e.to_string()),
        (None, None) => None,
    }
}

fn contact_block(out: &mut String, contact: &ContactContent) {
    let _ = writeln!(
        out,
        "{{\\LARGE\\bfseries {}}}\\\\",
        escape_latex(&contact.name)
    );
    if let Some(label) = &contact.label {
        let _ = writeln!(out, "{}\\\\", escape_latex(label));
    }
    let mut details: Vec<String> = [&contact.email, &contact.phone, &contact.location, &contact.url]
        .into_iter()
        .flatten()
        .map(|d| escape_latex(d))
        .collect();
    details.extend(
        contact
            .profiles
            .iter()
            .map(|p| escape_latex(p.url.as_deref().unwrap_or(&p.network))),
    );
    if !details.is_empty() {
        let _ = writeln!(out, "{}", details.join(" \\textbullet{} "));
    }
}

fn position(out: &mut String, position: &Position) {
    let _ = write!(
        out,
        "\\textbf{{{}}}, {}",
        escape_latex(&position.title),
        escape_latex(&position.company)
    );
    if let Some(dates) = date_range(position.start_date.as_deref(), position.end_date.as_deref()) {
        let _ = write!(out, " \\hfill {}", escape_latex(&dates));
    }
    out.push_str("\\\\\n");
    if let Some(summary) = &position.summary {
        let _ = writeln!(out, "{}\\\\", escape_latex(summary));
    }
    itemize(out, &position.bullets);
}

pub fn render_resume(view: &ResumeView) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\\begin{document}\n");
    contact_block(&mut out, &view.contact);

    if let Some(summary) = &view.summary {
        heading(&mut out, "Summary");
        let _ = writeln!(out, "{}", escape_latex(&summary.summary));
    }

    if let Some(skills) = view.skills.as_ref().filter(|s| !s.groups.is_empty()) {
        heading(&mut out, "Skills");
        for group in &skills.groups {
            let keywords: Vec<_> = group.keywords.iter().map(|k| escape_latex(k)).collect();
            let _ = writeln!(
                out,
                "\\textbf{{{}}}: {}\\\\",
                escape_latex(&group.name),
                keywords.join(", ")
            );
        }
    }

    if let Some(highlights) = view.highlights.as_ref().filter(|h| !h.items.is_empty()) {
        heading(&mut out, "Highlights");
        itemize(&mut out, &highlights.items);
    }

    if let Some(experience) = view.experience.as_ref().filter(|e| !e.positions.is_empty()) {
        heading(&mut out, "Experience");
        for p in &experience.positions {
            position(&mut out, p);
        }
    }

    if let Some(education) = view.education.as_ref().filter(|e| !e.entries.is_empty()) {
        heading(&mut out, "Education");
        for entry in &education.entries {
            let degree: Vec<&str> = [entry.study_type.as_deref(), entry.area.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            let _ = write!(out, "\\textbf{{{}}}", escape_latex(&entry.institution));
            if !degree.is_empty() {
                let _ = write!(out, ", {}", escape_latex(&degree.join(" in ")));
            }
            if let Some(dates) = date_range(entry.start_date.as_deref(), entry.end_date.as_deref()) {
                let _ = write!(out, " \\hfill {}", escape_latex(&dates));
            }
            out.push_str("\\\\\n");
        }
    }

    if let Some(awards) = view.awards.as_ref().filter(|a| !a.entries.is_empty()) {
        heading(&mut out, "Awards");
        let lines: Vec<String> = awards
            .entries
            .iter()
            .map(|a| {
                [Some(a.title.as_str()), a.awarder.as_deref(), a.date.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();
        itemize(&mut out, &lines);
    }

    out.push_str("\n\\end{document}\n");
    out
}

pub fn render_cover_letter(contact: &ContactContent, letter: &CoverLetterContent) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\\begin{document}\n");
    contact_block(&mut out, contact);
    out.push_str("\n\\bigskip\n");
    let _ = writeln!(out, "{}\n", escape_latex(&letter.greeting));
    for paragraph in letter.paragraphs.iter().filter(|p| !p.trim().is_empty()) {
        let _ = writeln!(out, "{}\n", escape_latex(paragraph));
    }
    let _ = writeln!(out, "{}", escape_latex(&letter.closing));
    out.push_str("\n\\end{document}\n");
    out
}
