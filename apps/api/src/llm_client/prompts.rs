// Cross-cutting prompt fragments. Each feature keeps its own prompts.rs next to it.

/// Appended to every section prompt.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim must be traceable to the candidate data provided. \
    Do NOT infer, interpolate, or invent employers, dates, titles, or metrics. \
    If the data does not support a claim, omit it entirely.";

/// Appended to every section prompt. Presentation is added later by the renderer.
pub const PLAIN_TEXT_INSTRUCTION: &str = "\
    Every string value must be plain text: no LaTeX commands, no HTML tags, \
    no Markdown emphasis, headings or code spans.";
