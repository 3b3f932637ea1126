// LLM prompt constants for job posting ingestion.

/// System prompt for posting parsing. JSON only.
pub const POSTING_PARSE_SYSTEM: &str =
    "You are an expert job posting analyst and resume strategist. \
    Parse a job posting and extract structured information. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Posting parse prompt. Replace `{posting_text}` before sending.
pub const POSTING_PARSE_PROMPT_TEMPLATE: &str = r#"Parse the following job posting and extract structured information.

Return a JSON object with this EXACT schema (no extra fields):
{
  "title": "Senior Backend Engineer",
  "company": "Acme Corp",
  "hard_requirements": [
    {"text": "5+ years Rust programming", "is_required": true}
  ],
  "soft_signals": [
    "Kubernetes experience a plus"
  ],
  "role_signals": {
    "is_startup": false,
    "is_ic_focused": true,
    "is_research": false,
    "seniority": "senior"
  },
  "keyword_inventory": [
    {
      "keyword": "Rust",
      "frequency": 5,
      "position_weight": 0.8,
      "weighted_score": 4.0
    }
  ],
  "detected_tone": "CollaborativeEnterprise"
}

Rules for parsing:

TITLE / COMPANY: as written in the posting. Use "" when the posting does not say.

POSITION WEIGHTS for keyword scoring:
- Title / header: 1.0
- Requirements section ("Required:", "Must have:", "You need:"): 0.8
- Responsibilities section ("You will:", "Responsibilities:"): 0.6
- About Us / company section: 0.3
weighted_score = frequency * position_weight

TONE OPTIONS (pick exactly one):
- "AggressiveStartup": fast-paced language, "own", "drive", "move fast", "spearhead"
- "CollaborativeEnterprise": team-oriented, "partner", "collaborate", "contribute"
- "ResearchOriented": academic, "investigate", "publish", "evaluate", "propose"
- "ProductOriented": shipping focus, "ship", "launch", "deliver", "improve user experience"

HARD REQUIREMENTS: explicit must-haves ("required", "must have", minimum years).
SOFT SIGNALS: nice-to-haves ("preferred", "bonus", "plus").

SENIORITY: "junior", "mid", "senior", "staff", "principal", "director", or "unknown".

JOB POSTING:
{posting_text}"#;
