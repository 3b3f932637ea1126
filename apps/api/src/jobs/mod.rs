// Job postings: ingestion, LLM parsing and tone detection.

pub mod handlers;
pub mod parser;
pub mod prompts;
pub mod tone;
