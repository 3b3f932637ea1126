// Section generation pipeline.
// Catalog -> Orchestrator (workers against the store) -> Aggregator -> Assembler,
// wrapped by the fallback controller. All LLM calls go through llm_client.

pub mod aggregator;
pub mod ai_assist;
pub mod assembler;
pub mod catalog;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod models;
pub mod orchestrator;
pub mod pg_store;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod service;
pub mod source;
pub mod state_machine;
pub mod static_extract;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;
