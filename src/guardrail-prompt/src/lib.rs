//! Prompt builder (C5): turns an [`Action`](guardrail_model::Action) plus
//! optional chain/task/memory context into the system+user prompt pair
//! the LLM judge sends to the local backend, scaled to the target
//! model's capabilities.

mod builder;
mod table;

pub use builder::{build_prompt, MemoryContextEntry, PromptRequest, TaskContext};
pub use table::{config_for_model, default_config, ModelPromptConfig, PromptStyle};
