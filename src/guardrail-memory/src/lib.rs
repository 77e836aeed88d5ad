//! Pattern-learning memory (C3): tracks per-pattern approve/deny history
//! and turns it into a confidence-weighted score adjustment and
//! auto-approve suggestion for the orchestrator.

mod pattern;
mod store;

pub use pattern::pattern;
pub use store::{PatternLookup, PatternMemory};
