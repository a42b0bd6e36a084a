//! Context aggregation for the AI coach
//!
//! Reads the user store into a [`UserContext`] and renders it for the system
//! prompt. Missing data never blocks a prompt; see [`defaults`].

pub mod aggregator;
pub mod defaults;
pub mod format;
pub mod types;

pub use aggregator::ContextAggregator;
pub use format::format_for_prompt;
pub use types::*;
