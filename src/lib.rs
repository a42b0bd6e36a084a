//! MacroCoach core: user state, AI context, conversational memory and the
//! coach's tool executor.

pub mod clock;
pub mod coach;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod providers;
pub mod state;
pub mod storage;
pub mod tools;

pub use error::{CoachError, Result};
