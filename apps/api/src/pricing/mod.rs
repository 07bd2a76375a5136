//! Smart Pricing Band Engine and its HTTP surface.
//!
//! Pipeline: signals → band synthesis → history tuning → stress shield → note.
//! Everything up to the note is pure; note refinement is the only async step.

pub mod band;
pub mod engine;
pub mod handlers;
pub mod history;
pub mod notes;
pub mod prompts;
pub mod shield;
pub mod signals;
