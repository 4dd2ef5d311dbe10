//! Notebook execution step: cache gate plus orchestration.
mod gate;
mod orchestrator;

pub use orchestrator::{run_notebooks, RunOptions, RunReport};
