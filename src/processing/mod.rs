//! Pipeline orchestration and ranking

pub mod pipeline;
pub mod ranking;

pub use pipeline::{Pipeline, RunInputs, RunSummary, Stage};
