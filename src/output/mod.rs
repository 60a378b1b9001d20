//! Output module
//! Persisted artifacts and console presentation

pub mod artifacts;
pub mod formatter;
pub mod spinner;

pub use artifacts::{MatchArtifact, MatchEntry, ScoreEntry, ScoringArtifact};
