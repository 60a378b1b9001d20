//! Error handling for the job matcher pipeline

use crate::llm::client::GenerationError;
use crate::llm::recovery::RecoveryError;
use crate::processing::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobMatcherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Required input missing ({what}): {}", path.display())]
    InputMissing { what: &'static str, path: PathBuf },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{stage} failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: GenerationError,
    },

    #[error("{stage} failed: {source}")]
    Recovery {
        stage: Stage,
        #[source]
        source: RecoveryError,
    },

    #[error("Output error: {0}")]
    Output(String),

    /// Server calls made outside a pipeline stage
    #[error("Model server error: {0}")]
    Server(#[from] GenerationError),
}

impl JobMatcherError {
    /// The pipeline stage an error aborted, if it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            JobMatcherError::Generation { stage, .. } | JobMatcherError::Recovery { stage, .. } => {
                Some(*stage)
            }
            JobMatcherError::InputMissing { .. } => Some(Stage::LoadInputs),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, JobMatcherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_missing_message_names_path() {
        let err = JobMatcherError::InputMissing {
            what: "candidate profile",
            path: PathBuf::from("inputs/cv.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("candidate profile"));
        assert!(msg.contains("inputs/cv.json"));
        assert_eq!(err.stage(), Some(Stage::LoadInputs));
    }

    #[test]
    fn test_recovery_message_names_stage_and_preview() {
        let err = JobMatcherError::Recovery {
            stage: Stage::RecoverMatch,
            source: RecoveryError::new("not json at all"),
        };
        let msg = err.to_string();
        assert!(msg.contains("match response recovery"));
        assert!(msg.contains("not json at all"));
    }
}
