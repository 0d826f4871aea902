use std::time::Duration;
use thiserror::Error;

/// Pipeline error types.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Price file missing, empty, or with no usable rows.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Insufficient history: need {required} observations, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// Model artifact or signal history could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Training exceeded the {0:?} budget")]
    TrainingTimeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl PipelineError {
    /// Wrap any displayable failure as a storage error tagged with its location.
    pub fn storage(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        PipelineError::Storage(format!("{}: {}", context, err))
    }

    /// Whether this failure came from the artifact store or the history log.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            PipelineError::Storage(_) | PipelineError::Io(_) | PipelineError::SerdeJson(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
