//! Error types for the active inference engine

use thiserror::Error;

/// Main error type for the crate
///
/// Only configuration problems surface as errors. Degenerate distributions,
/// non-convergent belief updates, and log underflow are handled locally by the
/// inference routines.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("shape mismatch in '{field}': expected {expected}, got {got}")]
    ShapeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("hyperparameter '{name}' = {value} must be positive and finite")]
    InvalidHyperparameter { name: String, value: f64 },

    #[error("action {action} out of range for factor {factor} ({levels} control levels)")]
    InvalidAction {
        factor: usize,
        action: usize,
        levels: usize,
    },

    #[error("outcome {outcome} out of range for modality {modality} ({levels} levels)")]
    InvalidOutcome {
        modality: usize,
        outcome: usize,
        levels: usize,
    },

    #[error("state {state} out of range for factor {factor} ({levels} levels)")]
    InvalidState {
        factor: usize,
        state: usize,
        levels: usize,
    },

    #[error("negative concentration parameter in '{field}'")]
    NegativeConcentration { field: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("invalid progress bar template: {message}")]
    ProgressBarTemplate { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}

impl Error {
    pub(crate) fn shape(field: impl Into<String>, expected: impl ToString, got: impl ToString) -> Self {
        Error::ShapeMismatch {
            field: field.into(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Error::MissingField {
            field: field.into(),
        }
    }
}
