use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors of the scheduling pipeline.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Input rejected before the solver was called.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Solver(#[from] SolverError),

    /// An expected result field is missing; the solver model and the layout disagree.
    #[error("solver result is missing field '{0}'")]
    MissingField(String),

    #[error("solver run does not expose input parameter '{0}'")]
    MissingInputParameter(String),

    #[error("solver result has no values for requested timestamp {0}")]
    MissingTimestamp(NaiveDateTime),

    #[error("solver result holds more than one value for '{entry}' at {time}")]
    DuplicateEntry { entry: String, time: NaiveDateTime },

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

/// Failures reported by a [`crate::day_ahead::solver::Solver`].
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver found no feasible solution: {0}")]
    Infeasible(String),

    #[error("required model parameter '{0}' is missing")]
    MissingParameter(String),

    #[error("model parameter '{name}' has value '{value}', expected a number")]
    InvalidParameter { name: String, value: String },

    #[error("input file '{file}' lacks column '{column}'")]
    MissingInput { file: String, column: String },

    #[error("failed to load model: {0}")]
    Model(String),

    #[error("solver failed: {0}")]
    Other(String),
}

/// Failures while extracting a logged request for replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("request block not found in {origin}: no line contains '{marker}'")]
    RequestMarkerNotFound { origin: String, marker: &'static str },

    #[error("request block not found in {origin}: no '{marker}' line after the request marker")]
    ResponseMarkerNotFound { origin: String, marker: &'static str },

    #[error("request block in {origin} is empty")]
    EmptyBlock { origin: String },

    #[error("invalid request payload in {origin}: {source}")]
    InvalidPayload {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ReplayError {
    /// True when the block could not be located, as opposed to a located but unusable payload.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReplayError::RequestMarkerNotFound { .. } | ReplayError::ResponseMarkerNotFound { .. }
        )
    }
}
