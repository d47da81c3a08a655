//! Error types for elastic-solver

use crate::backend::BackendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid material coefficients: {0}")]
    Material(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid runtime option {key}: {message}")]
    Options { key: String, message: String },

    #[error("Linear backend failure: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid problem state: {0}")]
    State(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
