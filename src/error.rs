use thiserror::Error;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Weights decoding error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Definition parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Failed to load model from {}: {}", .0.display(), .1)]
    ModelLoadError(PathBuf, String),

    #[error("Invalid network definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Network must expose exactly one input and one output blob, got {inputs} and {outputs}")]
    BlobCount { inputs: usize, outputs: usize },

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
