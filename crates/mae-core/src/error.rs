//! Error types for MSM-MAE.

use thiserror::Error;

/// Main error type for embedding operations.
#[derive(Error, Debug)]
pub enum MaeError {
    /// Audio input errors (empty batch, zero-length or mixed-length clips).
    #[error("Audio error: {0}")]
    Audio(String),

    /// Model loading errors.
    #[error("Model error: {0}")]
    Model(String),

    /// Inference errors.
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for embedding operations.
pub type MaeResult<T> = Result<T, MaeError>;
