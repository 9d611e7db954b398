//! Inference client error types.

use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

/// A failed call to a hosted workflow.
///
/// Every variant is recoverable: callers skip the remaining stages for the
/// current image (or region) and move on.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid workflow endpoint: {0}")]
    Endpoint(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("workflow service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("workflow response is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("image I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode image: {0}")]
    Encode(String),
}

impl InferenceError {
    /// True for failures raised before or while talking to the service, as
    /// opposed to local image handling.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            InferenceError::Transport { .. }
                | InferenceError::Status { .. }
                | InferenceError::InvalidBody(_)
        )
    }
}
