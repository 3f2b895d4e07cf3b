//! Error types for the MoodMap insight engine

use thiserror::Error;

/// Errors that can surface from the insight engine
#[derive(Debug, Error)]
pub enum InsightError {
    /// The window produced no usable days at all.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Invalid thresholds or weights. Raised when the engine is built, never per call.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Record source failed: {0}")]
    Source(String),

    #[error("Failed to parse mood records: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl InsightError {
    /// Message suitable for showing to the person logging their mood
    pub fn user_message(&self) -> &'static str {
        match self {
            InsightError::InsufficientData(_) => "Log more days to unlock insights.",
            InsightError::Configuration(_) => "The insight engine is misconfigured.",
            InsightError::Source(_) => "Your mood history could not be loaded.",
            InsightError::Parse(_) | InsightError::Json(_) => {
                "Some mood records could not be read."
            }
        }
    }
}
