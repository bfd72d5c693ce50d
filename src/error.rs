//! Error types for the submission judge.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, JudgeError>;

/// Errors that can occur while ingesting, judging or querying submissions.
#[derive(Error, Debug)]
pub enum JudgeError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The uploaded document does not have the expected shape.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Database error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A judge id does not exist for this owner.
    #[error("Judge '{0}' not found")]
    JudgeNotFound(String),

    /// Invalid input to a registry operation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The queue has no judge assignments.
    #[error("Queue '{0}' has no judge assignments; assign at least one judge before running")]
    NoAssignments(String),

    /// The queue has no questions.
    #[error("Queue '{0}' has no questions; upload submissions before running")]
    NoQuestions(String),

    /// Assignments and questions exist but no active judge matches any question.
    #[error("Queue '{0}' has no (question, active judge) pairs to evaluate")]
    NothingToEvaluate(String),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// Structured output did not match the verdict schema.
    #[error("Response failed schema validation: {0}")]
    SchemaValidation(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl JudgeError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for JudgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JudgeError::Http(format!("request timed out: {}", err))
        } else {
            JudgeError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for JudgeError {
    fn from(err: serde_json::Error) -> Self {
        JudgeError::LlmParse(err.to_string())
    }
}

impl From<rusqlite::Error> for JudgeError {
    fn from(err: rusqlite::Error) -> Self {
        JudgeError::Storage(err.to_string())
    }
}
