//! Error types for BranchPilot
//!
//! Wraps the gitcmd taxonomy with the service's own failure modes.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for BranchPilot operations
pub type Result<T> = std::result::Result<T, BranchPilotError>;

/// Error type for BranchPilot operations
#[derive(Error, Debug)]
pub enum BranchPilotError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Git operation errors, already translated into the closed taxonomy
    #[error(transparent)]
    Git(#[from] gitcmd::GitError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server startup/runtime errors
    #[error("Server error: {0}")]
    Server(String),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}
