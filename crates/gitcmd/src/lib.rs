//! Typed async wrapper around the `git` CLI
//!
//! Provides a bounded command executor, an error translator that maps raw
//! git stderr into a closed error taxonomy, and high-level repository
//! operations (validate, status, branch listing, branch creation).
//!
//! # Example
//!
//! ```no_run
//! use gitcmd::{CreateOptions, GitClient};
//! use std::path::Path;
//!
//! # async fn example() -> gitcmd::Result<()> {
//! let git = GitClient::new();
//! let repo = Path::new("/home/me/project");
//!
//! git.validate(repo).await?;
//! let result = git
//!     .create_branch("feat/login", repo, CreateOptions::default())
//!     .await?;
//! println!("{}", result.message);
//! # Ok(())
//! # }
//! ```

mod repo;
mod runner;

pub use repo::{
    validate_branch_name, BranchCreation, BranchSet, CreateOptions, GitClient, RepoStatus,
    RepoValidation, DETACHED_HEAD,
};
pub use runner::{CommandOutput, GitRunner, DEFAULT_MAX_OUTPUT, DEFAULT_TIMEOUT};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when driving the git CLI
#[derive(Error, Debug)]
pub enum GitError {
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("not a Git repository (.git not found): {path}. Run \"git init\" first")]
    NotARepository { path: PathBuf },

    #[error("git not found. Install Git and make sure it is on PATH")]
    GitNotInstalled,

    #[error("branch \"{name}\" already exists. Pick a different name or check out the existing branch")]
    BranchExists { name: String },

    #[error("base branch \"{name}\" does not exist. Make sure the start point is a valid branch")]
    BadBaseBranch { name: String },

    #[error("the working tree has uncommitted changes. Commit or stash them first")]
    DirtyWorkTree,

    #[error("permission denied: {detail}. Check the directory permissions")]
    PermissionDenied { detail: String },

    #[error("command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    #[error("invalid branch name \"{name}\": {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("branch state after creation disagrees with the expected result (expected \"{expected}\", found \"{actual}\")")]
    VerificationFailed { expected: String, actual: String },

    #[error("{message}")]
    Unknown { message: String },
}

impl GitError {
    /// Stable machine-readable code for the wire protocol
    pub fn code(&self) -> &'static str {
        match self {
            GitError::PathNotFound { .. } => "PATH_NOT_FOUND",
            GitError::NotADirectory { .. } => "NOT_A_DIRECTORY",
            GitError::NotARepository { .. } => "NOT_A_GIT_REPOSITORY",
            GitError::GitNotInstalled => "GIT_NOT_INSTALLED",
            GitError::BranchExists { .. } => "BRANCH_ALREADY_EXISTS",
            GitError::BadBaseBranch { .. } => "BAD_BASE_BRANCH",
            GitError::DirtyWorkTree => "UNCOMMITTED_CHANGES",
            GitError::PermissionDenied { .. } => "PERMISSION_DENIED",
            GitError::Timeout { .. } => "COMMAND_TIMEOUT",
            GitError::InvalidBranchName { .. } => "INVALID_BRANCH_NAME",
            GitError::VerificationFailed { .. } => "VERIFICATION_FAILED",
            GitError::Unknown { .. } => "UNKNOWN_GIT_ERROR",
        }
    }

    /// Whether the caller can fix this by changing the request
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            GitError::PathNotFound { .. }
                | GitError::NotADirectory { .. }
                | GitError::NotARepository { .. }
                | GitError::BranchExists { .. }
                | GitError::BadBaseBranch { .. }
                | GitError::DirtyWorkTree
                | GitError::InvalidBranchName { .. }
        )
    }
}

/// Result type for gitcmd operations
pub type Result<T> = std::result::Result<T, GitError>;
