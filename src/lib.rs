//! BranchPilot - Local Git Automation Service
//!
//! BranchPilot is the local helper half of a browser-extension workflow:
//! the extension captures a task description, obtains a candidate branch
//! name from a text-generation API, and asks this service to create that
//! branch in a local repository. The extension cannot touch the
//! filesystem or spawn processes, so this service wraps shell-level git
//! invocations with validation, normalization, and structured error
//! translation behind a localhost HTTP API.
//!
//! # Architecture
//!
//! - **gitcmd** (workspace crate): bounded git command execution, error
//!   translation, repository validation, status/branch reads, and the
//!   branch-creation sequence
//! - **server**: axum router, wire DTOs, error-to-status mapping, CORS
//! - **config**: immutable `config.json` snapshots
//! - **logging**: tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod server;

// Re-exports
pub use error::{BranchPilotError, Result};
