//! Repository validation, status reading, branch enumeration, and the
//! branch-creation sequence.
//!
//! All reads are advisory and tolerate partial failure: a repository with
//! no commits or no configured remote still produces a status. Only
//! [`GitClient::create_branch`] mutates the repository.

use crate::runner::GitRunner;
use crate::{GitError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sentinel reported when HEAD does not point at a branch
pub const DETACHED_HEAD: &str = "detached HEAD";

/// Outcome of a successful repository validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoValidation {
    pub is_valid: bool,
    pub path: String,
    pub git_version: String,
    pub message: String,
}

/// Snapshot of a working tree, derived fresh per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStatus {
    pub current_branch: String,
    pub has_changes: bool,
    pub is_clean: bool,
    pub last_commit: Option<String>,
    pub remote_status: Option<String>,
    pub status_details: String,
}

/// Local and remote branch names, remote prefix stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSet {
    pub current: String,
    pub local: Vec<String>,
    pub remote: Vec<String>,
    pub all: Vec<String>,
    pub count: usize,
}

impl BranchSet {
    pub fn contains(&self, name: &str) -> bool {
        self.all.iter().any(|b| b == name)
    }
}

/// Result of a branch creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCreation {
    pub branch_name: String,
    pub previous_branch: String,
    pub current_branch: String,
    pub created: bool,
    pub checked_out: bool,
    pub message: String,
}

/// Options for [`GitClient::create_branch`]
#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Switch the working tree onto the new branch (default: true)
    pub auto_checkout: bool,
    /// Optional start point; defaults to the current HEAD
    pub base_branch: Option<String>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            auto_checkout: true,
            base_branch: None,
        }
    }
}

/// High-level git operations against a repository path.
///
/// Stateless apart from the runner's limits; every call re-reads the
/// repository, so concurrent requests only contend on git's own lock files.
#[derive(Debug, Clone, Default)]
pub struct GitClient {
    runner: GitRunner,
}

impl GitClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runner(runner: GitRunner) -> Self {
        Self { runner }
    }

    /// Confirm the path hosts a usable Git repository.
    ///
    /// Checks, in order: path exists, path is a directory, a `.git` entry
    /// sits directly under it, and the `git` executable answers a version
    /// query. Each failure maps to its own error kind so callers can tell
    /// "path missing" from "not a repo" from "git not installed".
    pub async fn validate(&self, path: &Path) -> Result<RepoValidation> {
        ensure_directory(path).await?;

        if !path.join(".git").exists() {
            return Err(GitError::NotARepository {
                path: path.to_path_buf(),
            });
        }

        let git_version = self.runner.version(path).await?;
        self.runner.run(&["status"], path).await?;

        tracing::debug!(path = %path.display(), git_version = %git_version, "repository validated");

        Ok(RepoValidation {
            is_valid: true,
            path: path.display().to_string(),
            git_version,
            message: "Valid Git repository".to_string(),
        })
    }

    /// Read the current branch, dirty flag, last commit, and remote summary.
    ///
    /// Never mutates the repository. "No commits yet" and "no remote
    /// configured" are not errors, only absent fields.
    pub async fn status(&self, path: &Path) -> Result<RepoStatus> {
        ensure_directory(path).await?;

        let branch = self.runner.run(&["branch", "--show-current"], path).await?;
        let current_branch = if branch.stdout.is_empty() {
            DETACHED_HEAD.to_string()
        } else {
            branch.stdout
        };

        let porcelain = self.runner.run(&["status", "--porcelain"], path).await?;
        let has_changes = !porcelain.stdout.is_empty();

        let last_commit = self
            .runner
            .run(&["log", "--oneline", "-1"], path)
            .await
            .ok()
            .map(|o| o.stdout)
            .filter(|s| !s.is_empty());

        let remote_status = self
            .runner
            .run(&["remote", "-v"], path)
            .await
            .ok()
            .map(|o| o.stdout)
            .filter(|s| !s.is_empty());

        Ok(RepoStatus {
            current_branch,
            has_changes,
            is_clean: !has_changes,
            last_commit,
            remote_status,
            status_details: porcelain.stdout,
        })
    }

    /// Enumerate local and remote branches.
    ///
    /// A repository with no configured remote yields an empty remote set
    /// rather than an error.
    pub async fn branches(&self, path: &Path) -> Result<BranchSet> {
        ensure_directory(path).await?;

        let local_out = self.runner.run(&["branch"], path).await?;
        let local = parse_local_branches(&local_out.stdout);

        let current_out = self.runner.run(&["branch", "--show-current"], path).await?;
        let current = current_out.stdout;

        let remote = match self.runner.run(&["branch", "-r"], path).await {
            Ok(out) => parse_remote_branches(&out.stdout),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "remote branch listing unavailable");
                Vec::new()
            }
        };

        let mut all = local.clone();
        for name in &remote {
            if !all.contains(name) {
                all.push(name.clone());
            }
        }
        let count = all.len();

        Ok(BranchSet {
            current,
            local,
            remote,
            all,
            count,
        })
    }

    /// Create a branch from the repository's current position.
    ///
    /// The sequence is explicit and short-circuiting: validate, read the
    /// pre-state, refuse names already taken locally or on a remote, run
    /// the creation command, then re-read the current branch to corroborate
    /// the result instead of assuming success.
    pub async fn create_branch(
        &self,
        name: &str,
        path: &Path,
        options: CreateOptions,
    ) -> Result<BranchCreation> {
        validate_branch_name(name)?;

        self.validate(path).await?;
        let before = self.status(path).await?;

        let branches = self.branches(path).await?;
        if branches.contains(name) {
            return Err(GitError::BranchExists {
                name: name.to_string(),
            });
        }

        let mut args: Vec<&str> = if options.auto_checkout {
            vec!["checkout", "-b", name]
        } else {
            vec!["branch", name]
        };
        if let Some(base) = options.base_branch.as_deref() {
            args.push(base);
        }
        self.runner.run(&args, path).await?;

        let after = self.status(path).await?;
        let expected = if options.auto_checkout {
            name
        } else {
            before.current_branch.as_str()
        };
        if after.current_branch != expected {
            return Err(GitError::VerificationFailed {
                expected: expected.to_string(),
                actual: after.current_branch,
            });
        }

        let message = if options.auto_checkout {
            format!(
                "Branch \"{}\" created and checked out from \"{}\"",
                name, before.current_branch
            )
        } else {
            format!(
                "Branch \"{}\" created from \"{}\" (not checked out)",
                name, before.current_branch
            )
        };

        tracing::info!(
            branch = name,
            previous = %before.current_branch,
            checked_out = options.auto_checkout,
            "branch created"
        );

        Ok(BranchCreation {
            branch_name: name.to_string(),
            previous_branch: before.current_branch,
            current_branch: after.current_branch,
            created: true,
            checked_out: options.auto_checkout,
            message,
        })
    }

    /// Report the installed git version from an arbitrary directory
    pub async fn git_version(&self, dir: &Path) -> Result<String> {
        self.runner.version(dir).await
    }
}

/// Check a working directory before any git process targets it.
///
/// Spawning with a nonexistent working directory fails with the same
/// ENOENT a missing `git` binary produces, so the distinction between
/// "path missing" and "git not installed" has to be made here, before
/// the spawn.
async fn ensure_directory(path: &Path) -> Result<()> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GitError::PathNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => GitError::PermissionDenied {
            detail: format!("cannot read {}", path.display()),
        },
        _ => GitError::Unknown {
            message: format!("cannot stat {}: {e}", path.display()),
        },
    })?;

    if !meta.is_dir() {
        return Err(GitError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Reject branch names the service will not pass to git.
///
/// Policy: reject rather than coerce. Empty names, interior whitespace,
/// control characters, and a leading `-` (which git would parse as an
/// option) all fail with `InvalidBranchName`. Anything else is passed
/// through literally as a single argv element.
pub fn validate_branch_name(name: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(GitError::InvalidBranchName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("name is empty");
    }
    if name.starts_with('-') {
        return reject("name starts with \"-\"");
    }
    if name.chars().any(char::is_whitespace) {
        return reject("name contains whitespace");
    }
    if name.chars().any(char::is_control) {
        return reject("name contains control characters");
    }
    Ok(())
}

/// Parse `git branch` output: strip the current/worktree markers and
/// surrounding whitespace, drop the detached-HEAD pseudo entry.
fn parse_local_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim_start_matches(['*', '+']).trim())
        .filter(|line| !line.is_empty() && !line.starts_with('('))
        .map(str::to_string)
        .collect()
}

/// Parse `git branch -r` output: strip the remote-name prefix and drop
/// the symbolic `HEAD ->` pointer entry.
fn parse_remote_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("HEAD"))
        .map(|line| match line.split_once('/') {
            Some((_, name)) => name.to_string(),
            None => line.to_string(),
        })
        .collect()
}
