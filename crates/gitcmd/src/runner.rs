//! Bounded git command execution and error translation
//!
//! Every git invocation goes through [`GitRunner::run`]: an argv vector
//! spawned directly (no shell), a hard wall-clock timeout, and a capped
//! output buffer. Failures are routed through [`translate`] so raw git
//! stderr never reaches a caller unfiltered.

use crate::{GitError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

/// Wall-clock budget for a single git command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap per output stream, in bytes
pub const DEFAULT_MAX_OUTPUT: usize = 1024 * 1024;

/// Output from a completed git command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Trimmed stdout
    pub stdout: String,
    /// Trimmed stderr
    pub stderr: String,
    /// The command line that ran, for diagnostics
    pub command: String,
    /// Whether either stream was cut at the output cap
    pub truncated: bool,
}

/// Executes git subcommands with resource bounds
#[derive(Debug, Clone)]
pub struct GitRunner {
    timeout: Duration,
    max_output: usize,
}

impl Default for GitRunner {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_output: DEFAULT_MAX_OUTPUT,
        }
    }
}

impl GitRunner {
    /// Create a runner with the default limits (30s, 1 MiB per stream)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner with custom limits
    pub fn with_limits(timeout: Duration, max_output: usize) -> Self {
        Self {
            timeout,
            max_output,
        }
    }

    /// Run a git subcommand in the given working directory.
    ///
    /// Arguments are passed as an argv vector, never through a shell, so a
    /// branch name containing spaces or metacharacters is inert data. On a
    /// non-zero exit the combined output is translated into a typed
    /// [`GitError`]; on timeout the child is killed, never orphaned.
    pub async fn run(&self, args: &[&str], dir: &Path) -> Result<CommandOutput> {
        let rendered = render_command(args);
        tracing::debug!(command = %rendered, dir = %dir.display(), "running git command");

        let mut cmd = tokio::process::Command::new("git");
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| spawn_error(e, &rendered))?;

        // Dropping the future on timeout drops the child, and kill_on_drop
        // guarantees the process is terminated rather than orphaned.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| GitError::Unknown {
                message: format!("failed to collect output of {rendered}: {e}"),
            })?,
            Err(_) => {
                tracing::warn!(command = %rendered, timeout_secs = self.timeout.as_secs(), "git command timed out");
                return Err(GitError::Timeout {
                    command: rendered,
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let (stdout, out_cut) = bounded_text(&output.stdout, self.max_output);
        let (stderr, err_cut) = bounded_text(&output.stderr, self.max_output);

        if !output.status.success() {
            tracing::debug!(command = %rendered, stderr = %stderr, "git command failed");
            return Err(translate(&stderr, &stdout, dir));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            command: rendered,
            truncated: out_cut || err_cut,
        })
    }

    /// Report the installed git version
    pub async fn version(&self, dir: &Path) -> Result<String> {
        let output = self.run(&["--version"], dir).await?;
        Ok(output.stdout)
    }
}

fn render_command(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}

fn spawn_error(e: std::io::Error, command: &str) -> GitError {
    match e.kind() {
        std::io::ErrorKind::NotFound => GitError::GitNotInstalled,
        std::io::ErrorKind::PermissionDenied => GitError::PermissionDenied {
            detail: format!("cannot execute {command}"),
        },
        _ => GitError::Unknown {
            message: format!("failed to spawn {command}: {e}"),
        },
    }
}

/// Clamp raw output to the buffer cap and lossily decode it
fn bounded_text(bytes: &[u8], max: usize) -> (String, bool) {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max {
        (text.trim().to_string(), false)
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        (text[..end].trim().to_string(), true)
    }
}

/// Map raw git output into the closed [`GitError`] taxonomy.
///
/// Substring matching against known git phrasings, case-insensitive,
/// stderr taking precedence over stdout. Best effort: anything unmatched
/// surfaces as [`GitError::Unknown`] with the original text intact.
pub fn translate(stderr: &str, stdout: &str, dir: &Path) -> GitError {
    let haystack = format!("{stderr}\n{stdout}").to_lowercase();

    if haystack.contains("not a git repository") {
        return GitError::NotARepository {
            path: dir.to_path_buf(),
        };
    }
    if haystack.contains("already exists") {
        return GitError::BranchExists {
            name: quoted_token(stderr)
                .or_else(|| quoted_token(stdout))
                .unwrap_or_else(|| "requested".to_string()),
        };
    }
    if haystack.contains("not a valid object name") || haystack.contains("bad revision") {
        return GitError::BadBaseBranch {
            name: quoted_token(stderr)
                .or_else(|| quoted_token(stdout))
                .unwrap_or_else(|| "requested".to_string()),
        };
    }
    if haystack.contains("uncommitted changes")
        || haystack.contains("would be overwritten")
        || haystack.contains("commit your changes or stash them")
    {
        return GitError::DirtyWorkTree;
    }
    if haystack.contains("permission denied") || haystack.contains("access denied") {
        return GitError::PermissionDenied {
            detail: first_meaningful_line(stderr, stdout),
        };
    }
    if haystack.contains("command not found") || haystack.contains("is not recognized") {
        return GitError::GitNotInstalled;
    }

    GitError::Unknown {
        message: first_meaningful_line(stderr, stdout),
    }
}

fn first_meaningful_line(stderr: &str, stdout: &str) -> String {
    let text = if stderr.trim().is_empty() {
        stdout
    } else {
        stderr
    };
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown git error")
        .to_string()
}

/// Pull the first single-quoted token out of a git message,
/// e.g. `fatal: a branch named 'main' already exists` -> `main`
fn quoted_token(text: &str) -> Option<String> {
    let start = text.find('\'')?;
    let rest = &text[start + 1..];
    let end = rest.find('\'')?;
    let token = &rest[..end];
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dir() -> PathBuf {
        PathBuf::from("/tmp/repo")
    }

    #[test]
    fn test_translate_not_a_repository() {
        let err = translate(
            "fatal: not a git repository (or any of the parent directories): .git",
            "",
            &dir(),
        );
        assert!(matches!(err, GitError::NotARepository { .. }));
    }

    #[test]
    fn test_translate_branch_exists_extracts_name() {
        let err = translate("fatal: a branch named 'feat/login' already exists", "", &dir());
        match err {
            GitError::BranchExists { name } => assert_eq!(name, "feat/login"),
            other => panic!("expected BranchExists, got {other:?}"),
        }
    }

    #[test]
    fn test_translate_bad_base_branch() {
        let err = translate(
            "fatal: 'no-such-base' is not a valid object name",
            "",
            &dir(),
        );
        assert!(matches!(err, GitError::BadBaseBranch { .. }));
    }

    #[test]
    fn test_translate_dirty_work_tree() {
        let err = translate(
            "error: Your local changes to the following files would be overwritten by checkout",
            "",
            &dir(),
        );
        assert!(matches!(err, GitError::DirtyWorkTree));
    }

    #[test]
    fn test_translate_permission_denied() {
        let err = translate("fatal: Permission denied", "", &dir());
        assert!(matches!(err, GitError::PermissionDenied { .. }));
    }

    #[test]
    fn test_translate_git_missing() {
        let err = translate("git: command not found", "", &dir());
        assert!(matches!(err, GitError::GitNotInstalled));
        let err = translate("'git' is not recognized as an internal or external command", "", &dir());
        assert!(matches!(err, GitError::GitNotInstalled));
    }

    #[test]
    fn test_translate_is_case_insensitive() {
        let err = translate("FATAL: NOT A GIT REPOSITORY", "", &dir());
        assert!(matches!(err, GitError::NotARepository { .. }));
    }

    #[test]
    fn test_translate_ordering_prefers_repository_check() {
        // A message matching two patterns resolves in documented order
        let err = translate(
            "fatal: not a git repository; branch already exists",
            "",
            &dir(),
        );
        assert!(matches!(err, GitError::NotARepository { .. }));
    }

    #[test]
    fn test_translate_unmatched_keeps_message() {
        let err = translate("fatal: something entirely novel went wrong", "", &dir());
        match err {
            GitError::Unknown { message } => {
                assert_eq!(message, "fatal: something entirely novel went wrong");
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_translate_falls_back_to_stdout() {
        let err = translate("", "some stdout-only failure text", &dir());
        match err {
            GitError::Unknown { message } => assert_eq!(message, "some stdout-only failure text"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_bounded_text_within_limit() {
        let (text, cut) = bounded_text(b"  hello world\n", 1024);
        assert_eq!(text, "hello world");
        assert!(!cut);
    }

    #[test]
    fn test_bounded_text_truncates() {
        let (text, cut) = bounded_text(b"abcdefgh", 4);
        assert_eq!(text, "abcd");
        assert!(cut);
    }

    #[test]
    fn test_bounded_text_respects_char_boundaries() {
        // "héllo": the accented char is two bytes; cutting through it must
        // back off instead of producing a replacement character
        let bytes = "h\u{e9}llo".as_bytes();
        let (text, cut) = bounded_text(bytes, 2);
        assert_eq!(text, "h");
        assert!(cut);
    }

    #[test]
    fn test_quoted_token() {
        assert_eq!(
            quoted_token("fatal: a branch named 'x' already exists"),
            Some("x".to_string())
        );
        assert_eq!(quoted_token("no quotes here"), None);
        assert_eq!(quoted_token("empty '' quotes"), None);
    }

    #[test]
    fn test_render_command() {
        assert_eq!(
            render_command(&["checkout", "-b", "feat/x"]),
            "git checkout -b feat/x"
        );
    }

    #[tokio::test]
    async fn test_run_reports_missing_directory_as_unknown_spawn_failure() {
        let runner = GitRunner::new();
        let result = runner
            .run(&["status"], Path::new("/definitely/not/a/real/dir"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_version_runs_anywhere() {
        // Guard: only meaningful where git is installed
        let runner = GitRunner::new();
        if let Ok(version) = runner.version(Path::new(".")).await {
            assert!(version.contains("git version"));
        }
    }
}
