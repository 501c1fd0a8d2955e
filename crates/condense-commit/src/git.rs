//! Reading the change to describe: staged git changes or stdin.

use crate::error::CommitError;
use std::io::Read;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Inputs shorter than this are treated as an empty diff.
pub const MIN_DIFF_CHARS: usize = 5;

/// Run a git command in `workdir` and return its stdout.
async fn run_git(workdir: &Path, args: &[&str]) -> Result<String, CommitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(workdir)
        .output()
        .await
        .map_err(CommitError::GitSpawn)?;

    if !output.status.success() {
        return Err(CommitError::GitFailed {
            args: args.join(" "),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!("git {} returned {} bytes", args.join(" "), stdout.len());
    Ok(stdout)
}

/// The staged changes (`git diff --cached`) of the repository at `workdir`.
pub async fn staged_diff(workdir: &Path) -> Result<String, CommitError> {
    run_git(workdir, &["diff", "--cached"]).await
}

/// All of stdin.
pub fn read_stdin() -> Result<String, CommitError> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(CommitError::Stdin)?;
    Ok(buf)
}

/// Reject inputs too short to describe.
pub fn ensure_nonempty(diff: String) -> Result<String, CommitError> {
    if diff.chars().count() < MIN_DIFF_CHARS {
        return Err(CommitError::EmptyDiff);
    }
    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn git(dir: &Path, args: &[&str]) {
        run_git(dir, args).await.unwrap();
    }

    #[test]
    fn short_input_is_empty() {
        assert!(matches!(
            ensure_nonempty("\n\n".into()),
            Err(CommitError::EmptyDiff)
        ));
        assert!(ensure_nonempty("diff --git a/x b/x".into()).is_ok());
    }

    #[tokio::test]
    async fn staged_diff_shows_added_file() {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "--quiet"]).await;
        std::fs::write(dir.path().join("notes.txt"), "first line\n").unwrap();
        git(dir.path(), &["add", "notes.txt"]).await;

        let diff = staged_diff(dir.path()).await.unwrap();
        assert!(diff.starts_with("diff --git a/notes.txt b/notes.txt"));
        assert!(diff.contains("+first line"));
    }

    #[tokio::test]
    async fn nothing_staged_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "--quiet"]).await;
        std::fs::write(dir.path().join("untracked.txt"), "x\n").unwrap();

        let diff = staged_diff(dir.path()).await.unwrap();
        assert!(matches!(ensure_nonempty(diff), Err(CommitError::EmptyDiff)));
    }

    #[tokio::test]
    async fn failing_command_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        match run_git(dir.path(), &["no-such-subcommand"]).await {
            Err(CommitError::GitFailed { args, code, .. }) => {
                assert_eq!(args, "no-such-subcommand");
                assert_ne!(code, 0);
            }
            other => panic!("Expected GitFailed, got {other:?}"),
        }
    }
}
