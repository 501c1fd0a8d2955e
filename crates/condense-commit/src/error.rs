//! Errors surfaced by the commit-message tool.

use condense::{OracleError, ReduceError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to run git: {0}")]
    GitSpawn(#[source] std::io::Error),

    #[error("git {args} exited with status {code}: {stderr}")]
    GitFailed {
        args: String,
        code: i32,
        stderr: String,
    },

    /// Matches the message the tool prints for missing input.
    #[error("Empty diff.")]
    EmptyDiff,

    #[error("OPENROUTER_KEY environment variable not set")]
    MissingApiKey,

    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("failed to open transcript '{}': {source}", .path.display())]
    Transcript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Reduce(#[from] ReduceError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}
