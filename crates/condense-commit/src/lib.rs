//! Git commit-message generator built on `condense`.
//!
//! Diffs that fit one request are described directly. Larger diffs are split
//! at file and hunk boundaries, turned into change lists, and re-summarized
//! until the commit request fits the model's budget.
//!
//! # Library usage
//!
//! ```ignore
//! use condense_commit::{CommitConfig, commit_message};
//!
//! let config = CommitConfig::default();
//! let oracle = config.build_oracle(&std::env::var("OPENROUTER_KEY")?)?;
//! let llm = config.build_llm(oracle)?;
//! let message = commit_message(&llm, &diff).await?;
//! println!("{}", message.render(config.include_detail));
//! ```
//!
//! # Binary
//!
//! ```sh
//! # Describe the staged changes
//! condense-commit --git
//!
//! # Describe a patch with GPT-4
//! git show HEAD | condense-commit -4
//! ```

pub mod commit;
pub mod config;
pub mod error;
pub mod git;
pub mod prompt;

pub use commit::{CommitMessage, commit_message, format_output};
pub use config::CommitConfig;
pub use error::CommitError;
