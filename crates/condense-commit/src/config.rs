//! Commit-tool configuration with sensible defaults.
//!
//! [`CommitConfig`] captures the command-line settings and converts them into
//! `condense` types via [`reduce_config`](CommitConfig::reduce_config),
//! [`cache`](CommitConfig::cache) and [`build_llm`](CommitConfig::build_llm).

use crate::error::CommitError;
use crate::prompt::RESUMMARY_PROMPT;
use condense::cache::ResponseCache;
use condense::config::ReduceConfig;
use condense::events::{CompositeEventHandler, LoggingHandler, TranscriptHandler};
use condense::llm::Llm;
use condense::oracle::{OpenRouterOracle, Oracle, RetryConfig, RetryingOracle};
use condense::split::RuleSet;
use condense::{DEFAULT_MODEL, OpenRouterClient};
use std::path::PathBuf;

/// Model selected by the `--gpt4` shortcut.
pub const GPT4_MODEL: &str = "openai/gpt-4";

/// Column width of the printed message.
pub const WRAP_WIDTH: usize = 72;

/// Configuration for one commit-message run.
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Repository to read staged changes from. Default: `"."`.
    pub workdir: PathBuf,
    /// Read `git diff --cached` instead of stdin. Default: `false`.
    pub use_git: bool,
    /// Append the first-pass change list. Default: `true`.
    pub include_detail: bool,
    /// Retries for transient API failures. Default: `0`.
    pub retries: u32,
    /// Concurrent chunk requests per pass. Default: `1`.
    pub jobs: usize,
    /// Keep responses in memory only. Default: `false`.
    pub no_cache: bool,
    /// Cache location; the platform cache directory when `None`.
    pub cache_dir: Option<PathBuf>,
    /// Append quoted prompts and responses here.
    pub transcript: Option<PathBuf>,
    /// Column width of the printed message. Default: [`WRAP_WIDTH`].
    pub wrap_width: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            workdir: PathBuf::from("."),
            use_git: false,
            include_detail: true,
            retries: 0,
            jobs: 1,
            no_cache: false,
            cache_dir: None,
            transcript: None,
            wrap_width: WRAP_WIDTH,
        }
    }
}

impl CommitConfig {
    /// Diff boundary rules and the re-summary prompt for later passes.
    pub fn reduce_config(&self) -> ReduceConfig {
        ReduceConfig::default()
            .with_rules(RuleSet::diff())
            .with_followup_prompt(RESUMMARY_PROMPT)
            .with_max_concurrency(self.jobs)
    }

    pub fn cache(&self) -> ResponseCache {
        match (&self.cache_dir, self.no_cache) {
            (_, true) => ResponseCache::in_memory(),
            (Some(dir), false) => ResponseCache::open(dir),
            (None, false) => ResponseCache::open_default(),
        }
    }

    /// OpenRouter backend for [`model`](Self::model), wrapped in the retry
    /// policy.
    pub fn build_oracle(&self, api_key: &str) -> Result<Box<dyn Oracle>, CommitError> {
        let client = OpenRouterClient::with_headers(
            api_key,
            "https://github.com/condense-rs/condense",
            "condense-commit",
        )?;
        Ok(Box::new(RetryingOracle::new(
            OpenRouterOracle::new(client, &self.model),
            RetryConfig::with_retries(self.retries),
        )))
    }

    /// An [`Llm`] over `oracle` with this run's cache, rules and handlers.
    pub fn build_llm(&self, oracle: Box<dyn Oracle>) -> Result<Llm, CommitError> {
        let transcript = match &self.transcript {
            Some(path) => Some(TranscriptHandler::open(path).map_err(|source| {
                CommitError::Transcript {
                    path: path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        Ok(Llm::new(oracle, self.cache())
            .with_config(self.reduce_config())
            .with_event_handler(
                CompositeEventHandler::new()
                    .with(LoggingHandler)
                    .with_opt(transcript),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CommitConfig::default();
        assert_eq!(config.model, "openai/gpt-3.5-turbo");
        assert!(config.include_detail);
        assert!(!config.use_git);
        assert_eq!(config.wrap_width, 72);
    }

    #[test]
    fn reduce_config_uses_diff_rules() {
        let config = CommitConfig {
            jobs: 4,
            ..Default::default()
        };
        let reduce = config.reduce_config();
        assert_eq!(reduce.rules.len(), RuleSet::diff().len());
        assert_eq!(reduce.followup_prompt.as_deref(), Some(RESUMMARY_PROMPT));
        assert_eq!(reduce.max_concurrency, 4);
    }

    #[test]
    fn no_cache_wins_over_cache_dir() {
        let config = CommitConfig {
            no_cache: true,
            cache_dir: Some(PathBuf::from("/tmp/condense-test")),
            ..Default::default()
        };
        assert!(config.cache().dir().is_none());
    }

    #[test]
    fn oracle_identity_names_model() {
        let config = CommitConfig {
            model: GPT4_MODEL.to_string(),
            ..Default::default()
        };
        let oracle = config.build_oracle("test-key").unwrap();
        assert_eq!(oracle.identity(), "OpenRouter(openai/gpt-4)");
        assert_eq!(oracle.budget(), 8192 - 8);
    }

    #[test]
    fn transcript_is_opened_with_the_llm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        let config = CommitConfig {
            no_cache: true,
            transcript: Some(path.clone()),
            ..Default::default()
        };
        let oracle = config.build_oracle("test-key").unwrap();
        let llm = config.build_llm(oracle).unwrap();
        assert_eq!(llm.identity(), "OpenRouter(openai/gpt-3.5-turbo)");
        assert!(path.exists());
    }
}
