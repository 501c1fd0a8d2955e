//! Typed error hierarchy for the reduction engine.
//!
//! Three enums cover the three layers:
//! - `OracleError`: a single backend request (guard, rejection, transport)
//! - `ReduceError`: the summarization loop and everything it drives
//! - `RuleError`: building boundary rules from user patterns

use thiserror::Error;

/// Errors from a single oracle request.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The prompt is too short to be worth a request. Raised before any
    /// network traffic.
    #[error("Prompt is {len} characters; at least {min} are required")]
    TrivialPrompt { len: usize, min: usize },

    /// The backend refused a well-formed request (too large, policy, invalid).
    /// `prompt_tokens` is the locally measured size of the rejected prompt.
    #[error("Oracle rejected the request: {message}; computed token length={prompt_tokens}")]
    Rejected {
        message: String,
        prompt_tokens: usize,
    },

    /// Network, authentication, or decoding failure, passed through as-is.
    #[error("{message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },
}

impl OracleError {
    /// Shorthand for a transport failure without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        OracleError::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Whether this is a backend rejection (as opposed to a transport failure).
    pub fn is_rejected(&self) -> bool {
        matches!(self, OracleError::Rejected { .. })
    }
}

/// Errors from the summarization loop.
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("Text did not fit {target} tokens after {passes} reduction passes (still {tokens} tokens)")]
    IterationLimitExceeded {
        passes: u32,
        tokens: usize,
        target: usize,
    },

    #[error("Prompt alone needs {prompt_tokens} tokens, leaving no room within the {budget}-token budget")]
    PromptTooLarge { prompt_tokens: usize, budget: usize },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Errors from constructing boundary rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid boundary pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Boundary pattern '{pattern}' has {groups} capture groups; exactly 2 are required")]
    WrongGroupCount { pattern: String, groups: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_message_carries_token_count() {
        let err = OracleError::Rejected {
            message: "maximum context length exceeded".into(),
            prompt_tokens: 5012,
        };
        let text = err.to_string();
        assert!(text.contains("maximum context length"));
        assert!(text.contains("5012"));
        assert!(err.is_rejected());
    }

    #[test]
    fn transport_error_passes_message_through() {
        let err = OracleError::transport("request failed: connection reset");
        assert_eq!(err.to_string(), "request failed: connection reset");
        assert!(!err.is_rejected());
    }

    #[test]
    fn reduce_error_wraps_oracle_error() {
        let err: ReduceError = OracleError::TrivialPrompt { len: 5, min: 26 }.into();
        match &err {
            ReduceError::Oracle(OracleError::TrivialPrompt { len, .. }) => assert_eq!(*len, 5),
            _ => panic!("Expected Oracle(TrivialPrompt) variant"),
        }
        assert!(err.to_string().contains("at least 26"));
    }

    #[test]
    fn iteration_limit_is_matchable() {
        let err = ReduceError::IterationLimitExceeded {
            passes: 10,
            tokens: 9000,
            target: 4000,
        };
        assert!(matches!(
            err,
            ReduceError::IterationLimitExceeded { passes: 10, .. }
        ));
    }
}
