//! Tunables for the summarization loop.

use crate::split::RuleSet;

/// Default pass limit before [`ReduceError::IterationLimitExceeded`](crate::ReduceError::IterationLimitExceeded).
pub const DEFAULT_MAX_PASSES: u32 = 10;

/// Joins chunk outputs within a pass, and a prompt to its chunk.
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// Prompt used to shrink oversized input before the final request of
/// [`Llm::produce_result`](crate::llm::Llm::produce_result).
pub const DEFAULT_REDUCTION_PROMPT: &str =
    "Summarize the following text concisely, keeping every distinct point:";

/// Configuration for [`Llm`](crate::llm::Llm) reduction passes.
#[derive(Debug, Clone)]
pub struct ReduceConfig {
    /// Maximum number of reduction passes.
    pub max_passes: u32,
    /// Separator between a prompt and its chunk, and between chunk outputs.
    pub separator: String,
    /// Per-chunk requests in flight at once (1 = sequential).
    pub max_concurrency: usize,
    /// Boundary rules for splitting oversized text.
    pub rules: RuleSet,
    /// Prompt for passes after the first. `None` reuses the caller's prompt.
    pub followup_prompt: Option<String>,
    /// Prompt [`Llm::produce_result`](crate::llm::Llm::produce_result)
    /// reduces with before its final request.
    pub reduction_prompt: String,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            separator: DEFAULT_SEPARATOR.to_string(),
            max_concurrency: 1,
            rules: RuleSet::text(),
            followup_prompt: None,
            reduction_prompt: DEFAULT_REDUCTION_PROMPT.to_string(),
        }
    }
}

impl ReduceConfig {
    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Values below 1 are treated as 1.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_followup_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.followup_prompt = Some(prompt.into());
        self
    }

    pub fn with_reduction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.reduction_prompt = prompt.into();
        self
    }
}
