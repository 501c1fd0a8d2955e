//! Token estimation and per-model request budgets.
//!
//! Every size decision in the engine goes through an oracle's `measure`. The
//! OpenRouter backend uses [`TokenEstimator`]: a character-ratio estimate that
//! is deterministic, monotonic in text length, and subadditive under
//! concatenation (`measure(a + b) <= measure(a) + measure(b)`). The budget
//! arithmetic in the summarization loop relies on that last property.

/// Default characters per token (conservative estimate for English text and
/// code). Most tokenizers average 3-4 chars per token; 3.5 is the middle.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Tokens consumed by chat message wrapping on every request.
pub const REQUEST_OVERHEAD_TOKENS: usize = 8;

/// Context window used when a model is not in the lookup table.
pub const DEFAULT_CONTEXT_WINDOW: usize = 4096;

/// Character-ratio token estimator.
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    chars_per_token: f64,
}

impl TokenEstimator {
    /// Create an estimator with a calibrated chars-per-token ratio. Pass
    /// `None` to use [`DEFAULT_CHARS_PER_TOKEN`]. Non-positive ratios fall back
    /// to the default.
    pub fn with_calibration(calibrated_cpt: Option<f64>) -> Self {
        let cpt = calibrated_cpt
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(DEFAULT_CHARS_PER_TOKEN);
        Self {
            chars_per_token: cpt,
        }
    }

    /// Estimated tokens for `text`: `ceil(bytes / chars_per_token)`.
    pub fn estimate(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::with_calibration(None)
    }
}

/// Lookup the context window (in tokens) for a model by name.
///
/// Matches on the model name segment after the last `/`, so
/// `"openai/gpt-4"` and `"gpt-4"` resolve the same way.
pub fn context_window_for_model(model: &str) -> usize {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    if name.contains("gpt-3.5-turbo-16k") {
        16_385
    } else if name.contains("gpt-3.5-turbo") {
        4097
    } else if name.contains("gpt-4o") || name.contains("gpt-4-turbo") {
        128_000
    } else if name.contains("gpt-4-32k") {
        32_768
    } else if name.contains("gpt-4") {
        8192
    } else if name.contains("claude") {
        200_000
    } else if name.contains("gemini") {
        1_000_000
    } else if name.contains("deepseek") {
        64_000
    } else {
        DEFAULT_CONTEXT_WINDOW
    }
}

/// Request budget for one backend: context window minus reserves.
#[derive(Debug, Clone, Copy)]
pub struct RequestBudget {
    context_window: usize,
    overhead: usize,
    output_reserve: usize,
}

impl RequestBudget {
    pub fn for_model(model: &str) -> Self {
        Self {
            context_window: context_window_for_model(model),
            overhead: REQUEST_OVERHEAD_TOKENS,
            output_reserve: 0,
        }
    }

    /// Override the context window size (in tokens).
    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    /// Reserve tokens for the model's response.
    pub fn with_output_reserve(mut self, tokens: usize) -> Self {
        self.output_reserve = tokens;
        self
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Largest prompt accepted in one request.
    pub fn max_prompt_tokens(&self) -> usize {
        self.context_window
            .saturating_sub(self.overhead)
            .saturating_sub(self.output_reserve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        let est = TokenEstimator::default();
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("a"), 1);
        assert_eq!(est.estimate("abcdefg"), 2);
        assert_eq!(est.estimate("abcdefgh"), 3);
    }

    #[test]
    fn estimate_is_subadditive() {
        let est = TokenEstimator::default();
        let a = "fn main() {\n";
        let b = "    println!(\"hi\");\n}\n";
        let joined = format!("{a}{b}");
        assert!(est.estimate(&joined) <= est.estimate(a) + est.estimate(b));
    }

    #[test]
    fn calibrated_ratio_changes_estimate() {
        let default = TokenEstimator::default();
        let calibrated = TokenEstimator::with_calibration(Some(4.0));
        let text = "a".repeat(40_000);
        assert!(calibrated.estimate(&text) < default.estimate(&text));
    }

    #[test]
    fn invalid_calibration_falls_back() {
        let est = TokenEstimator::with_calibration(Some(0.0));
        assert!((est.chars_per_token() - DEFAULT_CHARS_PER_TOKEN).abs() < f64::EPSILON);
    }

    #[test]
    fn context_window_lookup() {
        assert_eq!(context_window_for_model("openai/gpt-3.5-turbo"), 4097);
        assert_eq!(context_window_for_model("gpt-4"), 8192);
        assert_eq!(context_window_for_model("openai/gpt-4o-mini"), 128_000);
        assert_eq!(context_window_for_model("anthropic/claude-sonnet-4"), 200_000);
        assert_eq!(context_window_for_model("mystery"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn max_prompt_tokens_subtracts_reserves() {
        let budget = RequestBudget::for_model("gpt-3.5-turbo").with_output_reserve(500);
        assert_eq!(budget.max_prompt_tokens(), 4097 - 8 - 500);
    }

    #[test]
    fn max_prompt_tokens_saturates_at_zero() {
        let budget = RequestBudget::for_model("gpt-4")
            .with_context_window(100)
            .with_output_reserve(800);
        assert_eq!(budget.max_prompt_tokens(), 0);
    }
}
