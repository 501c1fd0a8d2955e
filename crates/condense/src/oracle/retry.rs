//! Retry policy with exponential backoff and jitter.
//!
//! The reduction engine never retries on its own: a failed request surfaces to
//! the caller. Callers who want retries wrap their oracle in
//! [`RetryingOracle`], which retries transient transport failures (429, 5xx,
//! network timeouts) and never retries rejections or trivial prompts.

use super::{Oracle, OracleFuture};
use crate::error::OracleError;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number; no rand dependency.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Whether an oracle error is a transient (retryable) failure.
pub fn is_transient_error(error: &OracleError) -> bool {
    let OracleError::Transport { message, status } = error else {
        return false;
    };

    if let Some(status) = status {
        return matches!(*status, 429 | 500 | 502 | 503 | 504);
    }

    let lower = message.to_lowercase();
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
        "network",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// An [`Oracle`] that retries transient failures of the wrapped oracle.
pub struct RetryingOracle<O> {
    inner: O,
    config: RetryConfig,
}

impl<O: Oracle> RetryingOracle<O> {
    pub fn new(inner: O, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

impl<O: Oracle> Oracle for RetryingOracle<O> {
    fn answer(&self, prompt: &str) -> OracleFuture<'_> {
        let prompt = prompt.to_string();
        Box::pin(async move {
            let mut attempt = 0;
            loop {
                match self.inner.answer(&prompt).await {
                    Ok(v) => return Ok(v),
                    Err(e) if attempt < self.config.max_retries && is_transient_error(&e) => {
                        let delay = self.config.delay_for_attempt(attempt);
                        warn!(
                            "Transient oracle error (attempt {}/{}): {e}. Retrying in {delay:?}...",
                            attempt + 1,
                            self.config.max_retries,
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }

    fn measure(&self, text: &str) -> usize {
        self.inner.measure(text)
    }

    fn budget(&self) -> usize {
        self.inner.budget()
    }

    fn identity(&self) -> String {
        // Retries do not change answers, so cached entries stay shared.
        self.inner.identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error until `failures` calls have been made.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> OracleError,
    }

    impl Oracle for Flaky {
        fn answer(&self, _prompt: &str) -> OracleFuture<'_> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    Err((self.error)())
                } else {
                    Ok("ok".to_string())
                }
            })
        }
        fn measure(&self, text: &str) -> usize {
            text.len()
        }
        fn budget(&self) -> usize {
            100
        }
        fn identity(&self) -> String {
            "Flaky".into()
        }
    }

    fn fast(retries: u32) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryConfig::with_retries(retries)
        }
    }

    fn rate_limited() -> OracleError {
        OracleError::Transport {
            message: "OpenRouter API HTTP 429: rate limited".into(),
            status: Some(429),
        }
    }

    fn rejected() -> OracleError {
        OracleError::Rejected {
            message: "too long".into(),
            prompt_tokens: 9000,
        }
    }

    #[test]
    fn default_config_no_retries() {
        assert_eq!(RetryConfig::default().max_retries, 0);
    }

    #[test]
    fn delay_increases_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(5)
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);
        assert!(d1 > d0, "d1={d1:?} should be > d0={d0:?}");
        assert!(d2 > d1, "d2={d2:?} should be > d1={d1:?}");
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_delay: Duration::from_secs(2),
            ..RetryConfig::with_retries(10)
        };
        assert!(config.delay_for_attempt(10) <= Duration::from_secs(2));
    }

    #[test]
    fn transient_errors_detected() {
        assert!(is_transient_error(&rate_limited()));
        assert!(is_transient_error(&OracleError::transport(
            "request failed: connection reset"
        )));
        assert!(!is_transient_error(&rejected()));
        assert!(!is_transient_error(&OracleError::Transport {
            message: "HTTP 401".into(),
            status: Some(401),
        }));
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let flaky = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            error: rate_limited,
        };
        let oracle = RetryingOracle::new(flaky, fast(3));
        assert_eq!(oracle.answer("prompt").await.unwrap(), "ok");
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let flaky = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
            error: rate_limited,
        };
        let oracle = RetryingOracle::new(flaky, fast(2));
        assert!(oracle.answer("prompt").await.is_err());
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejection_never_retried() {
        let flaky = Flaky {
            failures: 1,
            calls: AtomicU32::new(0),
            error: rejected,
        };
        let oracle = RetryingOracle::new(flaky, fast(5));
        assert!(oracle.answer("prompt").await.unwrap_err().is_rejected());
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delegates_size_and_identity() {
        let flaky = Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            error: rejected,
        };
        let oracle = RetryingOracle::new(flaky, RetryConfig::default());
        assert_eq!(oracle.measure("abc"), 3);
        assert_eq!(oracle.budget(), 100);
        assert_eq!(oracle.identity(), "Flaky");
    }
}
