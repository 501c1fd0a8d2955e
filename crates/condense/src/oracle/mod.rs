//! The oracle abstraction: a size-limited text-generation backend.
//!
//! The [`Oracle`] trait is the only thing the reduction engine knows about a
//! backend. It needs four capabilities:
//!
//! - [`Oracle::answer`]: one generation request, prompt in, text out.
//! - [`Oracle::measure`]: deterministic, monotonic size of a text in the
//!   backend's token unit.
//! - [`Oracle::budget`]: the largest prompt (in that unit) one request accepts.
//! - [`Oracle::identity`]: a stable label for the backend and model, used to
//!   keep cached answers from leaking across backends.
//!
//! Bundled implementations:
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`OpenRouterOracle`] | OpenRouter chat completions |
//! | [`RetryingOracle`] | Retry policy wrapper for any oracle |

pub mod openrouter;
pub mod retry;

pub use openrouter::OpenRouterOracle;
pub use retry::{RetryConfig, RetryingOracle};

use crate::error::OracleError;
use std::future::Future;
use std::pin::Pin;

/// Prompts shorter than this many characters are rejected before any request.
pub const MIN_PROMPT_CHARS: usize = 26;

/// Boxed future returned by [`Oracle::answer`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>>;

/// A bounded text-generation backend.
///
/// # Example
///
/// ```ignore
/// struct Shouty;
///
/// impl Oracle for Shouty {
///     fn answer(&self, prompt: &str) -> OracleFuture<'_> {
///         let prompt = prompt.to_string();
///         Box::pin(async move {
///             check_prompt(&prompt)?;
///             Ok(prompt.to_uppercase())
///         })
///     }
///     fn measure(&self, text: &str) -> usize { text.split_whitespace().count() }
///     fn budget(&self) -> usize { 1000 }
///     fn identity(&self) -> String { "Shouty".into() }
/// }
/// ```
pub trait Oracle: Send + Sync {
    /// Issue one generation request and return its text.
    ///
    /// Implementations must reject trivial prompts with
    /// [`OracleError::TrivialPrompt`] before any network traffic, report
    /// capacity refusals as [`OracleError::Rejected`] carrying
    /// `measure(prompt)`, and never truncate the prompt.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible (object-safe).
    fn answer(&self, prompt: &str) -> OracleFuture<'_>;

    /// Size of `text` in this backend's token unit.
    fn measure(&self, text: &str) -> usize;

    /// Largest prompt size accepted by one request.
    fn budget(&self) -> usize;

    /// Stable label for this backend and model.
    fn identity(&self) -> String;
}

impl<T: Oracle + ?Sized> Oracle for Box<T> {
    fn answer(&self, prompt: &str) -> OracleFuture<'_> {
        (**self).answer(prompt)
    }

    fn measure(&self, text: &str) -> usize {
        (**self).measure(text)
    }

    fn budget(&self) -> usize {
        (**self).budget()
    }

    fn identity(&self) -> String {
        (**self).identity()
    }
}

/// Guard against degenerate requests.
pub fn check_prompt(prompt: &str) -> Result<(), OracleError> {
    let len = prompt.chars().count();
    if len < MIN_PROMPT_CHARS {
        return Err(OracleError::TrivialPrompt {
            len,
            min: MIN_PROMPT_CHARS,
        });
    }
    Ok(())
}
