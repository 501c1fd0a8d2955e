//! The summarization loop.
//!
//! [`Llm`] is the explicit context object for one run: it owns the oracle,
//! the response cache, the call counters and the event handler. Nothing here
//! is global, so independent `Llm`s (and tests) never share state unless they
//! share a cache directory.
//!
//! # Reduction
//!
//! ```text
//! Input ──▶ Measuring ──▶ Fits
//!               │  ▲
//!      oversized│  │recombined
//!               ▼  │
//!           Splitting ──▶ PerChunkReduce ──▶ Recombining
//! ```
//!
//! Each pass splits the current text into chunks that fit one request
//! alongside the prompt, asks the prompt of every chunk (through the cache),
//! and joins the answers in chunk order. The loop stops as soon as the text
//! fits the target, or fails with
//! [`ReduceError::IterationLimitExceeded`] after
//! [`ReduceConfig::max_passes`] passes.

use crate::cache::{CacheKey, CacheOutcome, ResponseCache};
use crate::config::ReduceConfig;
use crate::counters::Counters;
use crate::error::{OracleError, ReduceError};
use crate::events::{EventHandler, NoopHandler, ReduceEvent};
use crate::oracle::{Oracle, check_prompt};
use crate::split::{self, Chunk};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

/// One completed reduction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// 1-based pass number.
    pub pass: u32,
    /// Size of the text the pass started from.
    pub input_tokens: usize,
    /// Number of chunk requests issued.
    pub chunk_count: usize,
    /// Recombined answers, the input of the next pass.
    pub output: String,
}

/// Result of [`Llm::summarize`]: the fitted text plus what each pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub text: String,
    pub passes: Vec<PassReport>,
}

impl Reduction {
    /// The output of the first pass, if any pass ran.
    pub fn first_pass(&self) -> Option<&PassReport> {
        self.passes.first()
    }
}

/// Context object tying an oracle to its cache, counters and events.
pub struct Llm {
    oracle: Box<dyn Oracle>,
    cache: ResponseCache,
    counters: Counters,
    config: ReduceConfig,
    handler: Box<dyn EventHandler>,
}

impl Llm {
    pub fn new(oracle: Box<dyn Oracle>, cache: ResponseCache) -> Self {
        Self {
            oracle,
            cache,
            counters: Counters::new(),
            config: ReduceConfig::default(),
            handler: Box::new(NoopHandler),
        }
    }

    pub fn with_config(mut self, config: ReduceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn oracle(&self) -> &dyn Oracle {
        self.oracle.as_ref()
    }

    pub fn config(&self) -> &ReduceConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// `"name:count; ..."` for counters whose label matches `pattern`.
    pub fn counter_string(&self, pattern: &str) -> String {
        self.counters.counter_string(pattern)
    }

    pub fn identity(&self) -> String {
        self.oracle.identity()
    }

    pub fn measure(&self, text: &str) -> usize {
        self.oracle.measure(text)
    }

    pub fn budget(&self) -> usize {
        self.oracle.budget()
    }

    /// The request text for `prompt` applied to `text`.
    pub fn compose(&self, prompt: &str, text: &str) -> String {
        let mut request =
            String::with_capacity(prompt.len() + self.config.separator.len() + text.len());
        request.push_str(prompt);
        request.push_str(&self.config.separator);
        request.push_str(text);
        request
    }

    /// Answer `prompt`, from the cache when possible.
    ///
    /// Counts `ask <identity>` for every request that passes the trivial-prompt
    /// guard, then `ask-hit <identity>` or `ask-miss <identity>`. Failed
    /// requests count as misses and are never cached.
    pub async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        check_prompt(prompt)?;

        let identity = self.oracle.identity();
        self.handler.on_event(&ReduceEvent::Request {
            identity: &identity,
            prompt,
        });
        self.counters.increment(&format!("ask {identity}"));

        let key = CacheKey::for_ask(&identity, prompt);
        let result = self
            .cache
            .get_or_compute(&key, || self.oracle.answer(prompt))
            .await;

        match result {
            Ok((response, outcome)) => {
                let label = match outcome {
                    CacheOutcome::Hit => "ask-hit",
                    CacheOutcome::Miss => "ask-miss",
                };
                self.counters.increment(&format!("{label} {identity}"));
                self.handler.on_event(&ReduceEvent::Response {
                    identity: &identity,
                    prompt,
                    response: &response,
                    outcome,
                });
                Ok(response)
            }
            Err(error) => {
                self.counters.increment(&format!("ask-miss {identity}"));
                self.handler.on_event(&ReduceEvent::RequestFailed {
                    identity: &identity,
                    error: &error,
                });
                Err(error)
            }
        }
    }

    /// Split `text` into coalesced chunks of at most `budget` tokens (the
    /// oracle's budget when `None`) using the configured boundary rules.
    pub fn split_text(&self, text: &str, budget: Option<usize>) -> Vec<Chunk> {
        let budget = budget.unwrap_or_else(|| self.budget());
        let measure = |t: &str| self.oracle.measure(t);
        split::plan(text, budget, self.config.rules.rules(), &measure)
    }

    /// Reduce `text` until it measures at most `target`, asking `prompt` of
    /// every chunk. Text that already fits is returned unchanged without any
    /// request.
    pub async fn reduce(
        &self,
        text: &str,
        target: usize,
        prompt: &str,
    ) -> Result<String, ReduceError> {
        Ok(self.summarize(text, target, prompt).await?.text)
    }

    /// [`reduce`](Self::reduce), keeping a report of every pass.
    ///
    /// Passes after the first use [`ReduceConfig::followup_prompt`] when set.
    pub async fn summarize(
        &self,
        text: &str,
        target: usize,
        prompt: &str,
    ) -> Result<Reduction, ReduceError> {
        let mut current = text.to_string();
        let mut passes = Vec::new();
        let mut pass: u32 = 0;

        loop {
            let tokens = self.measure(&current);
            if tokens <= target {
                self.handler.on_event(&ReduceEvent::Fits {
                    tokens,
                    target,
                    passes: pass,
                });
                return Ok(Reduction {
                    text: current,
                    passes,
                });
            }
            if pass >= self.config.max_passes {
                return Err(ReduceError::IterationLimitExceeded {
                    passes: pass,
                    tokens,
                    target,
                });
            }
            pass += 1;

            let pass_prompt = match (&self.config.followup_prompt, pass) {
                (Some(followup), p) if p > 1 => followup.as_str(),
                _ => prompt,
            };
            let chunk_budget = self.room_for(pass_prompt)?;
            let chunks = self.split_text(&current, Some(chunk_budget));
            debug!(
                "Pass {pass}: {tokens} tokens into {} chunk(s) of at most {chunk_budget}",
                chunks.len()
            );

            self.handler.on_event(&ReduceEvent::PassStart {
                pass,
                input_tokens: tokens,
                target,
                chunk_count: chunks.len(),
            });
            for chunk in chunks.iter().filter(|c| c.oversized) {
                self.handler.on_event(&ReduceEvent::OversizedChunk {
                    pass,
                    tokens: chunk.tokens,
                    budget: chunk_budget,
                });
            }

            let answers = self.answer_chunks(pass_prompt, &chunks).await?;
            let output = answers.join(&self.config.separator);
            self.handler.on_event(&ReduceEvent::PassEnd {
                pass,
                output_tokens: self.measure(&output),
            });

            passes.push(PassReport {
                pass,
                input_tokens: tokens,
                chunk_count: chunks.len(),
                output: output.clone(),
            });
            current = output;
        }
    }

    /// Answer `prompt` about `text` in one final request, reducing `text`
    /// first (with [`ReduceConfig::reduction_prompt`]) until the request fits
    /// the oracle's budget.
    pub async fn produce_result(&self, text: &str, prompt: &str) -> Result<String, ReduceError> {
        let target = self.room_for(prompt)?;
        let reduced = self
            .reduce(text, target, &self.config.reduction_prompt)
            .await?;
        Ok(self.ask(&self.compose(prompt, &reduced)).await?)
    }

    /// Tokens left for text in one request once `prompt` and the separator
    /// are accounted for. Fails with [`ReduceError::PromptTooLarge`] when
    /// nothing is left.
    pub fn room_for(&self, prompt: &str) -> Result<usize, ReduceError> {
        let budget = self.budget();
        let prompt_tokens = self.measure(prompt);
        let overhead = prompt_tokens + self.measure(&self.config.separator);
        match budget.checked_sub(overhead) {
            Some(room) if room > 0 => Ok(room),
            _ => Err(ReduceError::PromptTooLarge {
                prompt_tokens,
                budget,
            }),
        }
    }

    /// Ask `prompt` of every chunk, at most `max_concurrency` at a time.
    /// Answers come back in chunk order.
    async fn answer_chunks(
        &self,
        prompt: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<String>, OracleError> {
        stream::iter(chunks)
            .map(|chunk| {
                let request = self.compose(prompt, &chunk.text);
                async move { self.ask(&request).await }
            })
            .buffered(self.config.max_concurrency.max(1))
            .try_collect()
            .await
    }
}
