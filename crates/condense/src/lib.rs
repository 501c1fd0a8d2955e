//! Budget-aware text reduction over size-limited LLM backends.
//!
//! `condense` turns an arbitrarily long text (a source diff, a log, a
//! document) into a result that fits a size-limited text-generation backend.
//! The core abstraction is the [`Llm`](llm::Llm) context object: it splits
//! oversized input at the most meaningful boundaries it can find, greedily
//! re-packs the pieces up to the backend's token budget, summarizes each piece
//! through a persistent response cache, and repeats until the combined output
//! fits.
//!
//! # Getting started
//!
//! ```ignore
//! use condense::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENROUTER_KEY")?;
//!     let client = OpenRouterClient::new(api_key)?;
//!     let oracle = OpenRouterOracle::new(client, "openai/gpt-3.5-turbo");
//!
//!     let llm = Llm::new(Box::new(oracle), ResponseCache::open_default());
//!     let diff = std::fs::read_to_string("change.diff")?;
//!     let message = llm
//!         .produce_result(&diff, "Write a commit message for this diff:")
//!         .await?;
//!
//!     println!("{message}");
//!     println!("{}", llm.counter_string("^ask "));
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Plug in a backend:** implement the [`Oracle`](oracle::Oracle) trait
//!   (answer, measure, budget, identity). [`OpenRouterOracle`](oracle::OpenRouterOracle)
//!   is the bundled backend; wrap any oracle in
//!   [`RetryingOracle`](oracle::RetryingOracle) for a retry policy.
//! - **Split text:** [`split::split`], [`split::coalesce`] and the
//!   [`RuleSet`](split::RuleSet) presets (`text`, `markdown`, `diff`).
//! - **Reduce text:** [`Llm::reduce`](llm::Llm::reduce),
//!   [`Llm::summarize`](llm::Llm::summarize) and
//!   [`Llm::produce_result`](llm::Llm::produce_result). Tune passes,
//!   separators and concurrency with [`ReduceConfig`](config::ReduceConfig).
//! - **Observe the loop:** implement [`EventHandler`](events::EventHandler), or
//!   use [`LoggingHandler`](events::LoggingHandler) /
//!   [`TranscriptHandler`](events::TranscriptHandler).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`oracle`] | Backend trait, OpenRouter backend, retry wrapper |
//! | [`split`] | Boundary rules, lossless splitter, greedy coalescer |
//! | [`cache`] | Persistent single-flight response cache |
//! | [`counters`] | Per-run call/hit/miss tallies |
//! | [`llm`] | The summarization loop |
//! | [`events`] | Loop events and handlers |
//! | [`tokens`] | Token estimation and per-model budgets |
//! | [`config`] | `ReduceConfig` defaults and builders |
//! | [`error`] | Typed errors for requests, reduction and rules |
//! | [`format`] | Line wrapping and quoting for display |

pub mod cache;
pub mod config;
pub mod counters;
pub mod error;
pub mod events;
pub mod format;
pub mod llm;
pub mod oracle;
pub mod prelude;
pub mod split;
pub mod tokens;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use error::{OracleError, ReduceError, RuleError};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for all LLM calls.
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Clean return type from `OpenRouterClient::chat()`.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_headers(api_key, "https://github.com/condense-rs", "condense")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .user_agent("condense/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| OracleError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Send a chat completion request.
    ///
    /// Every failure comes back as [`OracleError::Transport`], with the HTTP
    /// status attached when the server answered. Classifying a failure as a
    /// rejection is the oracle adapter's job.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, OracleError> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={:?}",
            body.model,
            body.messages.len(),
            body.max_tokens,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::transport(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| OracleError::transport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(OracleError::Transport {
                message: format!("OpenRouter API HTTP {status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        parse_chat_response(&text)
    }
}

/// Decode a successful HTTP body. API-level errors inside a 200 response keep
/// their numeric `code` as the status when it is one.
fn parse_chat_response(text: &str) -> Result<ChatCompletion, OracleError> {
    let parsed: RawChatResponse = serde_json::from_str(text)
        .map_err(|e| OracleError::transport(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        let status = err
            .code
            .as_ref()
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok());
        return Err(OracleError::Transport {
            message: format!("OpenRouter API error: {}", err.message),
            status,
        });
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let choice = parsed.choices.and_then(|c| c.into_iter().next());
    Ok(match choice {
        Some(c) => ChatCompletion {
            content: c.message.content,
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        },
        None => ChatCompletion {
            content: None,
            usage: parsed.usage,
            finish_reason: None,
        },
    })
}
