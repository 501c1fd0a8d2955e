//! Convenience re-exports for common `condense` types.
//!
//! ```ignore
//! use condense::prelude::*;
//! ```
//!
//! Covers building an [`Llm`] over the bundled backend and observing it.
//! Splitting primitives ([`split`](crate::split::split),
//! [`coalesce`](crate::split::coalesce)) and token helpers live in their
//! modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{DEFAULT_MODEL, OpenRouterClient, OracleError, ReduceError, RuleError};

// ── Backends ────────────────────────────────────────────────────────
pub use crate::oracle::{OpenRouterOracle, Oracle, OracleFuture, RetryConfig, RetryingOracle};

// ── Reduction ───────────────────────────────────────────────────────
pub use crate::cache::{CacheOutcome, ResponseCache};
pub use crate::config::ReduceConfig;
pub use crate::llm::{Llm, PassReport, Reduction};
pub use crate::split::{Chunk, RuleSet};

// ── Events ──────────────────────────────────────────────────────────
pub use crate::events::{
    CompositeEventHandler, EventHandler, EventObserver, LoggingHandler, NoopHandler, ReduceEvent,
    TranscriptHandler,
};
