//! Observer hooks for the summarization loop.
//!
//! [`Llm`](crate::llm::Llm) emits a [`ReduceEvent`] at each step of a
//! reduction: pass boundaries, every request and its answer, failures, and
//! chunks that could not be split under budget. Handlers only observe; they
//! cannot change the course of a reduction.
//!
//! | Handler | Purpose |
//! |---------|---------|
//! | [`NoopHandler`] | Default; ignores everything |
//! | [`LoggingHandler`] | `tracing` output at info/debug level |
//! | [`TranscriptHandler`] | Appends quoted prompts and answers to a file |
//! | [`EventObserver`] | Wraps a closure |
//! | [`CompositeEventHandler`] | Fans out to several handlers in order |

use crate::cache::CacheOutcome;
use crate::error::OracleError;
use crate::format::{preview, quote};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Events emitted while reducing text.
#[derive(Debug)]
pub enum ReduceEvent<'a> {
    /// A reduction pass is about to issue its chunk requests.
    PassStart {
        pass: u32,
        input_tokens: usize,
        target: usize,
        chunk_count: usize,
    },
    /// A pass finished; `output_tokens` is the size of the recombined text.
    PassEnd { pass: u32, output_tokens: usize },
    /// The text fits the target; no further passes are needed.
    Fits {
        tokens: usize,
        target: usize,
        passes: u32,
    },
    /// A chunk stayed over budget after every boundary rule.
    OversizedChunk {
        pass: u32,
        tokens: usize,
        budget: usize,
    },
    /// A prompt is about to be answered (from cache or backend).
    Request { identity: &'a str, prompt: &'a str },
    /// A prompt was answered.
    Response {
        identity: &'a str,
        prompt: &'a str,
        response: &'a str,
        outcome: CacheOutcome,
    },
    /// A request failed.
    RequestFailed {
        identity: &'a str,
        error: &'a OracleError,
    },
}

/// Callback interface for [`ReduceEvent`]s.
///
/// # Example
///
/// ```ignore
/// struct PassCounter(AtomicU32);
///
/// impl EventHandler for PassCounter {
///     fn on_event(&self, event: &ReduceEvent<'_>) {
///         if let ReduceEvent::PassEnd { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ReduceEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Adapts a closure into an [`EventHandler`].
///
/// ```ignore
/// let handler = EventObserver::new(|event| {
///     if let ReduceEvent::PassEnd { pass, .. } = event { eprintln!("pass {pass} done"); }
/// });
/// ```
pub struct EventObserver<F>(F)
where
    F: Fn(&ReduceEvent<'_>) + Send + Sync;

impl<F> EventObserver<F>
where
    F: Fn(&ReduceEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for EventObserver<F>
where
    F: Fn(&ReduceEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &ReduceEvent<'_>) {
        (self.0)(event);
    }
}

/// Dispatches each event to several handlers in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_opt(transcript);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only if present.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &ReduceEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &ReduceEvent<'_>) {
        match event {
            ReduceEvent::PassStart {
                pass,
                input_tokens,
                target,
                chunk_count,
            } => {
                info!("[pass {pass}] {input_tokens} tokens over target {target}; {chunk_count} chunk(s)");
            }
            ReduceEvent::PassEnd {
                pass,
                output_tokens,
            } => {
                info!("[pass {pass}] reduced to {output_tokens} tokens");
            }
            ReduceEvent::Fits {
                tokens,
                target,
                passes,
            } => {
                debug!("Fits: {tokens}/{target} tokens after {passes} pass(es)");
            }
            ReduceEvent::OversizedChunk {
                pass,
                tokens,
                budget,
            } => {
                warn!("[pass {pass}] chunk of {tokens} tokens cannot be split under {budget}");
            }
            ReduceEvent::Request { identity, prompt } => {
                debug!("Ask {identity}: {:?}", preview(prompt, 60));
            }
            ReduceEvent::Response {
                response, outcome, ..
            } => {
                let cached = if *outcome == CacheOutcome::Hit {
                    " (cached)"
                } else {
                    ""
                };
                debug!("Response{cached}: {:?}", preview(response, 60));
            }
            ReduceEvent::RequestFailed { identity, error } => {
                warn!("Ask {identity} failed: {error}");
            }
        }
    }
}

/// Appends every request and answer to a plain-text transcript, each body
/// quoted with `"> "`.
pub struct TranscriptHandler {
    file: Mutex<File>,
}

impl TranscriptHandler {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn append(&self, text: &str) {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let result = if text.ends_with('\n') {
            file.write_all(text.as_bytes())
        } else {
            writeln!(file, "{text}")
        };
        if let Err(e) = result {
            warn!("Transcript write failed: {e}");
        }
    }
}

impl EventHandler for TranscriptHandler {
    fn on_event(&self, event: &ReduceEvent<'_>) {
        match event {
            ReduceEvent::Request { identity, prompt } => {
                self.append(&format!("\nAsk {identity}:\n{}", quote(prompt, "> ")));
            }
            ReduceEvent::Response {
                response, outcome, ..
            } => {
                let cached = if *outcome == CacheOutcome::Hit {
                    " (cached)"
                } else {
                    ""
                };
                self.append(&format!("\nResponse{cached}:\n{}", quote(response, "> ")));
            }
            ReduceEvent::RequestFailed { error, .. } => {
                self.append(&format!("\nFailed: {error}"));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn observer_receives_events() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = Arc::clone(&seen);
        let handler = EventObserver::new(move |event| {
            if let ReduceEvent::PassEnd { .. } = event {
                seen2.fetch_add(1, Ordering::SeqCst);
            }
        });
        handler.on_event(&ReduceEvent::PassEnd {
            pass: 1,
            output_tokens: 10,
        });
        handler.on_event(&ReduceEvent::Request {
            identity: "T",
            prompt: "p",
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn composite_dispatches_to_all() {
        let count = Arc::new(AtomicU32::new(0));
        let a = Arc::clone(&count);
        let b = Arc::clone(&count);
        let handler = CompositeEventHandler::new()
            .with(EventObserver::new(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            }))
            .with(NoopHandler)
            .with_opt(Some(EventObserver::new(move |_| {
                b.fetch_add(1, Ordering::SeqCst);
            })))
            .with_opt(None::<NoopHandler>);
        assert_eq!(handler.len(), 3);

        handler.on_event(&ReduceEvent::PassEnd {
            pass: 1,
            output_tokens: 1,
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transcript_quotes_prompts_and_responses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("transcript.txt");
        let handler = TranscriptHandler::open(&path).unwrap();

        handler.on_event(&ReduceEvent::Request {
            identity: "OpenRouter(m)",
            prompt: "Summarize:\n\nline one",
        });
        handler.on_event(&ReduceEvent::Response {
            identity: "OpenRouter(m)",
            prompt: "Summarize:\n\nline one",
            response: "- one",
            outcome: CacheOutcome::Hit,
        });
        handler.on_event(&ReduceEvent::PassEnd {
            pass: 1,
            output_tokens: 2,
        });

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "\nAsk OpenRouter(m):\n> Summarize:\n> \n> line one\n\nResponse (cached):\n> - one\n"
        );
    }

    #[test]
    fn transcript_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        for _ in 0..2 {
            TranscriptHandler::open(&path)
                .unwrap()
                .on_event(&ReduceEvent::Request {
                    identity: "T",
                    prompt: "hello",
                });
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("Ask T:").count(), 2);
    }
}
