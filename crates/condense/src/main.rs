//! Reduce a long text with an OpenRouter model and print the answer.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Answer a question about a long document
//! condense --prompt "List every decision recorded in these notes:" --file notes.md --rules markdown
//!
//! # Pipe a log and only shrink it to 2000 tokens
//! cat build.log | condense --prompt "Summarize these log lines:" --reduce-only --target 2000
//! ```

use clap::Parser;
use condense::cache::ResponseCache;
use condense::config::ReduceConfig;
use condense::events::{CompositeEventHandler, LoggingHandler, TranscriptHandler};
use condense::llm::Llm;
use condense::oracle::{OpenRouterOracle, RetryConfig, RetryingOracle};
use condense::split::RuleSet;
use condense::{DEFAULT_MODEL, OpenRouterClient};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Reduce a long text with an OpenRouter model and print the answer.
#[derive(Parser)]
#[command(name = "condense")]
struct Cli {
    /// Prompt applied to the (reduced) text
    #[arg(long)]
    prompt: String,

    /// Read the text from this file instead of stdin
    #[arg(long)]
    file: Option<PathBuf>,

    /// Boundary rules for splitting
    #[arg(long, default_value = "text", value_parser = ["text", "markdown", "diff"])]
    rules: String,

    /// Model to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Reduce to at most this many tokens (with --reduce-only)
    #[arg(long)]
    target: Option<usize>,

    /// Print the reduced text instead of asking the prompt of it
    #[arg(long)]
    reduce_only: bool,

    /// Retries for transient API failures
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Concurrent chunk requests per pass
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Keep responses in memory only
    #[arg(long)]
    no_cache: bool,

    /// Response cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Append quoted prompts and responses to this file
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Debug logging and call counts on stderr
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "condense=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn read_input(file: Option<&Path>) -> Result<String, String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read '{}': {e}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

async fn run(cli: &Cli) -> Result<(String, Llm), String> {
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable not set".to_string())?;
    let text = read_input(cli.file.as_deref())?;

    let client = OpenRouterClient::new(api_key).map_err(|e| e.to_string())?;
    let oracle = RetryingOracle::new(
        OpenRouterOracle::new(client, &cli.model),
        RetryConfig::with_retries(cli.retries),
    );

    let cache = match (&cli.cache_dir, cli.no_cache) {
        (_, true) => ResponseCache::in_memory(),
        (Some(dir), false) => ResponseCache::open(dir),
        (None, false) => ResponseCache::open_default(),
    };

    let transcript = match &cli.transcript {
        Some(path) => Some(
            TranscriptHandler::open(path)
                .map_err(|e| format!("failed to open transcript '{}': {e}", path.display()))?,
        ),
        None => None,
    };

    let rules = RuleSet::named(&cli.rules).unwrap_or_else(RuleSet::text);
    let config = ReduceConfig::default()
        .with_rules(rules)
        .with_max_concurrency(cli.jobs);

    let llm = Llm::new(Box::new(oracle), cache)
        .with_config(config)
        .with_event_handler(
            CompositeEventHandler::new()
                .with(LoggingHandler)
                .with_opt(transcript),
        );

    let output = if cli.reduce_only {
        let target = cli.target.unwrap_or_else(|| llm.budget());
        llm.reduce(&text, target, &cli.prompt).await
    } else {
        llm.produce_result(&text, &cli.prompt).await
    }
    .map_err(|e| e.to_string())?;

    Ok((output, llm))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok((output, llm)) => {
            println!("{output}");
            if cli.verbose {
                eprintln!("({}) {}", llm.identity(), llm.counter_string("^ask"));
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
