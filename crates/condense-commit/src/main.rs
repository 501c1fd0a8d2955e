//! Write a git commit message for a diff.
//!
//! Reads the diff from stdin, or the staged changes with `--git`. Reads the
//! API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Staged changes in the current repository
//! condense-commit --git
//!
//! # A patch file, GPT-4, with call counts
//! condense-commit -4 --verbose < feature.patch
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use condense::DEFAULT_MODEL;
use condense_commit::config::GPT4_MODEL;
use condense_commit::git::{ensure_nonempty, read_stdin, staged_diff};
use condense_commit::{CommitConfig, CommitError, commit_message, format_output};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Write a git commit message for a diff.
#[derive(Parser)]
#[command(name = "condense-commit")]
struct Cli {
    /// Use staged git changes instead of stdin.
    #[arg(long, short)]
    git: bool,

    /// Repository for --git.
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Model to use for completions.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Use GPT-4 (slower, costs more).
    #[arg(long = "gpt4", short = '4')]
    gpt4: bool,

    /// Leave out the change list of large diffs.
    #[arg(long)]
    no_detail: bool,

    /// Retries for transient API failures.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Concurrent chunk requests per pass.
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Keep responses in memory only.
    #[arg(long)]
    no_cache: bool,

    /// Response cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Append quoted prompts and responses to this file.
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Debug logging and call counts.
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> CommitConfig {
        CommitConfig {
            model: if self.gpt4 {
                GPT4_MODEL.to_string()
            } else {
                self.model.clone()
            },
            workdir: self.workdir.clone(),
            use_git: self.git,
            include_detail: !self.no_detail,
            retries: self.retries,
            jobs: self.jobs,
            no_cache: self.no_cache,
            cache_dir: self.cache_dir.clone(),
            transcript: self.transcript.clone(),
            ..Default::default()
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "condense=debug,condense_commit=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(config: &CommitConfig, verbose: bool) -> Result<String, CommitError> {
    let diff = if config.use_git {
        staged_diff(&config.workdir).await?
    } else {
        read_stdin()?
    };
    let diff = ensure_nonempty(diff)?;

    let api_key = std::env::var("OPENROUTER_KEY").map_err(|_| CommitError::MissingApiKey)?;
    let llm = config.build_llm(config.build_oracle(&api_key)?)?;

    let message = commit_message(&llm, &diff).await?;
    let mut output = format_output(
        &message.render(config.include_detail),
        &llm.identity(),
        config.wrap_width,
    );
    if verbose {
        output.push('\n');
        output.push_str(&llm.counter_string("^ask"));
    }
    Ok(output)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli.config(), cli.verbose).await {
        Ok(output) => println!("{output}"),
        Err(CommitError::EmptyDiff) => {
            println!("{}", CommitError::EmptyDiff);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
