//! Commit-message generation over diffs of any size.
//!
//! A diff that fits one request alongside [`COMMIT_PROMPT`] is answered
//! directly. Larger diffs are first turned into a change list
//! ([`DIFF_SUMMARY_PROMPT`]), and that list is re-summarized (with the
//! follow-up prompt configured on the [`Llm`]) until the commit request fits.
//! The first change list is kept as supporting detail.

use crate::error::CommitError;
use crate::prompt::{COMMIT_PROMPT, DIFF_SUMMARY_PROMPT, MORE_DETAIL_HEADING};
use condense::format::wrap_lines;
use condense::llm::Llm;
use tracing::info;

/// A generated commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    /// Summary line plus description, as the model wrote them.
    pub message: String,
    /// Change list from the first reduction pass, when the diff had to be
    /// reduced.
    pub detail: Option<String>,
    /// Reduction passes needed before the final request.
    pub passes: usize,
}

impl CommitMessage {
    /// The message, followed by the change list under [`MORE_DETAIL_HEADING`]
    /// when present and requested.
    pub fn render(&self, include_detail: bool) -> String {
        match (&self.detail, include_detail) {
            (Some(detail), true) => {
                format!("{}\n\n{MORE_DETAIL_HEADING}\n\n{detail}", self.message.trim_end())
            }
            _ => self.message.clone(),
        }
    }
}

/// Write a commit message for `diff`.
pub async fn commit_message(llm: &Llm, diff: &str) -> Result<CommitMessage, CommitError> {
    let request = llm.compose(COMMIT_PROMPT, diff);
    if llm.measure(&request) <= llm.budget() {
        info!("Diff fits in a single request");
        return Ok(CommitMessage {
            message: llm.ask(&request).await?,
            detail: None,
            passes: 0,
        });
    }

    let target = llm.room_for(COMMIT_PROMPT)?;
    info!(
        "Diff is {} tokens; reducing to {target}",
        llm.measure(diff)
    );
    let reduction = llm.summarize(diff, target, DIFF_SUMMARY_PROMPT).await?;
    let message = llm
        .ask(&llm.compose(COMMIT_PROMPT, &reduction.text))
        .await?;

    Ok(CommitMessage {
        message,
        detail: reduction.first_pass().map(|p| p.output.clone()),
        passes: reduction.passes.len(),
    })
}

/// Wrap every line of `text` to `width` columns and append `(<identity>)`.
pub fn format_output(text: &str, identity: &str, width: usize) -> String {
    format!("{}\n({identity})", wrap_lines(text, width))
}
