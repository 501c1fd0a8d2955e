//! Prompts for the commit-message flow.

/// Asks for the final commit message.
pub const COMMIT_PROMPT: &str = "Write a git commit message for the following. The message \
starts with a one-line summary of 60 characters, followed by a blank line, followed by a \
longer but concise description of the change.";

/// First reduction pass over a diff that is too large for one request.
pub const DIFF_SUMMARY_PROMPT: &str = "Make an unordered list of every change in this diff.";

/// Later passes, over change lists that are still too large.
pub const RESUMMARY_PROMPT: &str =
    "Make an unordered list that summarizes the changes described below.";

/// Heading above the first-pass change list in the output.
pub const MORE_DETAIL_HEADING: &str = "## More Detail";
