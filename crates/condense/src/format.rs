//! Display helpers for transcripts and CLI output.

/// Width used by [`quote`], matching the usual terminal-friendly default.
pub const QUOTE_WIDTH: usize = 70;

/// Wrap every line of `text` to `width` columns independently.
///
/// Line breaks in the input are kept; blank lines stay blank. Long words are
/// never broken.
pub fn wrap_lines(text: &str, width: usize) -> String {
    let options = textwrap::Options::new(width).break_words(false);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                textwrap::wrap(line, &options).join("\n")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap `text` to [`QUOTE_WIDTH`] columns and prefix every line with `prefix`.
pub fn quote(text: &str, prefix: &str) -> String {
    wrap_lines(text, QUOTE_WIDTH)
        .lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `max_chars` characters of `text` with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
