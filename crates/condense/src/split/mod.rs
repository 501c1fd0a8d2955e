//! Boundary-preserving splitting of oversized text.
//!
//! A [`BoundaryRule`] is a multi-line regular expression with exactly two
//! capture groups. Group 1 stays with the piece before the boundary, group 2
//! begins the piece after it; the split point is the start of group 2. Because
//! every byte lands in exactly one piece, concatenating the pieces always
//! reproduces the input.
//!
//! Rules are tried coarse to fine ([`RuleSet`]): structural markers first
//! (diff headers, markdown headings), then blank-line runs, then line breaks,
//! then any whitespace. [`split`] only descends to a finer rule for fragments
//! that are still over budget, and [`coalesce`] greedily re-packs the result
//! into pieces as large as the budget allows.

pub mod coalesce;

pub use coalesce::coalesce;

use crate::error::RuleError;
use regex::{Captures, Regex, RegexBuilder};

/// Blank-line runs, then newline runs, then whitespace.
const TEXT_PATTERNS: [&str; 3] = [r"(\n(?:\s*\n)+)()", r"(\n+)()", r"(\s+)()"];

/// Markdown headings, most significant first. Each heading starts a piece.
const MARKDOWN_PATTERNS: [&str; 4] = [r"()(^# )", r"()(^## )", r"()(^### )", r"()(^#### )"];

/// Per-file headers, then per-hunk headers.
const DIFF_PATTERNS: [&str; 2] = [r"()(^diff )", r"()(^@@ )"];

/// One split rule: where to cut and which side keeps the separator.
#[derive(Debug, Clone)]
pub struct BoundaryRule {
    pattern: Regex,
}

impl BoundaryRule {
    /// Compile a rule. The pattern runs in multi-line mode (`^`/`$` match at
    /// line boundaries) and must have exactly two capture groups.
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        let regex = RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        // captures_len() counts the implicit whole-match group.
        let groups = regex.captures_len() - 1;
        if groups != 2 {
            return Err(RuleError::WrongGroupCount {
                pattern: pattern.to_string(),
                groups,
            });
        }
        Ok(Self { pattern: regex })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Byte offset where the following piece begins.
    fn cut_point(caps: &Captures<'_>) -> usize {
        caps.get(2)
            .map(|m| m.start())
            .or_else(|| caps.get(1).map(|m| m.end()))
            .or_else(|| caps.get(0).map(|m| m.end()))
            .unwrap_or(0)
    }
}

/// An ordered, coarse-to-fine list of boundary rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<BoundaryRule>,
}

impl RuleSet {
    /// Compile a custom rule set, highest priority first.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, RuleError> {
        let rules = patterns
            .iter()
            .map(|p| BoundaryRule::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Paragraphs, then lines, then words.
    pub fn text() -> Self {
        Self::builtin(&TEXT_PATTERNS)
    }

    /// Headings (levels 1 to 4), then the [`text`](Self::text) rules.
    pub fn markdown() -> Self {
        let patterns: Vec<&str> = MARKDOWN_PATTERNS
            .iter()
            .chain(TEXT_PATTERNS.iter())
            .copied()
            .collect();
        Self::builtin(&patterns)
    }

    /// File headers, then hunk headers, then the [`text`](Self::text) rules.
    pub fn diff() -> Self {
        let patterns: Vec<&str> = DIFF_PATTERNS
            .iter()
            .chain(TEXT_PATTERNS.iter())
            .copied()
            .collect();
        Self::builtin(&patterns)
    }

    /// Resolve a preset by name (`text`, `markdown`, `diff`).
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::text()),
            "markdown" | "md" => Some(Self::markdown()),
            "diff" => Some(Self::diff()),
            _ => None,
        }
    }

    pub fn rules(&self) -> &[BoundaryRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    // Built-in patterns are constants covered by tests, so a failure here
    // would only drop a rule, never panic.
    fn builtin(patterns: &[&str]) -> Self {
        Self {
            rules: patterns
                .iter()
                .filter_map(|p| BoundaryRule::new(p).ok())
                .collect(),
        }
    }
}

/// A contiguous, non-empty span of the input plus its measured size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub tokens: usize,
    /// Still over budget after every rule was tried. Never merged.
    pub oversized: bool,
}

/// Partition `text` at every boundary `rule` finds.
///
/// Empty pieces are never produced, and the pieces concatenate back to `text`.
#[allow(clippy::string_slice)] // cut points are regex match boundaries
pub fn split_separator<'a>(text: &'a str, rule: &BoundaryRule) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for caps in rule.pattern.captures_iter(text) {
        let cut = BoundaryRule::cut_point(&caps);
        if cut > start && cut < text.len() {
            pieces.push(&text[start..cut]);
            start = cut;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Split `text` into chunks of at most `budget` tokens where possible.
///
/// Applies `rules[0]`; fragments still over budget are split again with
/// `rules[1..]`. A fragment that exceeds the budget after the last rule is
/// emitted as-is with `oversized` set.
pub fn split<M>(text: &str, budget: usize, rules: &[BoundaryRule], measure: &M) -> Vec<Chunk>
where
    M: Fn(&str) -> usize + ?Sized,
{
    let mut chunks = Vec::new();
    split_into(text, budget, rules, measure, &mut chunks);
    chunks
}

fn split_into<M>(
    text: &str,
    budget: usize,
    rules: &[BoundaryRule],
    measure: &M,
    out: &mut Vec<Chunk>,
) where
    M: Fn(&str) -> usize + ?Sized,
{
    if text.is_empty() {
        return;
    }

    let Some((rule, finer)) = rules.split_first() else {
        let tokens = measure(text);
        out.push(Chunk {
            text: text.to_string(),
            tokens,
            oversized: tokens > budget,
        });
        return;
    };

    for fragment in split_separator(text, rule) {
        let tokens = measure(fragment);
        if tokens > budget {
            split_into(fragment, budget, finer, measure, out);
        } else {
            out.push(Chunk {
                text: fragment.to_string(),
                tokens,
                oversized: false,
            });
        }
    }
}

/// [`split`] followed by [`coalesce`]: the chunk plan for one reduction pass.
pub fn plan<M>(text: &str, budget: usize, rules: &[BoundaryRule], measure: &M) -> Vec<Chunk>
where
    M: Fn(&str) -> usize + ?Sized,
{
    coalesce(split(text, budget, rules, measure), budget, measure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn joined(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn separator_kept_with_preceding_piece() {
        let rule = BoundaryRule::new(r"(\n(?:\s*\n)+)()").unwrap();
        let pieces = split_separator("one\n\ntwo\n  \n\nthree", &rule);
        assert_eq!(pieces, vec!["one\n\n", "two\n  \n\n", "three"]);
    }

    #[test]
    fn separator_kept_with_following_piece() {
        let rule = BoundaryRule::new(r"()(^## )").unwrap();
        let pieces = split_separator("intro\n## A\nbody\n## B\nmore", &rule);
        assert_eq!(pieces, vec!["intro\n", "## A\nbody\n", "## B\nmore"]);
    }

    #[test]
    fn no_empty_piece_for_leading_boundary() {
        let rule = BoundaryRule::new(r"()(^diff )").unwrap();
        let text = "diff --git a/x b/x\n+1\ndiff --git a/y b/y\n-2\n";
        let pieces = split_separator(text, &rule);
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.starts_with("diff ")));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn empty_text_yields_nothing() {
        let rule = BoundaryRule::new(r"(\s+)()").unwrap();
        assert!(split_separator("", &rule).is_empty());
        assert!(split("", 10, RuleSet::text().rules(), &words).is_empty());
    }

    #[test]
    fn wrong_group_count_rejected() {
        match BoundaryRule::new(r"(\n+)") {
            Err(RuleError::WrongGroupCount { groups, .. }) => assert_eq!(groups, 1),
            other => panic!("Expected WrongGroupCount, got {other:?}"),
        }
    }

    #[test]
    fn invalid_regex_rejected() {
        assert!(matches!(
            BoundaryRule::new(r"(unclosed"),
            Err(RuleError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn presets_compile_completely() {
        assert_eq!(RuleSet::text().len(), 3);
        assert_eq!(RuleSet::markdown().len(), 7);
        assert_eq!(RuleSet::diff().len(), 5);
        assert!(RuleSet::named("nope").is_none());
    }

    #[test]
    fn split_is_lossless_across_rule_sets() {
        let inputs = [
            "plain words only",
            "para one\n\npara two\n\n\npara three\n",
            "# Title\nintro\n## Part\n\nbody text here\n\n### Deep\nmore  words\t\ttabs\n",
            "diff --git a/a b/a\n@@ -1 +1 @@\n-old\n+new\n\ndiff --git a/b b/b\n@@ -2 +2 @@\n x\n",
            "\n\n\nleading and trailing\n\n\n",
        ];
        for rules in [RuleSet::text(), RuleSet::markdown(), RuleSet::diff()] {
            for input in inputs {
                for budget in [0, 1, 2, 5, 100] {
                    let chunks = split(input, budget, rules.rules(), &words);
                    assert_eq!(joined(&chunks), input, "budget={budget}");
                    assert!(chunks.iter().all(|c| !c.text.is_empty()));
                }
            }
        }
    }

    #[test]
    fn fragments_under_budget_are_not_refined() {
        let text = "a b c\n\nd e f";
        let chunks = split(text, 3, RuleSet::text().rules(), &words);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a b c\n\n");
        assert_eq!(chunks[0].tokens, 3);
    }

    #[test]
    fn falls_back_to_finer_rules() {
        let text = "a b c d\ne f\n\ng";
        let chunks = split(text, 2, RuleSet::text().rules(), &words);
        assert!(chunks.iter().all(|c| c.tokens <= 2 && !c.oversized));
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn indivisible_fragment_is_flagged_oversized() {
        let measure = |t: &str| t.len();
        let text = "short\n\naveryveryverylongword";
        let chunks = split(text, 6, RuleSet::text().rules(), &measure);
        let oversized: Vec<&Chunk> = chunks.iter().filter(|c| c.oversized).collect();
        assert_eq!(oversized.len(), 1);
        assert_eq!(oversized[0].text, "averyveryverylongword");
        assert!(chunks.iter().filter(|c| !c.oversized).all(|c| c.tokens <= 6));
    }

    #[test]
    fn empty_rule_list_yields_single_chunk() {
        let chunks = split("x y z", 1, &[], &words);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].oversized);
    }

    #[test]
    fn plan_respects_budget() {
        let text = (0..200)
            .map(|i| format!("line {i} has a few words"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = plan(&text, 50, RuleSet::text().rules(), &words);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.tokens <= 50));
        assert_eq!(joined(&chunks), text);
    }
}
