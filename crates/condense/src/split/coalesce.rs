//! Greedy re-packing of split chunks.

use super::Chunk;

/// Merge adjacent chunks while the merged text still fits `budget`.
///
/// Order is preserved and the concatenated text is unchanged. Merged sizes
/// are re-measured rather than summed, so any subadditive `measure` works.
/// Oversized chunks are passed through and never merged with a neighbour.
pub fn coalesce<M>(chunks: Vec<Chunk>, budget: usize, measure: &M) -> Vec<Chunk>
where
    M: Fn(&str) -> usize + ?Sized,
{
    let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let Some(last) = out.last_mut()
            && !last.oversized
            && !chunk.oversized
        {
            let mut merged = String::with_capacity(last.text.len() + chunk.text.len());
            merged.push_str(&last.text);
            merged.push_str(&chunk.text);
            let tokens = measure(&merged);
            if tokens <= budget {
                last.text = merged;
                last.tokens = tokens;
                continue;
            }
        }
        out.push(chunk);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, oversized: bool) -> Chunk {
        Chunk {
            text: text.to_string(),
            tokens: text.len(),
            oversized,
        }
    }

    fn len(text: &str) -> usize {
        text.len()
    }

    #[test]
    fn merges_until_budget() {
        let chunks = vec![
            chunk("aaa", false),
            chunk("bbb", false),
            chunk("ccc", false),
            chunk("dd", false),
        ];
        let merged = coalesce(chunks, 6, &len);
        let texts: Vec<&str> = merged.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aaabbb", "cccdd"]);
        assert_eq!(merged[0].tokens, 6);
        assert_eq!(merged[1].tokens, 5);
    }

    #[test]
    fn oversized_chunks_stand_alone() {
        let chunks = vec![
            chunk("a", false),
            chunk("bbbbbbbbbb", true),
            chunk("c", false),
            chunk("d", false),
        ];
        let merged = coalesce(chunks, 4, &len);
        let texts: Vec<&str> = merged.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "bbbbbbbbbb", "cd"]);
        assert!(merged[1].oversized);
    }

    #[test]
    fn empty_input() {
        assert!(coalesce(Vec::new(), 10, &len).is_empty());
    }

    #[test]
    fn nothing_merges_when_each_fills_budget() {
        let chunks = vec![chunk("xx", false), chunk("yy", false)];
        assert_eq!(coalesce(chunks, 2, &len).len(), 2);
    }
}
