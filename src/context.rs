//! Turns ranked fragments into the source-tagged context handed to the LLM.

use crate::models::ScoredFragment;

/// Context used when retrieval found nothing. Keeps the prompt well-formed so
/// the model can answer with the insufficient-information sentinel.
pub const NO_CONTEXT_PLACEHOLDER: &str = "(No relevant context was found in the provided documents.)";

const BLOCK_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    /// Unique source names in first-seen rank order.
    pub sources: Vec<String>,
    pub fragments_used: usize,
}

impl AssembledContext {
    pub fn is_placeholder(&self) -> bool {
        self.fragments_used == 0
    }
}

/// Concatenate fragments in rank order without exceeding `max_chars`.
///
/// Stops before the first block that would overflow the budget. A first block
/// that alone is too large is cut on a char boundary instead, so a non-empty
/// ranking never produces an empty context.
pub fn assemble_context(hits: &[ScoredFragment], max_chars: usize) -> AssembledContext {
    let mut text = String::new();
    let mut used_chars = 0usize;
    let mut sources: Vec<String> = Vec::new();
    let mut fragments_used = 0usize;

    for hit in hits {
        let block = format!("[Source: {}]\n{}\n", hit.fragment.source_name, hit.fragment.text);
        let separator_chars = if fragments_used == 0 {
            0
        } else {
            BLOCK_SEPARATOR.chars().count()
        };
        let block_chars = block.chars().count();

        if used_chars + separator_chars + block_chars > max_chars {
            if fragments_used == 0 {
                let cut = truncate_chars(&block, max_chars);
                if cut.is_empty() {
                    break;
                }
                used_chars = cut.chars().count();
                text.push_str(cut);
                fragments_used = 1;
                push_unique(&mut sources, &hit.fragment.source_name);
            }
            break;
        }

        if separator_chars > 0 {
            text.push_str(BLOCK_SEPARATOR);
        }
        text.push_str(&block);
        used_chars += separator_chars + block_chars;
        fragments_used += 1;
        push_unique(&mut sources, &hit.fragment.source_name);
    }

    if fragments_used == 0 {
        return AssembledContext {
            text: NO_CONTEXT_PLACEHOLDER.to_string(),
            sources,
            fragments_used,
        };
    }

    tracing::debug!(
        "Assembled context from {fragments_used}/{} fragments ({used_chars} chars)",
        hits.len()
    );

    AssembledContext {
        text,
        sources,
        fragments_used,
    }
}

fn push_unique(sources: &mut Vec<String>, name: &str) {
    if !sources.iter().any(|s| s == name) {
        sources.push(name.to_string());
    }
}

/// First `max_chars` characters of `s`.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fragment, Origin};

    fn hit(id: &str, source: &str, text: &str) -> ScoredFragment {
        ScoredFragment::new(
            Fragment {
                id: id.to_string(),
                text: text.to_string(),
                source_name: source.to_string(),
                embedding: vec![],
                metadata: Default::default(),
            },
            0.9,
            Origin::Vector,
        )
    }

    #[test]
    fn test_empty_input_yields_placeholder() {
        let ctx = assemble_context(&[], 8000);
        assert_eq!(ctx.text, NO_CONTEXT_PLACEHOLDER);
        assert!(ctx.sources.is_empty());
        assert!(ctx.is_placeholder());
    }

    #[test]
    fn test_block_format_and_separator() {
        let hits = vec![
            hit("1", "handbook.pdf", "PTO accrues monthly."),
            hit("2", "faq.md", "Carry-over is capped."),
        ];
        let ctx = assemble_context(&hits, 8000);
        assert_eq!(
            ctx.text,
            "[Source: handbook.pdf]\nPTO accrues monthly.\n\n---\n[Source: faq.md]\nCarry-over is capped.\n"
        );
        assert_eq!(ctx.fragments_used, 2);
    }

    #[test]
    fn test_sources_deduped_in_first_seen_order() {
        let hits = vec![
            hit("1", "b.pdf", "one"),
            hit("2", "a.pdf", "two"),
            hit("3", "b.pdf", "three"),
        ];
        let ctx = assemble_context(&hits, 8000);
        assert_eq!(ctx.sources, vec!["b.pdf", "a.pdf"]);
    }

    #[test]
    fn test_stops_before_overflowing_block() {
        let hits = vec![
            hit("1", "a", &"x".repeat(50)),
            hit("2", "b", &"y".repeat(50)),
            hit("3", "c", "short"),
        ];
        let ctx = assemble_context(&hits, 100);
        assert_eq!(ctx.fragments_used, 1);
        assert_eq!(ctx.sources, vec!["a"]);
        assert!(ctx.text.chars().count() <= 100);
        assert!(!ctx.text.contains("short"));
    }

    #[test]
    fn test_oversized_first_block_truncated_on_char_boundary() {
        let hits = vec![hit("1", "jp.txt", &"日本語".repeat(100))];
        let ctx = assemble_context(&hits, 40);
        assert_eq!(ctx.text.chars().count(), 40);
        assert_eq!(ctx.fragments_used, 1);
        assert_eq!(ctx.sources, vec!["jp.txt"]);
    }

    #[test]
    fn test_never_exceeds_budget() {
        let hits: Vec<_> = (0..50)
            .map(|i| hit(&i.to_string(), "doc", &"word ".repeat(40)))
            .collect();
        let ctx = assemble_context(&hits, 8000);
        assert!(ctx.text.chars().count() <= 8000);
        assert!(ctx.fragments_used < 50);
    }
}
