//! Naive lexical matching.
//!
//! Cheap and approximate: catches exact identifiers and rare terms that the
//! embedding model may blur. Usually a secondary signal for the hybrid
//! ranker; keyword-only queries rank by the fraction of terms matched.

use std::collections::HashSet;
use std::time::Duration;

use crate::models::{Origin, ScoredFragment, StoredFragment};
use crate::ports::ChunkRepository;
use crate::search::fallback::decode_embedding;

/// Terms shorter than this are ignored.
const MIN_TERM_LEN: usize = 3;

/// Lowercase alphanumeric terms longer than two characters, deduplicated in
/// first-seen order.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in query.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let term = raw.to_lowercase();
        if term.chars().count() >= MIN_TERM_LEN && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Fragments containing any term, in candidate order, capped at `top_k`.
///
/// The score is the fraction of query terms found in the fragment. A repeated
/// id keeps its first occurrence.
pub fn match_keywords(
    terms: &[String],
    candidates: Vec<StoredFragment>,
    top_k: usize,
) -> Vec<ScoredFragment> {
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for candidate in candidates {
        if hits.len() >= top_k {
            break;
        }
        if seen.contains(&candidate.id) {
            continue;
        }
        let haystack = candidate.text.to_lowercase();
        let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        if matched == 0 {
            continue;
        }
        seen.insert(candidate.id.clone());
        // Keyword hits do not need a usable vector.
        let embedding = decode_embedding(&candidate.embedding).unwrap_or_default();
        let score = matched as f32 / terms.len() as f32;
        hits.push(ScoredFragment::new(
            candidate.into_fragment(embedding),
            score,
            Origin::Keyword,
        ));
    }
    hits
}

/// Scan the repository for lexical matches. Scan failures yield `[]`.
pub async fn keyword_search(
    repository: &dyn ChunkRepository,
    query: &str,
    top_k: usize,
    source_filter: Option<&str>,
    scan_timeout: Duration,
) -> Vec<ScoredFragment> {
    let terms = tokenize(query);
    if terms.is_empty() {
        tracing::debug!("Keyword search skipped: no usable terms in query");
        return Vec::new();
    }

    match tokio::time::timeout(scan_timeout, repository.scan_all(source_filter)).await {
        Ok(Ok(candidates)) => match_keywords(&terms, candidates, top_k),
        Ok(Err(e)) => {
            tracing::warn!("Keyword search skipped: {e}");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("Keyword search skipped: scan timed out");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RepositoryError, RetrievalUnavailable};
    use crate::models::StoredEmbedding;
    use async_trait::async_trait;

    struct StalledRepository;

    #[async_trait]
    impl ChunkRepository for StalledRepository {
        async fn native_search(
            &self,
            _embedding: &[f32],
            _min_score: f32,
            _top_k: usize,
            _source_filter: Option<&str>,
        ) -> Result<Vec<ScoredFragment>, RetrievalUnavailable> {
            Err(RetrievalUnavailable("no index".into()))
        }

        async fn scan_all(
            &self,
            _source_filter: Option<&str>,
        ) -> Result<Vec<StoredFragment>, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![candidate("late", "refund policy")])
        }
    }

    fn candidate(id: &str, text: &str) -> StoredFragment {
        StoredFragment {
            id: id.to_string(),
            text: text.to_string(),
            source_name: "policy.pdf".to_string(),
            embedding: StoredEmbedding::Native(vec![0.0, 1.0]),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_tokenize_drops_short_terms_and_lowercases() {
        let terms = tokenize("What is the PTO-policy for an employee?");
        assert_eq!(terms, vec!["what", "the", "pto", "policy", "for", "employee"]);
    }

    #[test]
    fn test_tokenize_dedupes_and_keeps_identifiers() {
        let terms = tokenize("ERR_4021 err_4021 at");
        assert_eq!(terms, vec!["err_4021"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("a an ?! ").is_empty());
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let terms = tokenize("refund");
        let hits = match_keywords(
            &terms,
            vec![candidate("a", "The REFUND window is 30 days"), candidate("b", "Shipping")],
            5,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "a");
        assert_eq!(hits[0].origin, Origin::Keyword);
    }

    #[test]
    fn test_match_caps_at_top_k_in_scan_order() {
        let terms = tokenize("leave");
        let candidates = (0..10)
            .map(|i| candidate(&format!("c{i}"), "annual leave rules"))
            .collect();
        let hits = match_keywords(&terms, candidates, 3);
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2"]);
    }

    #[test]
    fn test_match_score_is_term_fraction() {
        let terms = tokenize("parental leave policy");
        let hits = match_keywords(&terms, vec![candidate("a", "leave policy overview")], 5);
        assert!((hits[0].score - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_match_skips_repeated_ids() {
        let terms = tokenize("refund");
        let hits = match_keywords(
            &terms,
            vec![
                candidate("a", "refund"),
                candidate("a", "refund again"),
                candidate("b", "refund desk"),
            ],
            5,
        );
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_timeout_yields_empty() {
        let hits = keyword_search(
            &StalledRepository,
            "refund policy",
            5,
            None,
            Duration::from_secs(30),
        )
        .await;
        assert!(hits.is_empty());
    }
}
