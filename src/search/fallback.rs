//! Brute-force similarity scan used when the repository's native
//! nearest-neighbour query is unavailable.
//!
//! Best effort throughout: an undecodable or wrongly-sized embedding drops
//! that one candidate, and a failed scan yields an empty result.

use std::collections::HashSet;
use std::time::Duration;

use crate::models::{Origin, ScoredFragment, StoredEmbedding, StoredFragment};
use crate::ports::ChunkRepository;
use crate::search::vector::cosine_similarity;

/// Decode a stored embedding into the canonical vector form.
///
/// Serialized embeddings may be a JSON array (`"[0.1, 0.2]"`) or bare
/// comma/whitespace separated floats (`"0.1, 0.2"`).
pub fn decode_embedding(stored: &StoredEmbedding) -> Option<Vec<f32>> {
    match stored {
        StoredEmbedding::Native(v) => Some(v.clone()),
        StoredEmbedding::Serialized(s) => parse_serialized(s),
        StoredEmbedding::Unsupported(_) => None,
    }
}

fn parse_serialized(s: &str) -> Option<Vec<f32>> {
    let trimmed = s.trim();
    if let Ok(v) = serde_json::from_str::<Vec<f32>>(trimmed) {
        return (!v.is_empty()).then_some(v);
    }

    let inner = trimmed
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(trimmed);

    let values: Result<Vec<f32>, _> = inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::parse::<f32>)
        .collect();

    match values {
        Ok(v) if !v.is_empty() && v.iter().all(|x| x.is_finite()) => Some(v),
        _ => None,
    }
}

/// Score every candidate against the query and keep the best `top_k`.
///
/// Candidates whose embedding cannot be decoded, or whose dimension differs
/// from the query's, are skipped. A repeated id keeps its first occurrence.
/// Ties keep candidate order.
pub fn rank_by_similarity(
    query_embedding: &[f32],
    candidates: Vec<StoredFragment>,
    min_score: f32,
    top_k: usize,
) -> Vec<ScoredFragment> {
    let mut undecodable = 0usize;
    let mut mismatched = 0usize;
    let mut duplicates = 0usize;
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());

    let mut scored: Vec<ScoredFragment> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !seen.insert(candidate.id.clone()) {
            duplicates += 1;
            continue;
        }
        let Some(embedding) = decode_embedding(&candidate.embedding) else {
            tracing::warn!("Skipping fragment {}: unsupported embedding format", candidate.id);
            undecodable += 1;
            continue;
        };

        let score = match cosine_similarity(query_embedding, &embedding) {
            Ok(score) => score,
            Err(e) => {
                tracing::debug!("Skipping fragment {}: {e}", candidate.id);
                mismatched += 1;
                continue;
            }
        };

        if score < min_score {
            continue;
        }

        scored.push(ScoredFragment::new(
            candidate.into_fragment(embedding),
            score,
            Origin::Vector,
        ));
    }

    if mismatched > 0 {
        tracing::warn!("Skipped {mismatched} fragments with mismatched embedding dimension");
    }
    if undecodable > 0 {
        tracing::debug!("Skipped {undecodable} fragments with undecodable embeddings");
    }
    if duplicates > 0 {
        tracing::warn!("Skipped {duplicates} fragments with repeated ids");
    }

    // sort_by is stable: equal scores keep scan order
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

/// Full-scan search. Never fails: scan errors and timeouts yield `[]`.
pub async fn fallback_search(
    repository: &dyn ChunkRepository,
    query_embedding: &[f32],
    min_score: f32,
    top_k: usize,
    source_filter: Option<&str>,
    scan_timeout: Duration,
) -> Vec<ScoredFragment> {
    let candidates =
        match tokio::time::timeout(scan_timeout, repository.scan_all(source_filter)).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                tracing::warn!("Fallback search returning no results: {e}");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    "Fallback search returning no results: scan timed out after {}ms",
                    scan_timeout.as_millis()
                );
                return Vec::new();
            }
        };

    let total = candidates.len();
    let results = rank_by_similarity(query_embedding, candidates, min_score, top_k);
    tracing::debug!("Fallback scan scored {total} candidates, kept {}", results.len());
    results
}
