use std::collections::HashMap;

use crate::config::HybridWeights;
use crate::models::{Origin, ScoredFragment};

/// Rank-decay merge of a vector ranking and a keyword ranking.
///
/// Pipeline:
/// 1. Vector result at rank `i` scores `vector_base - i * vector_step`.
/// 2. A keyword result already present from the vector list gets
///    `consensus_boost` added and becomes `Origin::Hybrid`.
/// 3. A keyword-only result at rank `j` scores `keyword_base - j * keyword_step`.
/// 4. Stable sort descending, keep `limit`.
///
/// Only ranks matter; raw cosine and keyword scores are not comparable.
pub fn merge_rankings(
    vector_hits: Vec<ScoredFragment>,
    keyword_hits: Vec<ScoredFragment>,
    weights: &HybridWeights,
    limit: usize,
) -> Vec<ScoredFragment> {
    // Insertion order doubles as the tie-break order.
    let mut merged: Vec<ScoredFragment> = Vec::with_capacity(vector_hits.len() + keyword_hits.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for (rank, hit) in vector_hits.into_iter().enumerate() {
        if position.contains_key(hit.id()) {
            continue;
        }
        let score = weights.vector_base - rank as f32 * weights.vector_step;
        position.insert(hit.id().to_string(), merged.len());
        merged.push(ScoredFragment::new(hit.fragment, score, Origin::Vector));
    }

    for (rank, hit) in keyword_hits.into_iter().enumerate() {
        match position.get(hit.id()) {
            Some(&idx) => {
                let entry = &mut merged[idx];
                // A repeated keyword id must not boost twice.
                if entry.origin == Origin::Vector {
                    entry.score += weights.consensus_boost;
                    entry.origin = Origin::Hybrid;
                }
            }
            None => {
                let score = weights.keyword_base - rank as f32 * weights.keyword_step;
                position.insert(hit.id().to_string(), merged.len());
                merged.push(ScoredFragment::new(hit.fragment, score, Origin::Keyword));
            }
        }
    }

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(limit);
    merged
}
