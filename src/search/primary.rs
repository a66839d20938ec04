use std::collections::HashSet;
use std::time::Duration;

use crate::error::RetrievalUnavailable;
use crate::models::ScoredFragment;
use crate::ports::ChunkRepository;
use crate::search::fallback::fallback_search;

/// Vector hits plus whether the brute-force scan produced them.
#[derive(Debug, Clone, Default)]
pub struct VectorHits {
    pub hits: Vec<ScoredFragment>,
    pub fallback_used: bool,
}

/// Parameters shared by the native and fallback paths.
#[derive(Debug, Clone, Copy)]
pub struct VectorSearchParams<'a> {
    pub min_score: f32,
    pub top_k: usize,
    pub source_filter: Option<&'a str>,
    pub search_timeout: Duration,
    pub scan_timeout: Duration,
}

/// Native nearest-neighbour query, falling back to a full scan when the
/// repository cannot serve it in time.
pub async fn vector_search(
    repository: &dyn ChunkRepository,
    query_embedding: &[f32],
    params: VectorSearchParams<'_>,
) -> VectorHits {
    let native = tokio::time::timeout(
        params.search_timeout,
        repository.native_search(
            query_embedding,
            params.min_score,
            params.top_k,
            params.source_filter,
        ),
    )
    .await
    .unwrap_or_else(|_| {
        Err(RetrievalUnavailable(format!(
            "native search timed out after {}ms",
            params.search_timeout.as_millis()
        )))
    });

    match native {
        Ok(hits) => VectorHits {
            hits: enforce_contract(hits, params.min_score, params.top_k),
            fallback_used: false,
        },
        Err(e) => {
            tracing::warn!("{e}; falling back to full scan");
            let hits = fallback_search(
                repository,
                query_embedding,
                params.min_score,
                params.top_k,
                params.source_filter,
                params.scan_timeout,
            )
            .await;
            VectorHits {
                hits,
                fallback_used: true,
            }
        }
    }
}

/// Re-apply the native search contract: scores `>= min_score`, unique ids,
/// score-descending, at most `top_k`.
pub fn enforce_contract(
    hits: Vec<ScoredFragment>,
    min_score: f32,
    top_k: usize,
) -> Vec<ScoredFragment> {
    let received = hits.len();
    let mut seen = HashSet::new();
    let mut kept: Vec<ScoredFragment> = hits
        .into_iter()
        .filter(|h| h.score >= min_score)
        .filter(|h| seen.insert(h.id().to_string()))
        .collect();

    kept.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    kept.truncate(top_k);

    if kept.len() < received.min(top_k) {
        tracing::debug!(
            "Native search returned {received} hits, {} survived contract check",
            kept.len()
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryError;
    use crate::models::{Fragment, Origin, StoredEmbedding, StoredFragment};
    use async_trait::async_trait;

    fn scored(id: &str, score: f32) -> ScoredFragment {
        ScoredFragment::new(
            Fragment {
                id: id.to_string(),
                text: format!("text {id}"),
                source_name: "doc".to_string(),
                embedding: vec![1.0, 0.0],
                metadata: Default::default(),
            },
            score,
            Origin::Vector,
        )
    }

    enum Native {
        Returns(Vec<ScoredFragment>),
        Fails,
        Hangs,
    }

    struct Repo {
        native: Native,
        stored: Vec<StoredFragment>,
    }

    #[async_trait]
    impl ChunkRepository for Repo {
        async fn native_search(
            &self,
            _embedding: &[f32],
            _min_score: f32,
            _top_k: usize,
            _source_filter: Option<&str>,
        ) -> Result<Vec<ScoredFragment>, RetrievalUnavailable> {
            match &self.native {
                Native::Returns(hits) => Ok(hits.clone()),
                Native::Fails => Err(RetrievalUnavailable("index offline".into())),
                Native::Hangs => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn scan_all(
            &self,
            _source_filter: Option<&str>,
        ) -> Result<Vec<StoredFragment>, RepositoryError> {
            Ok(self.stored.clone())
        }
    }

    fn params() -> VectorSearchParams<'static> {
        VectorSearchParams {
            min_score: 0.5,
            top_k: 3,
            source_filter: None,
            search_timeout: Duration::from_secs(5),
            scan_timeout: Duration::from_secs(30),
        }
    }

    fn stored(id: &str, v: Vec<f32>) -> StoredFragment {
        StoredFragment {
            id: id.to_string(),
            text: format!("text {id}"),
            source_name: "doc".to_string(),
            embedding: StoredEmbedding::Native(v),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_enforce_contract_drops_low_scores_and_duplicates() {
        let hits = vec![
            scored("a", 0.9),
            scored("b", 0.2),
            scored("a", 0.8),
            scored("c", 0.95),
            scored("d", 0.6),
            scored("e", 0.55),
        ];
        let kept = enforce_contract(hits, 0.5, 3);
        let ids: Vec<&str> = kept.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["c", "a", "d"]);
    }

    #[tokio::test]
    async fn test_native_results_used_when_available() {
        let repo = Repo {
            native: Native::Returns(vec![scored("n1", 0.9)]),
            stored: vec![stored("s1", vec![1.0, 0.0])],
        };
        let result = vector_search(&repo, &[1.0, 0.0], params()).await;
        assert!(!result.fallback_used);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].id(), "n1");
    }

    #[tokio::test]
    async fn test_native_failure_falls_back_to_scan() {
        let repo = Repo {
            native: Native::Fails,
            stored: vec![stored("s1", vec![1.0, 0.0]), stored("s2", vec![0.0, 1.0])],
        };
        let result = vector_search(&repo, &[1.0, 0.0], params()).await;
        assert!(result.fallback_used);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].id(), "s1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_timeout_falls_back_to_scan() {
        let repo = Repo {
            native: Native::Hangs,
            stored: vec![stored("s1", vec![1.0, 0.0])],
        };
        let result = vector_search(&repo, &[1.0, 0.0], params()).await;
        assert!(result.fallback_used);
        assert_eq!(result.hits[0].id(), "s1");
    }
}
