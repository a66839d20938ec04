//! Collaborator seams: the embedding model, the fragment store, and the LLM.
//!
//! The engine owns these as `Arc<dyn ...>` handed in by the composition root,
//! so tests swap in stubs and the binary wires the HTTP/file implementations.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{EmbeddingError, GenerationError, RepositoryError, RetrievalUnavailable};
use crate::models::{ScoredFragment, StoredFragment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn health_check(&self) -> ComponentStatus {
        ComponentStatus::Healthy
    }
}

#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Nearest-neighbour query. Results must come back sorted by score
    /// descending, with scores `>= min_score`, at most `top_k` long.
    async fn native_search(
        &self,
        embedding: &[f32],
        min_score: f32,
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredFragment>, RetrievalUnavailable>;

    /// Every stored fragment, optionally limited to one source.
    async fn scan_all(
        &self,
        source_filter: Option<&str>,
    ) -> Result<Vec<StoredFragment>, RepositoryError>;

    async fn health_check(&self) -> ComponentStatus {
        ComponentStatus::Healthy
    }
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError>;

    async fn health_check(&self) -> ComponentStatus {
        ComponentStatus::Healthy
    }
}
