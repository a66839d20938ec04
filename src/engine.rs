use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, MAX_TEMPERATURE};
use crate::context::assemble_context;
use crate::error::{EmbeddingError, EngineError, GenerationError, ValidationError, Violation};
use crate::llm::completion::HttpAnswerGenerator;
use crate::llm::embeddings::HttpEmbeddingClient;
use crate::llm::prompt::{sanitize_question, PromptBuilder};
use crate::models::{AnswerRequest, AnswerResult, Query, ScoredFragment, SearchType};
use crate::ports::{AnswerGenerator, ChunkRepository, ComponentStatus, EmbeddingClient};
use crate::search::hybrid::merge_rankings;
use crate::search::keyword::keyword_search;
use crate::search::primary::{vector_search, VectorHits, VectorSearchParams};

/// Answer returned when the generator produced only whitespace.
pub const NO_RESPONSE_SENTINEL: &str = "No response was generated.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub embedder: ComponentStatus,
    pub repository: ComponentStatus,
    pub generator: ComponentStatus,
}

impl HealthReport {
    fn from_components(
        embedder: ComponentStatus,
        repository: ComponentStatus,
        generator: ComponentStatus,
    ) -> Self {
        let unhealthy = |s: &ComponentStatus| matches!(s, ComponentStatus::Unhealthy(_));
        let status = if unhealthy(&repository) || unhealthy(&generator) {
            HealthStatus::Unhealthy
        } else if [&embedder, &repository, &generator]
            .iter()
            .all(|s| **s == ComponentStatus::Healthy)
        {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            embedder,
            repository,
            generator,
        }
    }
}

/// Ranked fragments for one query, and how they were obtained.
struct Retrieval {
    hits: Vec<ScoredFragment>,
    fallback_used: bool,
}

/// Retrieval and grounded-answer pipeline.
///
/// Stateless between calls; share it behind an `Arc`.
pub struct RagEngine {
    embedder: Arc<dyn EmbeddingClient>,
    repository: Arc<dyn ChunkRepository>,
    generator: Arc<dyn AnswerGenerator>,
    prompts: PromptBuilder,
    config: Config,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        repository: Arc<dyn ChunkRepository>,
        generator: Arc<dyn AnswerGenerator>,
        config: Config,
    ) -> Self {
        Self {
            embedder,
            repository,
            generator,
            prompts: PromptBuilder::new(config.prompt.clone()),
            config,
        }
    }

    /// Wire the HTTP embedding and completion clients from `config.llm`.
    pub fn from_config(config: Config, repository: Arc<dyn ChunkRepository>) -> anyhow::Result<Self> {
        let http_client = crate::llm::build_http_client()?;
        let embedder = HttpEmbeddingClient::new(http_client.clone(), config.llm.clone());
        let generator = HttpAnswerGenerator::new(http_client, config.llm.clone());
        Ok(Self::new(
            Arc::new(embedder),
            repository,
            Arc::new(generator),
            config,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rank fragments for a query.
    pub async fn search(&self, query: &Query) -> Result<Vec<ScoredFragment>, EngineError> {
        self.validate_query(query)?;
        Ok(self.retrieve(query).await.hits)
    }

    /// Retrieve context for a question and generate an answer grounded in it.
    pub async fn answer(&self, request: AnswerRequest) -> Result<AnswerResult, EngineError> {
        let started = Instant::now();

        let question = sanitize_question(&request.question);

        // Reject before spending an embedding call.
        let mut violations = self.prompts.question_violations(&question);
        let min_score = request
            .min_score
            .unwrap_or(self.config.retrieval.default_min_score);
        if !(0.0..=1.0).contains(&min_score) {
            violations.push(Violation::MinScoreOutOfRange(min_score));
        }
        ValidationError::check(violations)?;

        let search_type = request
            .search_type
            .or(request.hybrid.map(SearchType::from_hybrid))
            .unwrap_or(SearchType::from_hybrid(
                self.config.retrieval.hybrid_by_default,
            ));
        let query = Query {
            text: question,
            source_filter: request.source_filter,
            top_k: self.config.retrieval.default_top_k,
            min_score,
            search_type,
        };
        let retrieval = self.retrieve(&query).await;

        let context = assemble_context(&retrieval.hits, self.config.prompt.max_context_chars);
        if context.is_placeholder() {
            tracing::info!("No context retrieved for question; answering from placeholder");
        }
        let prompt = self.prompts.build(&query.text, &context.text)?;

        let answer = self.generate(&prompt).await?;

        tracing::info!(
            "Answered question: {} fragments, {} sources, fallback={}, {}ms",
            context.fragments_used,
            context.sources.len(),
            retrieval.fallback_used,
            started.elapsed().as_millis()
        );

        Ok(AnswerResult {
            answer,
            sources: context.sources,
            fragments_used: context.fragments_used,
            fallback_used: retrieval.fallback_used,
        })
    }

    /// Health-check every collaborator concurrently.
    pub async fn health(&self) -> HealthReport {
        let (embedder, repository, generator) = tokio::join!(
            self.embedder.health_check(),
            self.repository.health_check(),
            self.generator.health_check(),
        );
        HealthReport::from_components(embedder, repository, generator)
    }

    fn validate_query(&self, query: &Query) -> Result<(), ValidationError> {
        let retrieval = &self.config.retrieval;
        let mut violations = Vec::new();

        if query.text.trim().is_empty() {
            violations.push(Violation::QuestionRequired);
        }
        let len = query.text.chars().count();
        if len > retrieval.max_query_chars {
            violations.push(Violation::QuestionTooLong {
                len,
                max: retrieval.max_query_chars,
            });
        }
        if query.top_k == 0 || query.top_k > retrieval.max_top_k {
            violations.push(Violation::TopKOutOfRange {
                top_k: query.top_k,
                max: retrieval.max_top_k,
            });
        }
        if !(0.0..=1.0).contains(&query.min_score) {
            violations.push(Violation::MinScoreOutOfRange(query.min_score));
        }

        ValidationError::check(violations)
    }

    async fn retrieve(&self, query: &Query) -> Retrieval {
        let started = Instant::now();
        let timeouts = &self.config.timeouts;
        let source_filter = query.source_filter.as_deref();

        let embedding = if query.search_type.uses_vectors() {
            self.embed_query(&query.text).await
        } else {
            None
        };
        let vector = match embedding {
            Some(embedding) => {
                let params = VectorSearchParams {
                    min_score: query.min_score,
                    top_k: query.top_k,
                    source_filter,
                    search_timeout: timeouts.search(),
                    scan_timeout: timeouts.scan(),
                };
                vector_search(self.repository.as_ref(), &embedding, params).await
            }
            None => VectorHits::default(),
        };
        let vector_count = vector.hits.len();

        let keyword_hits = if query.search_type.uses_keywords() {
            keyword_search(
                self.repository.as_ref(),
                &query.text,
                query.top_k,
                source_filter,
                timeouts.scan(),
            )
            .await
        } else {
            Vec::new()
        };

        let hits = match query.search_type {
            SearchType::Semantic => vector.hits,
            SearchType::Keyword => {
                let mut hits = keyword_hits;
                // Stable, so equal term coverage keeps scan order.
                hits.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                hits.retain(|h| h.score >= query.min_score);
                hits
            }
            SearchType::Hybrid => {
                tracing::debug!(
                    "Hybrid merge: {vector_count} vector hits, {} keyword hits",
                    keyword_hits.len()
                );
                let mut merged = merge_rankings(
                    vector.hits,
                    keyword_hits,
                    &self.config.retrieval.hybrid,
                    query.top_k,
                );
                merged.retain(|h| h.score >= query.min_score);
                merged
            }
        };

        tracing::info!(
            "Search returned {} results (search_type={:?}, fallback={}) in {}ms",
            hits.len(),
            query.search_type,
            vector.fallback_used,
            started.elapsed().as_millis()
        );

        Retrieval {
            hits,
            fallback_used: vector.fallback_used,
        }
    }

    /// `None` leaves the vector signal empty; keyword search may still run.
    async fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        let limit = self.config.timeouts.embed();
        match tokio::time::timeout(limit, self.embedder.embed(text)).await {
            Ok(Ok(embedding)) => Some(embedding),
            Ok(Err(e)) => {
                tracing::warn!("Query embedding failed, vector search skipped: {e}");
                None
            }
            Err(_) => {
                let e = EmbeddingError::Timeout(Some(limit));
                tracing::warn!("{e}, vector search skipped");
                None
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let prompt_config = &self.config.prompt;
        let temperature = prompt_config.temperature.clamp(0.0, MAX_TEMPERATURE);
        let limit = self.config.timeouts.generation();

        let output = tokio::time::timeout(
            limit,
            self.generator
                .complete(prompt, prompt_config.max_tokens, temperature),
        )
        .await
        .map_err(|_| GenerationError::Timeout(Some(limit)))??;

        if output.trim().is_empty() {
            tracing::warn!("Generator returned empty output");
            return Ok(NO_RESPONSE_SENTINEL.to_string());
        }
        Ok(output.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_all_healthy() {
        let report = HealthReport::from_components(
            ComponentStatus::Healthy,
            ComponentStatus::Healthy,
            ComponentStatus::Healthy,
        );
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_health_embedder_down_is_degraded() {
        let report = HealthReport::from_components(
            ComponentStatus::Unhealthy("offline".into()),
            ComponentStatus::Healthy,
            ComponentStatus::Healthy,
        );
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_health_empty_store_is_degraded() {
        let report = HealthReport::from_components(
            ComponentStatus::Healthy,
            ComponentStatus::Degraded("empty".into()),
            ComponentStatus::Healthy,
        );
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_health_generator_down_is_unhealthy() {
        let report = HealthReport::from_components(
            ComponentStatus::Healthy,
            ComponentStatus::Healthy,
            ComponentStatus::Unhealthy("401".into()),
        );
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_report_serializes() {
        let report = HealthReport::from_components(
            ComponentStatus::Healthy,
            ComponentStatus::Degraded("empty".into()),
            ComponentStatus::Healthy,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["repository"]["degraded"], "empty");
    }
}
