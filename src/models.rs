use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type FragmentId = String;
pub type Metadata = HashMap<String, serde_json::Value>;

/// A chunk of source text with its embedding and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub text: String,
    pub source_name: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Embedding as the repository hands it over.
///
/// Stores disagree on representation: some return a numeric array, others a
/// serialized string. Anything else is kept so it can be skipped explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEmbedding {
    Native(Vec<f32>),
    Serialized(String),
    Unsupported(serde_json::Value),
}

impl From<Vec<f32>> for StoredEmbedding {
    fn from(v: Vec<f32>) -> Self {
        Self::Native(v)
    }
}

/// A fragment as returned by a raw repository scan, embedding not yet decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFragment {
    pub id: FragmentId,
    pub text: String,
    pub source_name: String,
    pub embedding: StoredEmbedding,
    #[serde(default)]
    pub metadata: Metadata,
}

impl StoredFragment {
    /// Attach a decoded vector, producing the canonical fragment.
    pub fn into_fragment(self, embedding: Vec<f32>) -> Fragment {
        Fragment {
            id: self.id,
            text: self.text,
            source_name: self.source_name,
            embedding,
            metadata: self.metadata,
        }
    }
}

/// Which signal produced a ranked result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Vector,
    Keyword,
    Hybrid,
}

/// A fragment with its score for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f32,
    pub origin: Origin,
}

impl ScoredFragment {
    pub fn new(fragment: Fragment, score: f32, origin: Origin) -> Self {
        Self {
            fragment,
            score,
            origin,
        }
    }

    pub fn id(&self) -> &str {
        &self.fragment.id
    }
}

/// Which retrieval signals a query uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Embedding similarity only
    #[default]
    Semantic,
    /// Lexical matching only, no embedding call
    Keyword,
    /// Both, merged by the hybrid ranker
    Hybrid,
}

impl SearchType {
    /// The boolean hybrid toggle: on merges keyword hits, off is vector-only.
    pub fn from_hybrid(hybrid: bool) -> Self {
        if hybrid {
            Self::Hybrid
        } else {
            Self::Semantic
        }
    }

    pub fn uses_vectors(self) -> bool {
        matches!(self, Self::Semantic | Self::Hybrid)
    }

    pub fn uses_keywords(self) -> bool {
        matches!(self, Self::Keyword | Self::Hybrid)
    }
}

/// Search request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub source_filter: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f32,
    #[serde(default)]
    pub search_type: SearchType,
}

fn default_top_k() -> usize {
    5
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_filter: None,
            top_k: default_top_k(),
            min_score: 0.0,
            search_type: SearchType::Semantic,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_filter = Some(source.into());
        self
    }

    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.search_type = SearchType::from_hybrid(hybrid);
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }
}

/// Question request. Unset options fall back to the engine's configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    #[serde(default)]
    pub source_filter: Option<String>,
    #[serde(default)]
    pub hybrid: Option<bool>,
    /// Takes precedence over `hybrid` when both are set.
    #[serde(default)]
    pub search_type: Option<SearchType>,
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// Grounded answer plus the sources cited in its context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    /// Source names in first-seen rank order, deduplicated.
    pub sources: Vec<String>,
    pub fragments_used: usize,
    pub fallback_used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_embedding_native_from_json() {
        let e: StoredEmbedding = serde_json::from_str("[0.5, 1.0]").unwrap();
        assert_eq!(e, StoredEmbedding::Native(vec![0.5, 1.0]));
    }

    #[test]
    fn test_stored_embedding_serialized_from_json() {
        let e: StoredEmbedding = serde_json::from_str(r#""[0.5, 1.0]""#).unwrap();
        assert_eq!(e, StoredEmbedding::Serialized("[0.5, 1.0]".into()));
    }

    #[test]
    fn test_stored_embedding_unsupported_from_json() {
        let e: StoredEmbedding = serde_json::from_str(r#"{"values": [1]}"#).unwrap();
        assert!(matches!(e, StoredEmbedding::Unsupported(_)));
    }

    #[test]
    fn test_origin_serializes_to_snake_case() {
        let json = serde_json::to_value(Origin::Hybrid).unwrap();
        assert_eq!(json, "hybrid");
    }

    #[test]
    fn test_query_defaults_from_json() {
        let q: Query = serde_json::from_str(r#"{"text": "refund policy"}"#).unwrap();
        assert_eq!(q.top_k, 5);
        assert_eq!(q.min_score, 0.0);
        assert_eq!(q.search_type, SearchType::Semantic);
        assert!(q.source_filter.is_none());
    }

    #[test]
    fn test_search_type_from_json() {
        let q: Query =
            serde_json::from_str(r#"{"text": "refund", "search_type": "keyword"}"#).unwrap();
        assert_eq!(q.search_type, SearchType::Keyword);
        assert!(!q.search_type.uses_vectors());
        assert!(q.search_type.uses_keywords());
    }

    #[test]
    fn test_hybrid_toggle_maps_to_search_type() {
        assert_eq!(Query::new("q").with_hybrid(true).search_type, SearchType::Hybrid);
        assert_eq!(Query::new("q").with_hybrid(false).search_type, SearchType::Semantic);
    }
}
