use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SENTINEL: &str =
    "I don't have enough information in the provided documents to answer this question.";

/// Upper bound for generation temperature; answers should stay near-deterministic.
pub const MAX_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the file-backed fragment store lives
    pub data_dir: PathBuf,
    /// Embedding / completion provider configuration
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer generation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
}

/// Rank-decay constants used when merging vector and keyword rankings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    /// Score of the top vector result
    pub vector_base: f32,
    /// Decrement per vector rank
    pub vector_step: f32,
    /// Added when a keyword hit is already in the vector list
    pub consensus_boost: f32,
    /// Score of the top keyword-only result
    pub keyword_base: f32,
    /// Decrement per keyword rank
    pub keyword_step: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            vector_base: 1.0,
            vector_step: 0.1,
            consensus_boost: 0.3,
            keyword_base: 0.5,
            keyword_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not say
    pub default_top_k: usize,
    /// Largest top_k a caller may request
    pub max_top_k: usize,
    /// Minimum score used by `answer` when the caller does not say
    pub default_min_score: f32,
    /// Maximum query length in characters
    pub max_query_chars: usize,
    /// Whether `answer` merges keyword hits by default
    pub hybrid_by_default: bool,
    pub hybrid: HybridWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 50,
            default_min_score: 0.0,
            max_query_chars: 1000,
            hybrid_by_default: false,
            hybrid: HybridWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub max_question_chars: usize,
    /// Context size budget, also enforced by the assembler
    pub max_context_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Exact reply expected when the context cannot answer the question
    pub insufficient_info_sentinel: String,
    /// Replaces every instruction except "use only the context"
    pub custom_instructions: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_question_chars: 1000,
            max_context_chars: 8000,
            max_tokens: 1000,
            temperature: 0.1,
            insufficient_info_sentinel: DEFAULT_SENTINEL.to_string(),
            custom_instructions: None,
        }
    }
}

/// Per-call bounds for every external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub embed_secs: u64,
    pub search_secs: u64,
    pub scan_secs: u64,
    pub generation_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embed_secs: 10,
            search_secs: 5,
            scan_secs: 30,
            generation_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn embed(&self) -> Duration {
        Duration::from_secs(self.embed_secs)
    }

    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn scan(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(v) = val.parse() {
            *slot = v;
        }
    }
}

/// Like `env_parse`, but NaN and infinities leave the slot untouched.
fn env_parse_finite(key: &str, slot: &mut f32) {
    let mut value = *slot;
    env_parse(key, &mut value);
    if value.is_finite() {
        *slot = value;
    } else {
        tracing::warn!("Ignoring non-finite {key}={value}");
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        // LLM provider
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }

        // Retrieval
        let r = &mut config.retrieval;
        env_parse("RAG_TOP_K", &mut r.default_top_k);
        env_parse("RAG_MAX_TOP_K", &mut r.max_top_k);
        env_parse_finite("RAG_MIN_SCORE", &mut r.default_min_score);
        env_parse("RAG_MAX_QUERY_CHARS", &mut r.max_query_chars);
        env_parse("RAG_HYBRID", &mut r.hybrid_by_default);
        env_parse_finite("RAG_HYBRID_VECTOR_BASE", &mut r.hybrid.vector_base);
        env_parse_finite("RAG_HYBRID_VECTOR_STEP", &mut r.hybrid.vector_step);
        env_parse_finite("RAG_HYBRID_CONSENSUS_BOOST", &mut r.hybrid.consensus_boost);
        env_parse_finite("RAG_HYBRID_KEYWORD_BASE", &mut r.hybrid.keyword_base);
        env_parse_finite("RAG_HYBRID_KEYWORD_STEP", &mut r.hybrid.keyword_step);
        r.default_min_score = r.default_min_score.clamp(0.0, 1.0);
        r.max_top_k = r.max_top_k.max(1);
        r.default_top_k = r.default_top_k.clamp(1, r.max_top_k);

        // Prompt / generation
        let p = &mut config.prompt;
        env_parse("RAG_MAX_QUESTION_CHARS", &mut p.max_question_chars);
        env_parse("RAG_MAX_CONTEXT_CHARS", &mut p.max_context_chars);
        env_parse("RAG_MAX_TOKENS", &mut p.max_tokens);
        env_parse_finite("RAG_TEMPERATURE", &mut p.temperature);
        p.temperature = p.temperature.clamp(0.0, MAX_TEMPERATURE);
        if let Ok(sentinel) = std::env::var("RAG_SENTINEL") {
            if !sentinel.trim().is_empty() {
                p.insufficient_info_sentinel = sentinel;
            }
        }
        if let Ok(instructions) = std::env::var("RAG_CUSTOM_INSTRUCTIONS") {
            p.custom_instructions = Some(instructions);
        }

        // Timeouts
        let t = &mut config.timeouts;
        env_parse("RAG_EMBED_TIMEOUT_SECS", &mut t.embed_secs);
        env_parse("RAG_SEARCH_TIMEOUT_SECS", &mut t.search_secs);
        env_parse("RAG_SCAN_TIMEOUT_SECS", &mut t.scan_secs);
        env_parse("RAG_GENERATION_TIMEOUT_SECS", &mut t.generation_secs);

        config
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("fragments.json")
    }
}
