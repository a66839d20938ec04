//! Error types for the retrieval and answer pipeline.
//!
//! Only [`EngineError`] reaches callers of [`crate::engine::RagEngine`].
//! The other kinds are absorbed along the degradation chain: a dimension
//! mismatch drops one candidate, an unavailable index falls back to a full
//! scan, a failed scan yields an empty result set.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Query and candidate vectors have different lengths.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// The repository's native nearest-neighbour query could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Native retrieval unavailable: {0}")]
pub struct RetrievalUnavailable(pub String);

/// The repository's raw scan failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Repository scan failed: {0}")]
pub struct RepositoryError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// The elapsed bound, when the layer that timed out knows it.
    #[error("Embedding request timed out{}", elapsed_suffix(.0))]
    Timeout(Option<Duration>),

    #[error("Embedding provider returned no vector")]
    Empty,
}

/// Failure of the external answer generator, kept distinct per cause so
/// callers can present differentiated messaging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation provider rejected credentials: {0}")]
    Auth(String),

    #[error("Generation provider rate limited the request: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Generation timed out{}", elapsed_suffix(.0))]
    Timeout(Option<Duration>),

    #[error("Generation failed: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Short, end-user facing explanation for each failure kind.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(_) => {
                "The answer service is not authorised. Check the configured API key.".to_string()
            }
            Self::RateLimit {
                retry_after_secs: Some(secs),
                ..
            } => format!("The answer service is busy. Please retry in {secs} seconds."),
            Self::RateLimit { .. } => {
                "The answer service is busy. Please try again shortly.".to_string()
            }
            Self::Timeout(_) => "The answer service took too long to respond.".to_string(),
            Self::Unknown(_) => "The answer service failed unexpectedly.".to_string(),
        }
    }
}

fn elapsed_suffix(limit: &Option<Duration>) -> String {
    match limit {
        Some(d) => format!(" after {}ms", d.as_millis()),
        None => String::new(),
    }
}

/// A single violated input rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    QuestionRequired,
    QuestionTooLong { len: usize, max: usize },
    ContextRequired,
    ContextTooLong { len: usize, max: usize },
    TopKOutOfRange { top_k: usize, max: usize },
    MinScoreOutOfRange(f32),
}

impl Violation {
    /// Stable rule identifier, suitable for programmatic checks.
    pub const fn rule(&self) -> &'static str {
        match self {
            Self::QuestionRequired => "question_required",
            Self::QuestionTooLong { .. } => "question_length",
            Self::ContextRequired => "context_required",
            Self::ContextTooLong { .. } => "context_length",
            Self::TopKOutOfRange { .. } => "top_k_range",
            Self::MinScoreOutOfRange(_) => "min_score_range",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuestionRequired => write!(f, "question_required: question must not be empty"),
            Self::QuestionTooLong { len, max } => write!(
                f,
                "question_length: question is {len} characters, maximum is {max}"
            ),
            Self::ContextRequired => write!(f, "context_required: context must not be empty"),
            Self::ContextTooLong { len, max } => write!(
                f,
                "context_length: context is {len} characters, maximum is {max}"
            ),
            Self::TopKOutOfRange { top_k, max } => {
                write!(f, "top_k_range: top_k must be between 1 and {max}, got {top_k}")
            }
            Self::MinScoreOutOfRange(score) => {
                write!(f, "min_score_range: min_score must be within [0, 1], got {score}")
            }
        }
    }
}

/// Every rule an input broke, not just the first one.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn has_rule(&self, rule: &str) -> bool {
        self.violations.iter().any(|v| v.rule() == rule)
    }

    /// `Ok(())` when nothing was violated, otherwise the collected error.
    pub fn check(violations: Vec<Violation>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self { violations })
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced to the calling application layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}
