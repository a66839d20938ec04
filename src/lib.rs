//! # grounded-rag
//!
//! Semantic retrieval over pre-embedded text fragments, with a brute-force
//! fallback when the store's native similarity query is unavailable,
//! optional keyword/vector hybrid ranking, and answer generation constrained
//! to the retrieved context.
//!
//! ## Architecture
//!
//! ```text
//!                        ┌──────────────┐
//!                        │   Question   │
//!                        └──────┬───────┘
//!                               │ validate (length, emptiness)
//!                               ▼
//!                        ┌──────────────┐
//!                        │  Embed query │──── failure: vector signal empty
//!                        └──────┬───────┘
//!                               ▼
//!                 ┌───────────────────────────┐
//!                 │  Native nearest-neighbour │
//!                 └─────────────┬─────────────┘
//!                               │ unavailable / timeout
//!                               ▼
//!                 ┌───────────────────────────┐
//!                 │  Full scan + cosine rank  │──── scan failure: []
//!                 └─────────────┬─────────────┘
//!                               │
//!              hybrid?          ▼
//!     ┌─────────────────┐  ┌─────────────────────┐
//!     │ Keyword matches │─▶│ Rank-decay merge    │
//!     └─────────────────┘  │ +0.3 on consensus   │
//!                          └──────────┬──────────┘
//!                                     ▼
//!                          ┌─────────────────────┐
//!                          │ Context assembly    │
//!                          │ [Source: ..] blocks │
//!                          └──────────┬──────────┘
//!                                     ▼
//!                          ┌─────────────────────┐
//!                          │ Grounding prompt    │
//!                          │ + LLM completion    │
//!                          └──────────┬──────────┘
//!                                     ▼
//!                          ┌─────────────────────┐
//!                          │ Answer + sources    │
//!                          └─────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for limits, weights, timeouts and LLM settings
//! - [`models`] - Fragments, queries, scored results and answer types
//! - [`error`] - Error kinds along the degradation chain; [`error::EngineError`] is what callers see
//! - [`ports`] - Async traits for the embedding model, fragment store and LLM
//! - [`search::vector`] - Cosine similarity and the JSON-persisted in-memory fragment store
//! - [`search::primary`] - Native search with fallback to a full scan
//! - [`search::fallback`] - Embedding decoding and brute-force similarity ranking
//! - [`search::keyword`] - Naive lexical matching
//! - [`search::hybrid`] - Rank-decay merge of vector and keyword results
//! - [`context`] - Source-tagged context assembly under a size budget
//! - [`llm`] - Prompt construction and Ollama / OpenAI-compatible HTTP clients
//! - [`engine`] - The `RagEngine` composition root: `search`, `answer`, `health`

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod llm;
pub mod models;
pub mod ports;
pub mod search;
