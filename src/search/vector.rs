use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{DimensionMismatch, RepositoryError, RetrievalUnavailable};
use crate::models::{ScoredFragment, StoredEmbedding, StoredFragment};
use crate::ports::{ChunkRepository, ComponentStatus};
use crate::search::fallback::rank_by_similarity;

/// Cosine similarity of two equal-length vectors.
///
/// Returns `0.0` when either vector has zero norm, never `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, DimensionMismatch> {
    if a.len() != b.len() {
        return Err(DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        Ok(0.0)
    } else {
        Ok((dot / denom).clamp(-1.0, 1.0))
    }
}

/// In-memory fragment store with JSON persistence.
///
/// Serves both repository paths: `native_search` ranks in process,
/// `scan_all` hands back the raw entries.
pub struct VectorStore {
    entries: RwLock<Vec<StoredFragment>>,
    persist_path: PathBuf,
}

impl VectorStore {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let data = std::fs::read_to_string(path).context("Failed to read fragment store")?;
            serde_json::from_str(&data).context("Failed to parse fragment store")?
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: path.to_path_buf(),
        })
    }

    /// Insert or replace fragments by id, then persist.
    pub fn add_fragments(&self, fragments: Vec<StoredFragment>) -> Result<()> {
        let mut entries = self.entries.write();
        let mut index: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        for fragment in fragments {
            match index.get(&fragment.id) {
                Some(&i) => entries[i] = fragment,
                None => {
                    index.insert(fragment.id.clone(), entries.len());
                    entries.push(fragment);
                }
            }
        }
        persist(&self.persist_path, &entries)
    }

    /// Delete all fragments of a source.
    pub fn delete_source(&self, source_name: &str) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.source_name != source_name);
        let removed = before - entries.len();
        persist(&self.persist_path, &entries)?;
        Ok(removed)
    }

    pub fn fragment_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Get counts grouped by source name.
    pub fn source_counts(&self) -> HashMap<String, usize> {
        let entries = self.entries.read();
        let mut counts = HashMap::new();
        for e in entries.iter() {
            *counts.entry(e.source_name.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn filtered(&self, source_filter: Option<&str>) -> Vec<StoredFragment> {
        self.entries
            .read()
            .iter()
            .filter(|e| source_filter.map_or(true, |s| e.source_name == s))
            .cloned()
            .collect()
    }
}

/// Atomic write via temp file + rename.
fn persist(path: &Path, entries: &[StoredFragment]) -> Result<()> {
    let data = serde_json::to_string(entries)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path).context("Failed to replace fragment store")?;
    Ok(())
}

#[async_trait]
impl ChunkRepository for VectorStore {
    async fn native_search(
        &self,
        embedding: &[f32],
        min_score: f32,
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredFragment>, RetrievalUnavailable> {
        let candidates = self.filtered(source_filter);
        // Mixed storage formats are the scan path's job.
        if candidates
            .iter()
            .any(|c| !matches!(c.embedding, StoredEmbedding::Native(_)))
        {
            return Err(RetrievalUnavailable(
                "store holds non-native embeddings".to_string(),
            ));
        }
        Ok(rank_by_similarity(embedding, candidates, min_score, top_k))
    }

    async fn scan_all(
        &self,
        source_filter: Option<&str>,
    ) -> Result<Vec<StoredFragment>, RepositoryError> {
        Ok(self.filtered(source_filter))
    }

    async fn health_check(&self) -> ComponentStatus {
        if self.fragment_count() == 0 {
            ComponentStatus::Degraded("fragment store is empty".to_string())
        } else {
            ComponentStatus::Healthy
        }
    }
}
