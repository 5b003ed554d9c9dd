// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding index over inspection records with hybrid retrieval.
//!
//! Every indexed record keeps one fixed-dimension vector computed from
//! [`InspectionRecord::search_text`]. Queries are embedded with the same
//! adapter; hybrid search fuses the cosine ranking with a keyword-overlap
//! ranking through [`weighted_rrf`].

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use kestrel_core::text::tokenize;
use kestrel_core::{EmbeddingAdapter, InspectionRecord, KestrelError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fusion::{RRF_K, weighted_rrf};
use crate::types::cosine_similarity;

/// A record returned by the index with its score.
///
/// For [`SemanticIndex::search`] and [`SemanticIndex::find_similar`] the
/// score is cosine similarity; for hybrid search it is the fused RRF score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: InspectionRecord,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub records: usize,
    pub dimensions: usize,
    pub embedder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    record: InspectionRecord,
    vector: Vec<f32>,
    #[serde(skip)]
    tokens: BTreeSet<String>,
}

impl IndexEntry {
    fn new(record: InspectionRecord, vector: Vec<f32>) -> Self {
        let tokens = tokenize(&record.search_text()).into_iter().collect();
        Self {
            record,
            vector,
            tokens,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimensions: usize,
    records: Vec<IndexEntry>,
}

/// In-memory vector index keyed by record id.
pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingAdapter>,
    rrf_k: f32,
    dimensions: usize,
    entries: Vec<IndexEntry>,
    positions: HashMap<i64, usize>,
}

impl SemanticIndex {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self {
            embedder,
            rrf_k: RRF_K,
            dimensions: 0,
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Overrides the RRF constant used by [`hybrid_search`](Self::hybrid_search).
    pub fn with_rrf_k(mut self, rrf_k: f32) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    /// Embeds and stores `records`, replacing entries with the same id.
    ///
    /// Returns the number of records written.
    pub async fn index(&mut self, records: &[InspectionRecord]) -> Result<usize, KestrelError> {
        if records.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = records.iter().map(InspectionRecord::search_text).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            return Err(KestrelError::Provider {
                message: format!(
                    "embedder returned {} vectors for {} records",
                    vectors.len(),
                    records.len()
                ),
                source: None,
            });
        }

        let expected = if self.entries.is_empty() {
            vectors[0].len()
        } else {
            self.dimensions
        };
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(KestrelError::Provider {
                message: format!(
                    "embedding dimension mismatch: expected {expected}, got {}",
                    bad.len()
                ),
                source: None,
            });
        }
        self.dimensions = expected;

        for (record, vector) in records.iter().zip(vectors) {
            let entry = IndexEntry::new(record.clone(), vector);
            match self.positions.get(&record.id) {
                Some(&pos) => self.entries[pos] = entry,
                None => {
                    self.positions.insert(record.id, self.entries.len());
                    self.entries.push(entry);
                }
            }
        }

        info!(
            indexed = records.len(),
            total = self.entries.len(),
            dimensions = self.dimensions,
            "records indexed"
        );
        Ok(records.len())
    }

    /// Records whose cosine similarity to `query` is at least `threshold`,
    /// best first, at most `top_k`.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, KestrelError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = self.embed_query(query).await?;
        Ok(self.rank_by_vector(&query_vector, None, top_k, threshold))
    }

    /// Fuses vector and keyword rankings with weighted reciprocal rank fusion.
    pub async fn hybrid_search(
        &self,
        query: &str,
        vector_weight: f32,
        keyword_weight: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, KestrelError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = self.embed_query(query).await?;

        let vector_ranked: Vec<i64> = self
            .rank_by_vector(&query_vector, None, self.entries.len(), f32::NEG_INFINITY)
            .into_iter()
            .map(|hit| hit.record.id)
            .collect();
        let keyword_ranked = self.rank_by_keywords(query);
        debug!(
            vector = vector_ranked.len(),
            keyword = keyword_ranked.len(),
            "fusing rankings"
        );

        Ok(weighted_rrf(
            &vector_ranked,
            &keyword_ranked,
            vector_weight,
            keyword_weight,
            self.rrf_k,
        )
        .into_iter()
        .take(top_k)
        .filter_map(|(id, score)| {
            self.get(id).map(|entry| SearchHit {
                record: entry.record.clone(),
                score,
            })
        })
        .collect())
    }

    /// Records most similar to an already indexed record, excluding it.
    ///
    /// Unknown ids yield no hits.
    pub fn find_similar(&self, record_id: i64, top_k: usize) -> Vec<SearchHit> {
        match self.get(record_id) {
            Some(seed) => {
                self.rank_by_vector(&seed.vector, Some(record_id), top_k, f32::NEG_INFINITY)
            }
            None => Vec::new(),
        }
    }

    /// Writes the index as JSON.
    pub async fn save_index(&self, path: &Path) -> Result<(), KestrelError> {
        let file = IndexFile {
            dimensions: self.dimensions,
            records: self.entries.clone(),
        };
        let json = serde_json::to_vec(&file).map_err(|e| KestrelError::Persistence {
            message: format!("failed to encode index: {e}"),
            source: Some(Box::new(e)),
        })?;
        crate::persistence::write_atomically(path, &json).await?;
        info!(path = %path.display(), records = self.entries.len(), "index saved");
        Ok(())
    }

    /// Replaces the index contents with a file written by [`save_index`](Self::save_index).
    pub async fn load_index(&mut self, path: &Path) -> Result<usize, KestrelError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| KestrelError::Persistence {
                message: format!("failed to read index {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })?;
        let file: IndexFile =
            serde_json::from_slice(&bytes).map_err(|e| KestrelError::Persistence {
                message: format!("failed to decode index {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })?;

        self.clear();
        self.dimensions = file.dimensions;
        for entry in file.records {
            let entry = IndexEntry::new(entry.record, entry.vector);
            self.positions.insert(entry.record.id, self.entries.len());
            self.entries.push(entry);
        }
        info!(path = %path.display(), records = self.entries.len(), "index loaded");
        Ok(self.entries.len())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            records: self.entries.len(),
            dimensions: self.dimensions,
            embedder: self.embedder.name().to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
        self.dimensions = 0;
    }

    fn get(&self, id: i64) -> Option<&IndexEntry> {
        self.positions.get(&id).map(|&pos| &self.entries[pos])
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, KestrelError> {
        self.embedder
            .embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| KestrelError::Provider {
                message: "embedder returned no vector for query".into(),
                source: None,
            })
    }

    fn rank_by_vector(
        &self,
        query: &[f32],
        exclude: Option<i64>,
        top_k: usize,
        threshold: f32,
    ) -> Vec<SearchHit> {
        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .filter(|e| Some(e.record.id) != exclude)
            .map(|e| (cosine_similarity(query, &e.vector), e))
            .filter(|(score, _)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.record.id.cmp(&b.1.record.id))
        });
        scored
            .into_iter()
            .take(top_k)
            .map(|(score, e)| SearchHit {
                record: e.record.clone(),
                score: f64::from(score),
            })
            .collect()
    }

    /// Ids with at least one query token, most overlapping first.
    fn rank_by_keywords(&self, query: &str) -> Vec<i64> {
        let query_tokens: BTreeSet<String> = tokenize(query).into_iter().collect();
        let mut scored: Vec<(usize, i64)> = self
            .entries
            .iter()
            .map(|e| (e.tokens.intersection(&query_tokens).count(), e.record.id))
            .filter(|(overlap, _)| *overlap > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use kestrel_core::Verdict;

    fn record(id: i64, device: &str, result: Verdict, station: &str) -> InspectionRecord {
        InspectionRecord {
            id,
            timestamp: format!("2026-10-16T08:{:02}:00", id % 60),
            device_id: device.to_string(),
            image_id: None,
            result,
            station: station.to_string(),
        }
    }

    fn sample() -> Vec<InspectionRecord> {
        vec![
            record(1, "Camera_03", Verdict::Fail, "STA_580"),
            record(2, "Camera_03", Verdict::Pass, "STA_580"),
            record(3, "Basler_GigE", Verdict::Pass, "STA_100"),
            record(4, "Watashi_cam", Verdict::Fail, "STA_200"),
        ]
    }

    async fn index() -> SemanticIndex {
        let mut index = SemanticIndex::new(Arc::new(HashingEmbedder::new(4096)));
        index.index(&sample()).await.unwrap();
        index
    }

    #[tokio::test]
    async fn index_and_search() {
        let index = index().await;
        assert_eq!(index.len(), 4);

        let hits = index.search("Camera_03 fail STA_580", 2, 0.0).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn threshold_filters_weak_matches() {
        let index = index().await;
        let hits = index.search("Camera_03 fail STA_580", 10, 0.99).await.unwrap();
        assert!(hits.iter().all(|h| h.score >= 0.99));
    }

    #[tokio::test]
    async fn reindexing_replaces_by_id() {
        let mut index = index().await;
        index
            .index(&[record(3, "Camera_03", Verdict::Fail, "STA_580")])
            .await
            .unwrap();
        assert_eq!(index.len(), 4);
        let hits = index.find_similar(1, 4);
        assert!(hits.iter().any(|h| h.record.id == 3 && h.record.device_id == "Camera_03"));
    }

    #[tokio::test]
    async fn find_similar_excludes_seed() {
        let index = index().await;
        let hits = index.find_similar(1, 10);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.record.id != 1));
        assert_eq!(hits[0].record.id, 2);
        assert!(index.find_similar(99, 10).is_empty());
    }

    #[tokio::test]
    async fn hybrid_search_prefers_keyword_and_vector_agreement() {
        let index = index().await;
        let hits = index
            .hybrid_search("Watashi_cam fail", 0.7, 0.3, 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].record.id, 4);
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let index = SemanticIndex::new(Arc::new(HashingEmbedder::new(8)));
        assert!(index.search("x", 5, 0.0).await.unwrap().is_empty());
        assert!(index.hybrid_search("x", 0.5, 0.5, 5).await.unwrap().is_empty());
        assert_eq!(index.stats().dimensions, 0);
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = index().await;
        index.save_index(&path).await.unwrap();

        let mut loaded = SemanticIndex::new(Arc::new(HashingEmbedder::new(4096)));
        assert_eq!(loaded.load_index(&path).await.unwrap(), 4);
        assert_eq!(loaded.stats().dimensions, 4096);
        let hits = loaded
            .hybrid_search("Camera_03 fail", 0.5, 0.5, 1)
            .await
            .unwrap();
        assert_eq!(hits[0].record.id, 1);
    }

    #[tokio::test]
    async fn load_missing_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = SemanticIndex::new(Arc::new(HashingEmbedder::new(8)));
        let err = index.load_index(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, KestrelError::Persistence { .. }));
    }
}
