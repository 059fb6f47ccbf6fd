//! ccmdb-hybrid
//!
//! The hybrid retriever: queries the keyword and vector paths
//! concurrently, normalizes and merges their scores, and degrades to a
//! single path when one index is unavailable.

mod merge;

use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::{info, warn};

use ccmdb_core::error::{RetrievalError, Result};
use ccmdb_core::traits::{Embedder, KeywordIndex, VectorIndex};
use ccmdb_core::types::{Chunk, MetadataFilter, RankedResult, RetrievalPath, RetrievalResult};

/// `[retrieval]` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub vector_weight: f32,
    pub keyword_weight: f32,
    /// Each path fetches `limit * candidate_multiplier` hits so the
    /// merge has enough overlap to work with.
    pub candidate_multiplier: usize,
    /// Per-path budget; a slow path degrades instead of stalling the
    /// whole query.
    pub path_timeout_ms: u64,
    /// Chunk texts per embedding request at index time.
    pub embed_batch_size: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            keyword_weight: 0.3,
            candidate_multiplier: 4,
            path_timeout_ms: 10_000,
            embed_batch_size: 64,
        }
    }
}

impl RetrieverConfig {
    fn validate(&self) -> Result<()> {
        let weights_ok = self.vector_weight.is_finite()
            && self.keyword_weight.is_finite()
            && self.vector_weight >= 0.0
            && self.keyword_weight >= 0.0
            && self.vector_weight + self.keyword_weight > 0.0;
        if !weights_ok {
            return Err(RetrievalError::InvalidConfig(format!(
                "weights must be non-negative with a positive sum (vector {}, keyword {})",
                self.vector_weight, self.keyword_weight
            )));
        }
        if self.candidate_multiplier == 0 {
            return Err(RetrievalError::InvalidConfig(
                "candidate_multiplier must be at least 1".to_string(),
            ));
        }
        if self.path_timeout_ms == 0 {
            return Err(RetrievalError::InvalidConfig(
                "path_timeout_ms must be positive".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(RetrievalError::InvalidConfig(
                "embed_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A path that was down when a query ran, with the typed cause
/// (`IndexUnavailable` for search failures and timeouts, `Embedding`
/// when the query vector could not be computed).
#[derive(Debug)]
pub struct PathOutage {
    pub path: RetrievalPath,
    pub error: RetrievalError,
}

/// The outcome of one hybrid query: a finite, restartable sequence of
/// ranked results plus the paths (if any) that were down when it ran.
#[derive(Debug, Default)]
pub struct Retrieval {
    results: Vec<RankedResult>,
    degraded: Vec<PathOutage>,
}

impl Retrieval {
    pub fn iter(&self) -> std::slice::Iter<'_, RankedResult> {
        self.results.iter()
    }

    pub fn results(&self) -> &[RankedResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<RankedResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn degraded_paths(&self) -> Vec<RetrievalPath> {
        self.degraded.iter().map(|o| o.path).collect()
    }

    /// The typed cause for each degraded path.
    pub fn outages(&self) -> &[PathOutage] {
        &self.degraded
    }
}

impl IntoIterator for Retrieval {
    type Item = RankedResult;
    type IntoIter = std::vec::IntoIter<RankedResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a Retrieval {
    type Item = &'a RankedResult;
    type IntoIter = std::slice::Iter<'a, RankedResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

pub struct HybridRetriever<K, V>
where
    K: KeywordIndex,
    V: VectorIndex,
{
    keyword: K,
    vector: V,
    embedder: Box<dyn Embedder>,
    config: RetrieverConfig,
}

impl<K, V> HybridRetriever<K, V>
where
    K: KeywordIndex,
    V: VectorIndex,
{
    pub fn new(
        keyword: K,
        vector: V,
        embedder: Box<dyn Embedder>,
        config: RetrieverConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { keyword, vector, embedder, config })
    }

    pub fn keyword_index(&self) -> &K {
        &self.keyword
    }

    /// Embeds chunk texts in batches and writes the chunks to both
    /// indices.
    pub async fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut embedded = chunks.to_vec();
        for batch in embedded.chunks_mut(self.config.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await.context("embed chunk batch")?;
            if vectors.len() != batch.len() {
                return Err(anyhow!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                ));
            }
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }
        self.vector.index(&embedded).await.context("write vector index")?;
        self.keyword.index(&embedded).await.context("write keyword index")?;
        info!(chunks = embedded.len(), "indexed chunks into both retrieval paths");
        Ok(())
    }

    /// Runs one hybrid query.
    ///
    /// Both paths are issued concurrently, each bounded by the
    /// configured timeout. One path down degrades to the other and is
    /// reported on the `Retrieval`; both down is `RetrievalUnavailable`.
    pub async fn retrieve(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Retrieval> {
        if limit == 0 {
            return Ok(Retrieval::default());
        }
        let fetch_k = limit.saturating_mul(self.config.candidate_multiplier);
        let budget = Duration::from_millis(self.config.path_timeout_ms);

        let keyword_path = async {
            self.keyword
                .search(query, filter, fetch_k)
                .await
                .map_err(|source| RetrievalError::IndexUnavailable {
                    path: RetrievalPath::Keyword,
                    source,
                })
        };
        let (vector_out, keyword_out) = tokio::join!(
            bounded(budget, RetrievalPath::Vector, self.vector_path(query, filter, fetch_k)),
            bounded(budget, RetrievalPath::Keyword, keyword_path),
        );

        let mut degraded = Vec::new();
        let (vector_hits, keyword_hits) = match (vector_out, keyword_out) {
            (Ok(v), Ok(k)) => (Some(v), Some(k)),
            (Ok(v), Err(error)) => {
                warn!(path = %RetrievalPath::Keyword, %error, "path unavailable, degrading");
                degraded.push(PathOutage { path: RetrievalPath::Keyword, error });
                (Some(v), None)
            }
            (Err(error), Ok(k)) => {
                warn!(path = %RetrievalPath::Vector, %error, "path unavailable, degrading");
                degraded.push(PathOutage { path: RetrievalPath::Vector, error });
                (None, Some(k))
            }
            (Err(vector), Err(keyword)) => {
                return Err(RetrievalError::RetrievalUnavailable {
                    vector: vector.into(),
                    keyword: keyword.into(),
                });
            }
        };

        let results = merge::merge(
            vector_hits.as_deref(),
            keyword_hits.as_deref(),
            self.config.vector_weight,
            self.config.keyword_weight,
            limit,
        );
        Ok(Retrieval { results, degraded })
    }

    /// The vector path: query embedding followed by the index search.
    /// An embedding failure takes this path down, not the whole query.
    async fn vector_path(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let mut vectors = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await
            .map_err(RetrievalError::Embedding)?;
        if vectors.is_empty() {
            return Err(RetrievalError::Embedding(anyhow!(
                "embedder returned no vector for the query"
            )));
        }
        let query_vec = vectors.swap_remove(0);
        self.vector.search(&query_vec, filter, k).await.map_err(|source| {
            RetrievalError::IndexUnavailable { path: RetrievalPath::Vector, source }
        })
    }
}

async fn bounded<T>(
    budget: Duration,
    path: RetrievalPath,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(budget, fut).await {
        Ok(out) => out,
        Err(_) => Err(RetrievalError::IndexUnavailable {
            path,
            source: anyhow!("timed out after {}ms", budget.as_millis()),
        }),
    }
}
