//! Seams to the external collaborators: the embedding model and the
//! two search backends. The hybrid retriever is generic over these so
//! tests can swap in in-memory fakes.

use async_trait::async_trait;

use crate::types::{Chunk, ChunkId, MetadataFilter, RetrievalResult};

/// Turns text into fixed-length vectors. Backed by a hosted embedding
/// model in production.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Lexical (BM25) index over chunk text with stored-field lookup.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    async fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()>;

    /// Top-k lexical hits, ranked, with `RetrievalPath::Keyword`
    /// provenance and 0-based ranks.
    async fn search(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> anyhow::Result<Vec<RetrievalResult>>;

    /// Read stored chunks back by id, for answer composition. Ids with
    /// no stored chunk are skipped; embeddings are not reconstructed.
    async fn fetch(&self, ids: &[ChunkId]) -> anyhow::Result<Vec<Chunk>>;
}

/// Nearest-neighbor index over chunk embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Indexes chunks whose `embedding` has been computed. Chunks with
    /// a missing embedding are an error, not silently dropped.
    async fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()>;

    async fn search(
        &self,
        query_vec: &[f32],
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> anyhow::Result<Vec<RetrievalResult>>;
}
