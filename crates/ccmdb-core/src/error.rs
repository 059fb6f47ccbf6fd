use thiserror::Error;

use crate::types::RetrievalPath;

/// Retrieval failures. An empty result set is not an error; it comes
/// back as an `Ok` with an empty sequence.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// One retrieval path failed or timed out. Retrieval can still
    /// degrade to the surviving path.
    #[error("{path} index unavailable: {source}")]
    IndexUnavailable {
        path: RetrievalPath,
        #[source]
        source: anyhow::Error,
    },

    /// Both paths failed; nothing to degrade to.
    #[error("retrieval unavailable (vector: {vector}; keyword: {keyword})")]
    RetrievalUnavailable {
        vector: anyhow::Error,
        keyword: anyhow::Error,
    },

    #[error("query embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
