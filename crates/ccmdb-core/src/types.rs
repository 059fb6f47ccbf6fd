//! Domain types shared by the keyword and vector retrieval paths.

use serde::{Deserialize, Serialize};

pub type DocumentId = String;
pub type ChunkId = String;

/// Compliance metadata attached to a source document and copied onto
/// each of its chunks so both indices can filter without a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub framework: String,
    pub control_id: Option<String>,
    pub owner: Option<String>,
    pub review_date: Option<String>,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            framework: "unfiled".to_string(),
            control_id: None,
            owner: None,
            review_date: None,
        }
    }
}

/// Immutable source text: a policy, control narrative, or log excerpt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    pub meta: DocumentMeta,
}

/// A bounded slice of a document's text, the unit of retrieval.
///
/// `start..end` are byte offsets into the parent document's text, so
/// `doc.text[chunk.start..chunk.end] == chunk.text`. `embedding` stays
/// `None` until the embedding pipeline fills it in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: DocumentId,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub meta: DocumentMeta,
}

/// Which retrieval path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalPath {
    Vector,
    Keyword,
}

impl std::fmt::Display for RetrievalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vector => write!(f, "vector"),
            Self::Keyword => write!(f, "keyword"),
        }
    }
}

/// A single-path hit before merging. `score` is path-local and only
/// comparable within one path for one query; higher is always better.
/// `rank` is the 0-based position in that path's result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub path: RetrievalPath,
    pub rank: usize,
}

/// Per-path provenance carried into a merged result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathScore {
    pub raw: f32,
    pub normalized: f32,
    pub rank: usize,
}

/// A merged result with a combined score. At least one of `vector` /
/// `keyword` is always present; `primary` names the path whose
/// normalized score was higher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk_id: ChunkId,
    pub combined_score: f32,
    pub primary: RetrievalPath,
    pub vector: Option<PathScore>,
    pub keyword: Option<PathScore>,
}

impl RankedResult {
    /// Tie-break key: original vector-path rank, with results absent
    /// from the vector path ordering after any that were present.
    pub fn vector_rank(&self) -> usize {
        self.vector.map_or(usize::MAX, |p| p.rank)
    }

    pub fn keyword_rank(&self) -> usize {
        self.keyword.map_or(usize::MAX, |p| p.rank)
    }
}

/// Optional equality filters applied by both index adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub framework: Option<String>,
    pub control_id: Option<String>,
    pub owner: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.framework.is_none() && self.control_id.is_none() && self.owner.is_none()
    }

    pub fn matches(&self, meta: &DocumentMeta) -> bool {
        if let Some(fw) = &self.framework {
            if &meta.framework != fw {
                return false;
            }
        }
        if let Some(cid) = &self.control_id {
            if meta.control_id.as_ref() != Some(cid) {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if meta.owner.as_ref() != Some(owner) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_on_framework_and_control() {
        let meta = DocumentMeta {
            framework: "NIST".to_string(),
            control_id: Some("AC-2".to_string()),
            ..DocumentMeta::default()
        };
        let filter = MetadataFilter {
            framework: Some("NIST".to_string()),
            control_id: Some("AC-2".to_string()),
            owner: None,
        };
        assert!(filter.matches(&meta));

        let wrong = MetadataFilter {
            control_id: Some("AC-1".to_string()),
            ..MetadataFilter::default()
        };
        assert!(!wrong.matches(&meta));
    }

    #[test]
    fn vector_rank_defaults_to_max_when_absent() {
        let r = RankedResult {
            chunk_id: "d:0".to_string(),
            combined_score: 0.3,
            primary: RetrievalPath::Keyword,
            vector: None,
            keyword: Some(PathScore { raw: 1.0, normalized: 1.0, rank: 0 }),
        };
        assert_eq!(r.vector_rank(), usize::MAX);
        assert_eq!(r.keyword_rank(), 0);
    }
}
