//! Score normalization and two-path merging.
//!
//! Raw scores are not comparable across paths (BM25 vs. vector
//! similarity), so each path is min-max normalized per query before the
//! weighted sum. A path whose scores are all equal normalizes to 1.0.

use std::cmp::Ordering;
use std::collections::HashMap;

use ccmdb_core::types::{ChunkId, PathScore, RankedResult, RetrievalPath, RetrievalResult};

pub(crate) fn normalize(results: &[RetrievalResult]) -> Vec<(ChunkId, PathScore)> {
    if results.is_empty() {
        return Vec::new();
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for r in results {
        min = min.min(r.score);
        max = max.max(r.score);
    }
    let span = max - min;
    results
        .iter()
        .map(|r| {
            let normalized = if span <= f32::EPSILON { 1.0 } else { (r.score - min) / span };
            (
                r.chunk_id.clone(),
                PathScore { raw: r.score, normalized, rank: r.rank },
            )
        })
        .collect()
}

/// Merges the two (possibly absent) path result lists into a ranked,
/// deduplicated, truncated list. A chunk seen by both paths keeps both
/// provenances, its contributions sum, and `primary` is the path with
/// the higher normalized score.
pub(crate) fn merge(
    vector: Option<&[RetrievalResult]>,
    keyword: Option<&[RetrievalResult]>,
    vector_weight: f32,
    keyword_weight: f32,
    limit: usize,
) -> Vec<RankedResult> {
    let mut by_id: HashMap<ChunkId, RankedResult> = HashMap::new();

    if let Some(hits) = vector {
        for (id, ps) in normalize(hits) {
            by_id.entry(id.clone()).or_insert(RankedResult {
                chunk_id: id,
                combined_score: vector_weight * ps.normalized,
                primary: RetrievalPath::Vector,
                vector: Some(ps),
                keyword: None,
            });
        }
    }
    if let Some(hits) = keyword {
        for (id, ps) in normalize(hits) {
            match by_id.entry(id.clone()) {
                std::collections::hash_map::Entry::Occupied(mut e) => {
                    let r = e.get_mut();
                    if r.keyword.is_some() {
                        continue; // same chunk twice in one path's list
                    }
                    r.combined_score += keyword_weight * ps.normalized;
                    if !r.vector.is_some_and(|v| v.normalized >= ps.normalized) {
                        r.primary = RetrievalPath::Keyword;
                    }
                    r.keyword = Some(ps);
                }
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(RankedResult {
                        chunk_id: id,
                        combined_score: keyword_weight * ps.normalized,
                        primary: RetrievalPath::Keyword,
                        vector: None,
                        keyword: Some(ps),
                    });
                }
            }
        }
    }

    let mut merged: Vec<RankedResult> = by_id.into_values().collect();
    sort_ranked(&mut merged);
    merged.truncate(limit);
    merged
}

/// Combined score descending; ties go to the better original
/// vector-path rank, then keyword rank for full determinism.
pub(crate) fn sort_ranked(results: &mut [RankedResult]) {
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.vector_rank().cmp(&b.vector_rank()))
            .then_with(|| a.keyword_rank().cmp(&b.keyword_rank()))
    });
}
