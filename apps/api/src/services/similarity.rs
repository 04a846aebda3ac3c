//! Brute-force cosine ranking over an in-memory slice of embedded records.

use crate::{
    error::{ApiError, Result},
    models::{EmbeddedRecord, RecommendationFilters, ScoredStrain},
};
use ndarray::ArrayView1;

pub const DEFAULT_TOP_K: usize = 5;

/// Cosine of the angle between `a` and `b`. A zero-magnitude vector scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ApiError::DimensionMismatch {
            expected: b.len(),
            got: a.len(),
        });
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let magnitude = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if magnitude == 0.0 {
        return Ok(0.0);
    }

    Ok(a.dot(&b) / magnitude)
}

/// Rank `records` against `query` and keep the best `k` that pass `filters`.
///
/// Every record is dimension-checked, filtered or not, so an index built with a
/// different model is reported instead of silently producing a partial ranking.
/// Equal scores keep their original order.
pub fn rank(
    query: &[f32],
    records: &[EmbeddedRecord],
    filters: Option<&RecommendationFilters>,
    k: usize,
) -> Result<Vec<ScoredStrain>> {
    let mut scored = Vec::with_capacity(records.len());

    for (index, embedded) in records.iter().enumerate() {
        let similarity = cosine_similarity(query, &embedded.embedding)?;
        if filters.map_or(true, |f| f.matches(&embedded.record)) {
            scored.push((index, similarity));
        }
    }

    // sort_by is stable, which keeps first-seen order on ties
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(index, similarity)| ScoredStrain {
            record: records[index].record.clone(),
            similarity,
        })
        .collect())
}
