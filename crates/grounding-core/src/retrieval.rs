//! Retrieval pipeline: metadata-filtered similarity search with a
//! deterministic ranking.
//!
//! The underlying vector search does not define an order for equal
//! scores, so one is imposed here: score descending, then `chunk_index`
//! ascending, then `doc_id` ascending. Both store implementations rank
//! through [`rank_candidates`] before truncating, so a `top_k` cutoff
//! falls on the same row no matter the backend.

use std::cmp::Ordering;

use crate::error::Result;
use crate::store::{ChunkFilter, ScoredChunk, VectorStore};

/// Run a similarity search for `terms` against a [`VectorStore`].
///
/// Terms are joined into a single query string. `top_k = 0` disables
/// retrieval entirely and returns an empty list without touching the
/// embedding client; so does an empty or whitespace-only term list.
pub async fn retrieve<V>(
    store: &V,
    terms: &[String],
    top_k: usize,
    filter: &ChunkFilter,
) -> Result<Vec<ScoredChunk>>
where
    V: VectorStore + ?Sized,
{
    if top_k == 0 {
        return Ok(Vec::new());
    }
    let query = terms.join(" ");
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut results = store.similarity_search(&query, top_k, filter).await?;
    rank_candidates(&mut results);
    results.truncate(top_k);
    Ok(results)
}

/// Sort candidates by score descending, breaking ties by ascending
/// `chunk_index`, then ascending `doc_id` (numerically where the
/// stringified id parses, lexicographically otherwise).
pub fn rank_candidates(candidates: &mut [ScoredChunk]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
            .then_with(|| doc_id_order(&a.doc_id, &b.doc_id))
    });
}

fn doc_id_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
