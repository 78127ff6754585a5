//! Similarity ranking over a loaded story index.
//!
//! A query is embedded with the index's own provider and scored against
//! every stored vector with cosine similarity: a linear scan, O(n) per
//! query, which is the accepted cost at this corpus scale (hundreds to low
//! thousands of stories). There is deliberately no approximate-nearest-
//! neighbor structure here.

use std::cmp::Ordering;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::Result;
use crate::index::StoryIndex;
use crate::models::StoryMatch;

/// Rank every indexed story against a query vector and select results.
///
/// The full corpus is sorted by similarity descending (stable, so ties keep
/// corpus order), then a lookahead buffer of `2 * top_k` is kept before the
/// threshold is applied. The over-fetch is intentional headroom: downstream
/// filtering (the safety gate) may drop candidates, and the caller should
/// still receive up to `top_k` survivors when possible. Slots lost past the
/// buffer are not backfilled; short results are part of the contract.
///
/// Never returns more than `top_k` matches; may return fewer.
pub fn rank(
    index: &StoryIndex,
    query_vector: &[f32],
    top_k: usize,
    min_similarity: f32,
) -> Vec<StoryMatch> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = index
        .vectors()
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query_vector, v)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k * 2);

    let mut results = Vec::new();
    for (i, similarity) in scored {
        if results.len() == top_k {
            break;
        }
        if similarity >= min_similarity {
            results.push(StoryMatch {
                story: index.stories()[i].clone(),
                similarity,
            });
        }
    }

    results
}

/// Embed a query text and rank it against the index.
///
/// Empty or whitespace-only text matches nothing by definition: the result
/// is an empty list, not an error, and the embedding provider is never
/// called for it.
pub async fn query(
    index: &StoryIndex,
    provider: &dyn EmbeddingProvider,
    user_text: &str,
    top_k: usize,
    min_similarity: f32,
) -> Result<Vec<StoryMatch>> {
    let trimmed = user_text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let query_vector = provider.embed_one(trimmed).await?;
    Ok(rank(index, &query_vector, top_k, min_similarity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Story;

    fn story(id: &str, body: &str) -> Story {
        Story {
            id: id.to_string(),
            title: None,
            body: body.to_string(),
            tags: Vec::new(),
            author_id: None,
            created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            parent_id: None,
            thread_id: None,
        }
    }

    fn unit_index(vectors: Vec<Vec<f32>>) -> StoryIndex {
        let stories = (0..vectors.len())
            .map(|i| story(&format!("s{}", i), "body"))
            .collect();
        StoryIndex::new(stories, vectors, "test-model".to_string(), 3).unwrap()
    }

    #[test]
    fn test_at_most_k_sorted_descending() {
        let index = unit_index(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.5, 0.5, 0.0],
            vec![0.7, 0.3, 0.0],
        ]);

        let results = rank(&index, &[1.0, 0.0, 0.0], 3, 0.0);
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_threshold_respected() {
        let index = unit_index(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.6, 0.8, 0.0],
        ]);

        let results = rank(&index, &[1.0, 0.0, 0.0], 10, 0.5);
        assert!(!results.is_empty());
        for m in &results {
            assert!(m.similarity >= 0.5);
        }
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        // Three identical vectors: stable sort must preserve positions.
        let index = unit_index(vec![
            vec![1.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
        ]);

        let results = rank(&index, &[1.0, 0.0, 0.0], 3, 0.0);
        let ids: Vec<&str> = results.iter().map(|m| m.story.id.as_str()).collect();
        assert_eq!(ids, ["s0", "s1", "s2"]);
    }

    #[test]
    fn test_lookahead_buffer_bounds_threshold_scan() {
        // Six candidates, top_k = 1: the buffer holds the best two, and a
        // qualifying candidate outside the buffer is never reached.
        let index = unit_index(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.95, 0.05, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.8, 0.2, 0.0],
            vec![0.7, 0.3, 0.0],
            vec![0.6, 0.4, 0.0],
        ]);

        let results = rank(&index, &[1.0, 0.0, 0.0], 1, 0.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].story.id, "s0");
    }

    #[test]
    fn test_zero_norm_vectors_score_zero() {
        let index = unit_index(vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]);
        let results = rank(&index, &[1.0, 0.0, 0.0], 2, 0.0);
        assert_eq!(results[0].story.id, "s1");
        assert_eq!(results[1].similarity, 0.0);
    }

    #[test]
    fn test_fewer_results_when_threshold_starves() {
        let index = unit_index(vec![vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]);
        let results = rank(&index, &[1.0, 0.0, 0.0], 5, 0.9);
        assert!(results.is_empty());
    }
}
