//! Semantic neighborhood search: keyword, concept, embedding, and
//! hybrid strategies for `get_related_items`.
//!
//! Keyword/concept scoring is the sum of the candidate's weights over
//! terms shared with the anchor. Embedding scoring is the inner
//! product of dequantized vectors, with candidates pre-filtered by
//! shared tags or shared top-3 concepts; a full scan is bounded by the
//! configured ceiling. Hybrid fuses per-strategy scores normalized by
//! their maxima. Self is always excluded.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::HybridWeights;
use crate::enrich::{QuantizedEmbedding, dot};
use crate::error::{Error, Result};
use crate::model::ItemSummary;
use crate::storage::item_store;

use super::executor::summaries_for_ids;

/// Strategy for `get_related_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedStrategy {
    Keywords,
    Concepts,
    Embedding,
    #[default]
    Hybrid,
}

impl RelatedStrategy {
    /// Parse a strategy name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keywords" => Some(Self::Keywords),
            "concepts" => Some(Self::Concepts),
            "embedding" => Some(Self::Embedding),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// A related item with its strategy score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: ItemSummary,
    pub score: f64,
}

/// Execute a related-items search around `anchor_id`.
///
/// # Errors
///
/// Returns `NotFound` if the anchor does not exist.
pub fn related_items(
    conn: &Connection,
    anchor_id: i64,
    strategy: RelatedStrategy,
    weights: &HybridWeights,
    limit: usize,
    candidate_ceiling: usize,
) -> Result<Vec<ScoredItem>> {
    if !item_store::exists(conn, anchor_id)? {
        return Err(Error::NotFound {
            entity: "item",
            key: anchor_id.to_string(),
        });
    }

    let scores = match strategy {
        RelatedStrategy::Keywords => shared_term_scores(conn, anchor_id, "item_keywords", "keyword_id")?,
        RelatedStrategy::Concepts => shared_term_scores(conn, anchor_id, "item_concepts", "concept_id")?,
        RelatedStrategy::Embedding => embedding_scores(conn, anchor_id, candidate_ceiling)?,
        RelatedStrategy::Hybrid => hybrid_scores(conn, anchor_id, weights, candidate_ceiling)?,
    };

    let mut ranked: Vec<(i64, f64)> = scores
        .into_iter()
        .filter(|&(id, score)| id != anchor_id && score > 0.0)
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(limit);

    let ids: Vec<i64> = ranked.iter().map(|&(id, _)| id).collect();
    let summaries = summaries_for_ids(conn, &ids)?;

    Ok(summaries
        .into_iter()
        .zip(ranked.iter())
        .map(|(item, &(_, score))| ScoredItem { item, score })
        .collect())
}

/// Score candidates by the sum of their weights over terms shared
/// with the anchor.
fn shared_term_scores(
    conn: &Connection,
    anchor_id: i64,
    link_table: &str,
    link_col: &str,
) -> Result<HashMap<i64, f64>> {
    let sql = format!(
        "SELECT o.item_id, SUM(o.weight) FROM {link_table} a
         JOIN {link_table} o ON a.{link_col} = o.{link_col}
         WHERE a.item_id = ?1 AND o.item_id != ?1
         GROUP BY o.item_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([anchor_id], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
    })?;

    let mut scores = HashMap::new();
    for row in rows {
        let (id, score) = row?;
        scores.insert(id, score);
    }
    Ok(scores)
}

/// Candidate ids sharing a tag or one of the anchor's top-3 concepts.
fn prefiltered_candidates(conn: &Connection, anchor_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT it2.item_id FROM item_tags it1
         JOIN item_tags it2 ON it1.tag_id = it2.tag_id
         WHERE it1.item_id = ?1 AND it2.item_id != ?1
         UNION
         SELECT DISTINCT ic2.item_id FROM item_concepts ic1
         JOIN item_concepts ic2 ON ic1.concept_id = ic2.concept_id
         WHERE ic1.item_id = ?1 AND ic2.item_id != ?1
           AND ic1.concept_id IN (
               SELECT concept_id FROM item_concepts
               WHERE item_id = ?1 ORDER BY weight DESC LIMIT 3
           )",
    )?;
    let ids = stmt
        .query_map([anchor_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Score candidates by inner product of dequantized embeddings.
///
/// Negative products are floored at zero so they never outrank a
/// missing overlap in hybrid fusion.
fn embedding_scores(
    conn: &Connection,
    anchor_id: i64,
    candidate_ceiling: usize,
) -> Result<HashMap<i64, f64>> {
    let Some(anchor_blob) = item_store::embedding_of(conn, anchor_id)? else {
        return Ok(HashMap::new());
    };
    let anchor = QuantizedEmbedding::from_blob(&anchor_blob)?.dequantize();

    let candidates = prefiltered_candidates(conn, anchor_id)?;
    let candidates: Vec<(i64, Vec<u8>)> = if candidates.is_empty() {
        // No overlap signal to narrow by: bounded full scan
        let mut stmt = conn.prepare(
            "SELECT id, embedding FROM items
             WHERE id != ?1 AND embedding IS NOT NULL
             ORDER BY updated_at DESC LIMIT ?2",
        )?;
        stmt.query_map(
            rusqlite::params![anchor_id, candidate_ceiling as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?
    } else {
        let mut rows = Vec::with_capacity(candidates.len());
        for id in candidates {
            if let Some(blob) = item_store::embedding_of(conn, id)? {
                rows.push((id, blob));
            }
        }
        rows
    };

    let mut scores = HashMap::new();
    for (id, blob) in candidates {
        let vector = QuantizedEmbedding::from_blob(&blob)?.dequantize();
        let score = f64::from(dot(&anchor, &vector)).max(0.0);
        if score > 0.0 {
            scores.insert(id, score);
        }
    }
    Ok(scores)
}

/// Normalize a score map by its maximum.
fn normalize(scores: &mut HashMap<i64, f64>) {
    let max = scores.values().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for score in scores.values_mut() {
            *score /= max;
        }
    }
}

/// Weighted linear combination of the per-strategy scores.
fn hybrid_scores(
    conn: &Connection,
    anchor_id: i64,
    weights: &HybridWeights,
    candidate_ceiling: usize,
) -> Result<HashMap<i64, f64>> {
    let mut combined: HashMap<i64, f64> = HashMap::new();

    let mut accumulate = |scores: &mut HashMap<i64, f64>, weight: f64| {
        normalize(scores);
        for (&id, &score) in scores.iter() {
            *combined.entry(id).or_default() += score * weight;
        }
    };

    if weights.keywords > 0.0 {
        let mut scores = shared_term_scores(conn, anchor_id, "item_keywords", "keyword_id")?;
        accumulate(&mut scores, weights.keywords);
    }
    if weights.concepts > 0.0 {
        let mut scores = shared_term_scores(conn, anchor_id, "item_concepts", "concept_id")?;
        accumulate(&mut scores, weights.concepts);
    }
    if weights.embedding > 0.0 {
        let mut scores = embedding_scores(conn, anchor_id, candidate_ceiling)?;
        accumulate(&mut scores, weights.embedding);
    }

    Ok(combined)
}
