use chrono::{DateTime, Utc};

use crate::config::RankingWeights;
use crate::domain::Memory;

/// A hydrated search result: the relational row plus its similarity to
/// the query vector.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub memory: Memory,
    pub similarity: f32,
}

/// Sorts candidates by descending similarity; ties broken by `createdAt`
/// desc, then by `id` asc for determinism.
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    candidates
}

/// Weights of the blended relevance score (re-exported for callers that
/// only need the ranking module, mirrors [`crate::config::RankingWeights`]).
pub type RelevanceWeights = RankingWeights;

/// The blended relevance score:
/// `relevance = w.similarity*similarity + w.recency*recencyBoost
///            + w.tag_overlap*tagOverlap + w.title_match*titleMatch`
/// with `recencyBoost = exp(-ageDays/30)`.
pub fn relevance_score(
    candidate: &Candidate,
    query: &str,
    query_tags: &[String],
    now: DateTime<Utc>,
    weights: &RelevanceWeights,
) -> f64 {
    let age_days = (now - candidate.memory.created_at).num_seconds() as f64 / 86_400.0;
    let recency_boost = (-age_days.max(0.0) / 30.0).exp();

    let tag_overlap = if query_tags.is_empty() {
        0.0
    } else {
        let item_tags: std::collections::HashSet<&String> = candidate.memory.tags.iter().collect();
        let overlap = query_tags.iter().filter(|t| item_tags.contains(t)).count();
        overlap as f64 / query_tags.len() as f64
    };

    let title_match = if query.trim().is_empty() {
        0.0
    } else if candidate
        .memory
        .title
        .to_lowercase()
        .contains(&query.to_lowercase())
    {
        1.0
    } else {
        0.0
    };

    weights.similarity * candidate.similarity as f64
        + weights.recency * recency_boost
        + weights.tag_overlap * tag_overlap
        + weights.title_match * title_match
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemoryType;

    fn candidate(id: &str, similarity: f32, created_at: DateTime<Utc>) -> Candidate {
        Candidate {
            memory: Memory {
                id: id.to_string(),
                project_id: "p1".into(),
                session_id: None,
                memory_type: MemoryType::Decision,
                title: "Use JWT".into(),
                content: "Adopt JWT for auth".into(),
                context: "".into(),
                tags: vec!["auth".into()],
                has_embedding: true,
                archived_at: None,
                created_at,
                updated_at: created_at,
            },
            similarity,
        }
    }

    #[test]
    fn sorts_by_similarity_descending() {
        let now = Utc::now();
        let ranked = rank_candidates(vec![
            candidate("low", 0.2, now),
            candidate("high", 0.9, now),
        ]);
        assert_eq!(ranked[0].memory.id, "high");
    }

    #[test]
    fn ties_broken_by_created_at_desc_then_id_asc() {
        let now = Utc::now();
        let older = now - chrono::Duration::days(1);
        let ranked = rank_candidates(vec![
            candidate("b", 0.5, older),
            candidate("a", 0.5, now),
            candidate("c", 0.5, now),
        ]);
        assert_eq!(ranked[0].memory.id, "a");
        assert_eq!(ranked[1].memory.id, "c");
        assert_eq!(ranked[2].memory.id, "b");
    }

    #[test]
    fn relevance_score_weighs_title_match_and_tag_overlap() {
        let now = Utc::now();
        let candidate = candidate("a", 0.5, now);
        let weights = RelevanceWeights::default();

        let matching = relevance_score(&candidate, "Use JWT", &["auth".to_string()], now, &weights);
        let not_matching = relevance_score(&candidate, "unrelated", &[], now, &weights);

        assert!(matching > not_matching);
    }

    #[test]
    fn recency_boost_decays_with_age() {
        let now = Utc::now();
        let fresh = candidate("fresh", 0.0, now);
        let stale = candidate("stale", 0.0, now - chrono::Duration::days(60));
        let weights = RelevanceWeights {
            similarity: 0.0,
            recency: 1.0,
            tag_overlap: 0.0,
            title_match: 0.0,
        };

        let fresh_score = relevance_score(&fresh, "", &[], now, &weights);
        let stale_score = relevance_score(&stale, "", &[], now, &weights);
        assert!(fresh_score > stale_score);
    }
}
