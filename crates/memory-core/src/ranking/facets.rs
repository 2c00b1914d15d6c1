use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};

use super::scoring::Candidate;

/// A time-period bucket a result falls into relative to "now", used for
/// the day/week/month facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeBucket {
    Today,
    ThisWeek,
    ThisMonth,
    Older,
}

impl TimeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::ThisWeek => "this_week",
            Self::ThisMonth => "this_month",
            Self::Older => "older",
        }
    }

    fn classify(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let age = now - created_at;
        if created_at.date_naive() == now.date_naive() {
            Self::Today
        } else if age.num_days() < 7 {
            Self::ThisWeek
        } else if age.num_days() < 30 {
            Self::ThisMonth
        } else {
            Self::Older
        }
    }
}

/// Counts grouped by type, tag, project, session, and time-period bucket,
/// computed over the post-filtered, untruncated result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    pub by_type: HashMap<String, usize>,
    pub by_tag: HashMap<String, usize>,
    pub by_project: HashMap<String, usize>,
    pub by_session: HashMap<String, usize>,
    pub by_time_bucket: HashMap<String, usize>,
}

pub fn compute_facets(candidates: &[Candidate], now: DateTime<Utc>) -> Facets {
    let mut facets = Facets::default();

    for candidate in candidates {
        let memory = &candidate.memory;
        *facets
            .by_type
            .entry(memory.memory_type.as_str().to_string())
            .or_insert(0) += 1;
        *facets
            .by_project
            .entry(memory.project_id.clone())
            .or_insert(0) += 1;
        if let Some(session_id) = &memory.session_id {
            *facets.by_session.entry(session_id.clone()).or_insert(0) += 1;
        }
        for tag in &memory.tags {
            *facets.by_tag.entry(tag.clone()).or_insert(0) += 1;
        }
        let bucket = TimeBucket::classify(memory.created_at, now);
        *facets
            .by_time_bucket
            .entry(bucket.as_str().to_string())
            .or_insert(0) += 1;
    }

    facets
}
