//! Ranking & Facets: pure functions over a post-filtered
//! candidate list. No I/O, deterministic ordering, unit-tested directly
//! in the style of a scoring module.

mod facets;
mod scoring;
mod suggest;

pub use facets::{compute_facets, Facets, TimeBucket};
pub use scoring::{rank_candidates, relevance_score, Candidate, RelevanceWeights};
pub use suggest::{suggest, Suggestion};
