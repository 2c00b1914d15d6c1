//! Tag set normalization: a set, no duplicates, order insignificant,
//! case-sensitive comparisons.

/// Deduplicates a tag list while preserving first-seen order, so that the
/// persisted tag list is stable and comparisons downstream are simple
/// equality/subset checks rather than set algebra on every read.
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    out
}

/// Serializes a tag list the way the vector index's metadata hand-off
/// requires: sequence-typed values comma-joined.
pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

/// Reverses [`join_tags`], for metadata read back from the vector index.
pub fn split_tags(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(',').map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupes_preserving_order() {
        let tags = normalize_tags(["b".into(), "a".into(), "b".into(), " a ".into()]);
        assert_eq!(tags, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn drops_empty_tags() {
        let tags = normalize_tags(["".into(), "  ".into(), "x".into()]);
        assert_eq!(tags, vec!["x".to_string()]);
    }

    #[test]
    fn join_and_split_round_trip() {
        let tags = vec!["auth".to_string(), "security".to_string()];
        let joined = join_tags(&tags);
        assert_eq!(joined, "auth,security");
        assert_eq!(split_tags(&joined), tags);
    }

    #[test]
    fn split_empty_string_is_empty_vec() {
        assert!(split_tags("").is_empty());
    }
}
