use std::collections::HashMap;

/// One suggestion candidate, with the vocabulary frequency used to break
/// ties among equally good prefix matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub text: String,
    pub frequency: usize,
}

/// Ranks `vocabulary` (tag occurrences and memory titles, each with a
/// frequency count) by prefix match against `partial`, then by
/// frequency descending, returning at most `limit` suggestions.
/// Case-insensitive; an empty `partial` matches everything.
pub fn suggest(partial: &str, vocabulary: &HashMap<String, usize>, limit: usize) -> Vec<Suggestion> {
    let needle = partial.to_lowercase();

    let mut matches: Vec<Suggestion> = vocabulary
        .iter()
        .filter(|(text, _)| needle.is_empty() || text.to_lowercase().starts_with(&needle))
        .map(|(text, frequency)| Suggestion {
            text: text.clone(),
            frequency: *frequency,
        })
        .collect();

    matches.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| a.text.cmp(&b.text))
    });
    matches.truncate(limit);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_prefix_case_insensitively() {
        let mut vocab = HashMap::new();
        vocab.insert("auth".to_string(), 3);
        vocab.insert("authentication".to_string(), 1);
        vocab.insert("billing".to_string(), 5);

        let results = suggest("Aut", &vocab, 10);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|s| s.text.starts_with("auth")));
    }

    #[test]
    fn ranks_by_frequency_then_alphabetically() {
        let mut vocab = HashMap::new();
        vocab.insert("auth".to_string(), 1);
        vocab.insert("authorization".to_string(), 5);

        let results = suggest("auth", &vocab, 10);
        assert_eq!(results[0].text, "authorization");
    }

    #[test]
    fn truncates_to_limit() {
        let mut vocab = HashMap::new();
        for i in 0..10 {
            vocab.insert(format!("tag{i}"), i);
        }
        let results = suggest("", &vocab, 3);
        assert_eq!(results.len(), 3);
    }
}
