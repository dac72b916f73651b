//! Spelling-correction frequency dictionary (spec §4.5, §4.6).
//!
//! Every added term increments a frequency counter; every removed term
//! decrements it. If the backend cannot support the feature it is turned
//! off permanently on first failure — modeled here as a `enabled` flag that
//! never flips back to `true`.

use ahash::AHashMap;

/// A minimal, self-contained frequency dictionary with edit-distance
/// suggestion, standing in for a dedicated symspell-style crate (no such
/// dependency appears anywhere in the retrieval pack for this spec).
#[derive(Default)]
pub struct SpellingDict {
    frequencies: AHashMap<String, u64>,
    enabled: bool,
}

impl SpellingDict {
    pub fn new() -> SpellingDict {
        SpellingDict {
            frequencies: AHashMap::new(),
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Permanently disables the dictionary, e.g. after a backend failure.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.frequencies.clear();
    }

    pub fn increment(&mut self, term: &str) {
        if !self.enabled {
            return;
        }
        *self.frequencies.entry(term.to_string()).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, term: &str) {
        if !self.enabled {
            return;
        }
        if let Some(count) = self.frequencies.get_mut(term) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.frequencies.remove(term);
            }
        }
    }

    /// Suggests the closest known term to `word` by edit distance, if one is
    /// within `max_distance`. Returns `None` when disabled.
    pub fn suggest(&self, word: &str, max_distance: usize) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.frequencies
            .keys()
            .map(|candidate| (levenshtein(word, candidate), candidate))
            .filter(|(dist, _)| *dist <= max_distance && *dist > 0)
            .min_by_key(|(dist, _)| *dist)
            .map(|(_, term)| term.clone())
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let temp = row[j + 1];
            row[j + 1] = if ca == cb {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j + 1])
            };
            prev_diag = temp;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_closest_known_term() {
        let mut dict = SpellingDict::new();
        dict.increment("hello");
        dict.increment("world");
        assert_eq!(dict.suggest("helo", 2).as_deref(), Some("hello"));
    }

    #[test]
    fn disabled_dictionary_never_suggests() {
        let mut dict = SpellingDict::new();
        dict.increment("hello");
        dict.disable();
        assert_eq!(dict.suggest("helo", 2), None);
        assert!(!dict.is_enabled());
    }

    #[test]
    fn decrement_removes_exhausted_terms() {
        let mut dict = SpellingDict::new();
        dict.increment("hello");
        dict.decrement("hello");
        assert_eq!(dict.suggest("hello", 0), None);
    }
}
