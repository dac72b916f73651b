//! Language detection and the per-language stemmer registry (spec §4.3).
//!
//! `guess_language` is a small in-house trigram frequency classifier (no
//! statistical language-ID crate appears anywhere in the retrieval pack, so
//! this follows the §9 redesign note: "enumerate a closed set ... behind a
//! capability interface"). `stem` wraps Snowball stemmers from
//! `rust-stemmers` and is a pure function of its inputs, used symmetrically
//! at index and query time (spec §4.3, §8 invariant 8).

use ahash::AHashMap;
use rust_stemmers::{Algorithm, Stemmer};

/// Number of leading bytes sampled for language detection and profile
/// training (spec §4.3 default).
pub const DEFAULT_SAMPLE_LEN: usize = 2048;

/// One trained language profile: relative trigram frequencies.
struct LanguageProfile {
    name: &'static str,
    trigrams: &'static [&'static str],
}

/// A small, fixed set of supported languages. Real deployments would plug a
/// proper statistical classifier in here; the closed set keeps the contract
/// (ordered candidate list, best first) testable without one.
const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        name: "english",
        trigrams: &[" th", "the", "he ", "ing", "and", " an", "ion", "tio", "ent", " of"],
    },
    LanguageProfile {
        name: "french",
        trigrams: &[" de", "les", "ion", "des", "ent", " le", "que", "tio", " la", "men"],
    },
    LanguageProfile {
        name: "german",
        trigrams: &["en ", "der", "die", "sch", "che", "ich", "und", " de", "gen", "ein"],
    },
    LanguageProfile {
        name: "spanish",
        trigrams: &[" de", "que", "ión", "los", "par", "ent", "ado", " la", "cion", "con"],
    },
];

/// Guesses the language of `sample`, returning candidates best-first. An
/// empty result means "unknown". Only the first `max_len` bytes are
/// considered, matching the index/query-time sampling contract.
pub fn guess_language(sample: &[u8], max_len: usize) -> Vec<String> {
    let len = sample.len().min(max_len);
    let text = String::from_utf8_lossy(&sample[..len]).to_lowercase();
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut scores: Vec<(f64, &'static str)> = PROFILES
        .iter()
        .map(|profile| {
            let score: usize = profile
                .trigrams
                .iter()
                .map(|tg| text.matches(tg).count())
                .sum();
            (score as f64, profile.name)
        })
        .collect();

    scores.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

    if scores.iter().all(|(score, _)| *score == 0.0) {
        return Vec::new();
    }

    scores.into_iter().map(|(_, name)| name.to_string()).collect()
}

/// Maps a language name to a `rust_stemmers::Algorithm`, if a stemmer exists
/// for it. Absence here means "no stemming is performed" for that language
/// (spec §4.3).
fn algorithm_for(language: &str) -> Option<Algorithm> {
    match language.to_lowercase().as_str() {
        "english" => Some(Algorithm::English),
        "french" => Some(Algorithm::French),
        "german" => Some(Algorithm::German),
        "spanish" => Some(Algorithm::Spanish),
        _ => None,
    }
}

/// Registry of lazily-created, cached Snowball stemmers, one per language.
pub struct StemmerRegistry {
    cache: AHashMap<String, Option<Stemmer>>,
}

impl StemmerRegistry {
    /// An empty registry; stemmers are created on first use.
    pub fn new() -> StemmerRegistry {
        StemmerRegistry { cache: AHashMap::new() }
    }

    /// Whether a stemmer is available for `language`.
    pub fn supports(&mut self, language: &str) -> bool {
        self.get(language).is_some()
    }

    fn get(&mut self, language: &str) -> Option<&Stemmer> {
        self.cache
            .entry(language.to_lowercase())
            .or_insert_with(|| algorithm_for(language).map(Stemmer::create))
            .as_ref()
    }

    /// Stems `word` in `language`. Returns the lowercased word unchanged if
    /// no stemmer is registered for the language. Pure function of its
    /// inputs (spec §4.3): given the same word and language it always
    /// returns the same stem.
    pub fn stem(&mut self, word: &str, language: &str) -> String {
        let lower = word.to_lowercase();
        match self.get(language) {
            Some(stemmer) => stemmer.stem(&lower).to_string(),
            None => lower,
        }
    }

    /// Picks the first language in `candidates` for which a stemmer exists.
    /// Returns an empty string (meaning "no stemming") if none match.
    pub fn select(&mut self, candidates: &[String]) -> String {
        for candidate in candidates {
            if self.supports(candidate) {
                return candidate.clone();
            }
        }
        String::new()
    }
}

impl Default for StemmerRegistry {
    fn default() -> StemmerRegistry {
        StemmerRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_english_for_english_text() {
        let candidates = guess_language(b"the quick brown fox jumped over the lazy dog", 2048);
        assert_eq!(candidates.first().map(|s| s.as_str()), Some("english"));
    }

    #[test]
    fn empty_sample_is_unknown() {
        assert!(guess_language(b"", 2048).is_empty());
    }

    #[test]
    fn stem_is_pure_and_symmetric() {
        let mut registry = StemmerRegistry::new();
        let a = registry.stem("consulting", "english");
        let b = registry.stem("consulting", "english");
        assert_eq!(a, b);
        assert_eq!(a, registry.stem("CONSULTING", "english"));
    }

    #[test]
    fn unknown_language_is_identity() {
        let mut registry = StemmerRegistry::new();
        assert_eq!(registry.stem("Running", "klingon"), "running");
        assert!(!registry.supports("klingon"));
    }

    #[test]
    fn select_picks_first_supported_candidate() {
        let mut registry = StemmerRegistry::new();
        let candidates = vec!["klingon".to_string(), "french".to_string()];
        assert_eq!(registry.select(&candidates), "french");
    }
}
