//! Abstract / snippet generation (spec §4.6 "Abstract generation").
//!
//! An abstract is produced by re-tokenizing a document's current body text
//! against the terms that matched a query, picking the window of text that
//! best concentrates those matches, and marking the matching words for
//! highlighting. Nothing here is persisted: the index stores postings, not
//! text, so abstracts are always built from a freshly supplied body.

use ahash::AHashSet;

use crate::language::StemmerRegistry;
use crate::tokenizer::{self, Token};

/// Half-width, in words, of the snippet window centered on a seed term
/// occurrence (spec §4.6).
pub const WINDOW_RADIUS: usize = 50;

/// At most this many of the highest-weighted matched terms are used as seeds
/// when scanning for the best window (spec §4.6).
pub const MAX_SEEDS: usize = 8;

/// One word of a generated abstract, with its highlight state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractWord {
    pub text: String,
    pub highlighted: bool,
}

/// A generated abstract: a contiguous run of words from the source document,
/// with matched terms marked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Abstract {
    pub words: Vec<AbstractWord>,
}

impl Abstract {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Joins the words back into plain text, no markup.
    pub fn plain_text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Joins the words back into text, wrapping highlighted words in `open`
    /// and `close` (e.g. terminal color codes or `<b>`/`</b>`).
    pub fn highlighted_text(&self, open: &str, close: &str) -> String {
        self.words
            .iter()
            .map(|w| {
                if w.highlighted {
                    format!("{open}{}{close}", w.text)
                } else {
                    w.text.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds an abstract of `body` around the terms in `seed_terms` (already
/// lowercased query terms; stemming is applied with `language` if a stemmer
/// is registered for it, matching what happened at search time). Returns an
/// empty `Abstract` if `body` is empty or none of the seed terms occur in it.
pub fn build(
    body: &str,
    seed_terms: &[String],
    language: &str,
    stemmers: &mut StemmerRegistry,
) -> Abstract {
    let tokens = tokenizer::tokenize(body);
    if tokens.is_empty() || seed_terms.is_empty() {
        return Abstract::default();
    }

    let seeds: AHashSet<String> = seed_terms
        .iter()
        .take(MAX_SEEDS)
        .map(|t| stemmers.stem(t, language))
        .collect();

    let stems: Vec<String> = tokens
        .iter()
        .map(|t| stemmers.stem(&t.text, language))
        .collect();

    let hit_positions: Vec<usize> = stems
        .iter()
        .enumerate()
        .filter(|(_, stem)| seeds.contains(*stem))
        .map(|(i, _)| i)
        .collect();

    if hit_positions.is_empty() {
        return Abstract::default();
    }

    let best_center = best_window_center(&hit_positions, &stems, &seeds);
    let start = best_center.saturating_sub(WINDOW_RADIUS);
    let end = (best_center + WINDOW_RADIUS + 1).min(tokens.len());

    Abstract {
        words: tokens[start..end]
            .iter()
            .zip(&stems[start..end])
            .map(|(tok, stem)| word_for(tok, stem, &seeds))
            .collect(),
    }
}

/// Picks the hit position whose `±WINDOW_RADIUS` window contains the most
/// distinct seed occurrences (spec §4.6: "score windows by the count of
/// other seed terms they contain").
fn best_window_center(
    hit_positions: &[usize],
    stems: &[String],
    seeds: &AHashSet<String>,
) -> usize {
    let mut best_pos = hit_positions[0];
    let mut best_score = -1i64;

    for &pos in hit_positions {
        let lo = pos.saturating_sub(WINDOW_RADIUS);
        let hi = (pos + WINDOW_RADIUS + 1).min(stems.len());
        let score = stems[lo..hi].iter().filter(|s| seeds.contains(*s)).count() as i64;
        if score > best_score {
            best_score = score;
            best_pos = pos;
        }
    }

    best_pos
}

fn word_for(token: &Token, stem: &str, seeds: &AHashSet<String>) -> AbstractWord {
    AbstractWord {
        text: token.text.clone(),
        highlighted: seeds.contains(stem),
    }
}
