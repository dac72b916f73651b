//! Posting list storage.
//!
//! Each term maps to a per-document posting: a (possibly empty) sorted list
//! of positions. An empty position list means the term is boolean
//! (position-less), used for prefixed common terms and labels (spec §4.5
//! step 6).

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// All occurrences of one term across the index.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct PostingList {
    /// doc id -> positions (empty for boolean terms).
    pub docs: AHashMap<u64, Vec<u32>>,
}

impl PostingList {
    pub fn new() -> PostingList {
        PostingList::default()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Adds a positional posting, keeping the position list sorted.
    pub fn add_position(&mut self, doc_id: u64, position: u32) {
        let positions = self.docs.entry(doc_id).or_default();
        if !positions.contains(&position) {
            positions.push(position);
            positions.sort_unstable();
        }
    }

    /// Adds a boolean (position-less) posting.
    pub fn add_boolean(&mut self, doc_id: u64) {
        self.docs.entry(doc_id).or_default();
    }

    /// Removes every posting for `doc_id`.
    pub fn remove_doc(&mut self, doc_id: u64) {
        self.docs.remove(&doc_id);
    }

    /// Document ids holding this term, sorted ascending.
    pub fn doc_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.docs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Term frequency of `doc_id` within this posting list.
    pub fn term_frequency(&self, doc_id: u64) -> usize {
        self.docs.get(&doc_id).map(|p| p.len().max(1)).unwrap_or(0)
    }
}

/// The in-memory term dictionary: term -> posting list.
pub type PostingStore = AHashMap<String, PostingList>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_stay_sorted_and_unique() {
        let mut list = PostingList::new();
        list.add_position(1, 5);
        list.add_position(1, 2);
        list.add_position(1, 5);
        assert_eq!(list.docs.get(&1).unwrap(), &vec![2, 5]);
    }

    #[test]
    fn remove_doc_clears_postings() {
        let mut list = PostingList::new();
        list.add_boolean(1);
        list.add_boolean(2);
        list.remove_doc(1);
        assert_eq!(list.doc_ids(), vec![2]);
    }
}
