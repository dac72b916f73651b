//! The identity filter: a document that is already `text/plain` simply
//! yields itself as the single reduction. Every other filter shipped here,
//! and every external filter described by the `Filter` trait, bottoms out at
//! this case once nesting is exhausted (spec §4.4).

use std::path::PathBuf;

use crate::error::Result;
use crate::filter::{Filter, FilterInput, InputMode, SubDocument};

/// Passes its input through unchanged, declared as `text/plain`.
#[derive(Default)]
pub struct PlainTextFilter {
    payload: Option<Vec<u8>>,
    yielded: bool,
}

impl PlainTextFilter {
    pub fn new() -> PlainTextFilter {
        PlainTextFilter::default()
    }
}

impl Filter for PlainTextFilter {
    fn accepts(&self) -> InputMode {
        InputMode::Either
    }

    fn feed(&mut self, input: FilterInput) -> Result<()> {
        let bytes = match input {
            FilterInput::Bytes(b) => b,
            FilterInput::Path { path, .. } => std::fs::read(&path as &PathBuf)?,
        };
        self.payload = Some(bytes);
        Ok(())
    }

    fn has_documents(&self) -> bool {
        !self.yielded && self.payload.is_some()
    }

    fn next_document(&mut self) -> Option<SubDocument> {
        if self.yielded {
            return None;
        }
        self.yielded = true;
        let payload = self.payload.take()?;
        Some(SubDocument {
            mimetype: "text/plain".to_string(),
            charset: "utf-8".to_string(),
            payload,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_exactly_one_document() {
        let mut filter = PlainTextFilter::new();
        filter.feed(FilterInput::Bytes(b"hello".to_vec())).unwrap();
        assert!(filter.has_documents());
        let sub = filter.next_document().unwrap();
        assert_eq!(sub.payload, b"hello");
        assert_eq!(sub.mimetype, "text/plain");
        assert!(!filter.has_documents());
        assert!(filter.next_document().is_none());
    }
}
