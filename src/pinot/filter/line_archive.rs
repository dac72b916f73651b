//! A toy nested-container filter used by tests to exercise recursive
//! reduction without depending on a real archive library (spec §4.4: "emit
//! zero or more sub-documents (nested)"). Each line of the form
//! `name: content` becomes one `application/x-line-entry` sub-document,
//! which itself reduces to `text/plain` on the next recursion.

use std::path::PathBuf;

use crate::error::Result;
use crate::filter::{Filter, FilterInput, InputMode, SubDocument};

#[derive(Default)]
pub struct LineArchiveFilter {
    entries: Vec<(String, String)>,
    index: usize,
}

impl LineArchiveFilter {
    pub fn new() -> LineArchiveFilter {
        LineArchiveFilter::default()
    }
}

impl Filter for LineArchiveFilter {
    fn accepts(&self) -> InputMode {
        InputMode::BytesOnly
    }

    fn feed(&mut self, input: FilterInput) -> Result<()> {
        let bytes = match input {
            FilterInput::Bytes(b) => b,
            FilterInput::Path { path, .. } => std::fs::read(&path as &PathBuf)?,
        };
        let text = String::from_utf8_lossy(&bytes);
        self.entries = text
            .lines()
            .filter_map(|line| line.split_once(": "))
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect();
        self.index = 0;
        Ok(())
    }

    fn has_documents(&self) -> bool {
        self.index < self.entries.len()
    }

    fn next_document(&mut self) -> Option<SubDocument> {
        if self.index >= self.entries.len() {
            return None;
        }
        let (name, content) = self.entries[self.index].clone();
        self.index += 1;
        Some(SubDocument {
            title: Some(name.clone()),
            mimetype: "application/x-line-entry".to_string(),
            charset: "utf-8".to_string(),
            ipath: name,
            payload: content.into_bytes(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_one_entry_per_line() {
        let archive = b"first: hello world\nsecond: goodbye world\n";
        let mut filter = LineArchiveFilter::new();
        filter.feed(FilterInput::Bytes(archive.to_vec())).unwrap();

        let a = filter.next_document().unwrap();
        assert_eq!(a.ipath, "first");
        assert_eq!(a.payload, b"hello world");

        let b = filter.next_document().unwrap();
        assert_eq!(b.ipath, "second");
        assert!(filter.next_document().is_none());
    }
}
