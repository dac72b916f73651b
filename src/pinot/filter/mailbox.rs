//! A minimal mailbox container filter, standing in for the gmime-backed
//! mbox parser the real system uses (spec §1 explicitly keeps mbox parsing
//! specifics out of scope; this exists so the nested-document pipeline and
//! its reindex invariant, spec §8 invariant 10, are exercisable end to end).
//!
//! Splits a `From `-delimited mailbox stream into one `message/rfc822`
//! sub-document per message, each with an `ipath` of `msgN`.

use std::path::PathBuf;

use crate::error::Result;
use crate::filter::{Filter, FilterInput, InputMode, SubDocument};

/// Splits an mbox-style byte stream on lines starting with `"From "`.
#[derive(Default)]
pub struct MailboxFilter {
    messages: Vec<Vec<u8>>,
    index: usize,
}

impl MailboxFilter {
    pub fn new() -> MailboxFilter {
        MailboxFilter::default()
    }

    fn split(data: &[u8]) -> Vec<Vec<u8>> {
        let text = String::from_utf8_lossy(data);
        let mut messages = Vec::new();
        let mut current = String::new();
        for line in text.split_inclusive('\n') {
            if line.starts_with("From ") && !current.is_empty() {
                messages.push(std::mem::take(&mut current).into_bytes());
            }
            current.push_str(line);
        }
        if !current.trim().is_empty() {
            messages.push(current.into_bytes());
        }
        messages
    }
}

impl Filter for MailboxFilter {
    fn accepts(&self) -> InputMode {
        InputMode::Either
    }

    fn feed(&mut self, input: FilterInput) -> Result<()> {
        let bytes = match input {
            FilterInput::Bytes(b) => b,
            FilterInput::Path { path, .. } => std::fs::read(&path as &PathBuf)?,
        };
        self.messages = Self::split(&bytes);
        self.index = 0;
        Ok(())
    }

    fn has_documents(&self) -> bool {
        self.index < self.messages.len()
    }

    fn next_document(&mut self) -> Option<SubDocument> {
        if self.index >= self.messages.len() {
            return None;
        }
        let raw = &self.messages[self.index];
        let text = String::from_utf8_lossy(raw);
        let subject = text
            .lines()
            .find_map(|l| l.strip_prefix("Subject: "))
            .map(|s| s.to_string());
        let body_start = text.find("\n\n").map(|p| p + 2).unwrap_or(0);

        let sub = SubDocument {
            title: subject,
            mimetype: "message/rfc822".to_string(),
            charset: "utf-8".to_string(),
            ipath: format!("msg{}", self.index),
            payload: text[body_start..].as_bytes().to_vec(),
            ..Default::default()
        };
        self.index += 1;
        Some(sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_two_messages() {
        let mbox = b"From a@x Mon Jan 1\nSubject: one\n\nbody one\nFrom b@x Tue Jan 2\nSubject: two\n\nbody two\n";
        let mut filter = MailboxFilter::new();
        filter.feed(FilterInput::Bytes(mbox.to_vec())).unwrap();

        let first = filter.next_document().unwrap();
        assert_eq!(first.title.as_deref(), Some("one"));
        assert_eq!(first.ipath, "msg0");

        let second = filter.next_document().unwrap();
        assert_eq!(second.title.as_deref(), Some("two"));
        assert_eq!(second.ipath, "msg1");

        assert!(filter.next_document().is_none());
    }
}
