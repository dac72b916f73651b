//! Relevance-feedback expansion (spec §4.6 "Relevance-feedback expansion").
//!
//! Given a set of document URLs the caller has marked relevant, resolves
//! each to its document id, pools the terms attached to those documents,
//! and returns the highest-weighted unprefixed terms as expansion
//! candidates.

use ahash::AHashMap;

use crate::index::Index;
use crate::term;
use crate::tokenizer::contains_cjkv;

/// At most this many expansion terms are returned (spec §4.6).
pub const MAX_SUGGESTIONS: usize = 10;

/// Terms shorter than this are dropped unless they contain a CJKV character
/// (spec §4.6: "short (<3 non-CJKV)").
const MIN_TERM_LEN: usize = 3;

/// All known non-body prefixes; a term under any of these is a structural
/// term (host, label, directory, ...), not a content word, and is excluded
/// from expansion.
const KNOWN_PREFIXES: &[&str] = &[
    term::PREFIX_RAW,
    term::PREFIX_TITLE,
    term::PREFIX_URL,
    term::PREFIX_HOST,
    term::PREFIX_FILE,
    term::PREFIX_LANGUAGE,
    term::PREFIX_TYPE,
    term::PREFIX_DIR,
    term::PREFIX_FILE_PATH,
    term::PREFIX_EXT,
    term::PREFIX_CLASS,
    term::PREFIX_LABEL,
];

/// Resolves `relevant_urls` to documents, pools their terms, and returns up
/// to `MAX_SUGGESTIONS` unprefixed content terms ranked by how many of the
/// relevant documents carry them (ties broken alphabetically for
/// determinism).
pub fn expand_feedback(index: &Index, relevant_urls: &[String]) -> Vec<String> {
    let doc_ids: Vec<u64> = relevant_urls
        .iter()
        .filter_map(|url| index.has_document(url))
        .collect();

    if doc_ids.is_empty() {
        return Vec::new();
    }

    let mut weights: AHashMap<String, usize> = AHashMap::new();
    for doc_id in &doc_ids {
        for t in index.terms_for(*doc_id) {
            if !is_content_term(&t) {
                continue;
            }
            *weights.entry(t).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(term, _)| term)
        .collect()
}

fn is_content_term(t: &str) -> bool {
    if t == term::MAGIC_TERM {
        return false;
    }
    if KNOWN_PREFIXES.iter().any(|p| t.starts_with(p)) {
        return false;
    }
    if t.len() < MIN_TERM_LEN && !contains_cjkv(t) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::document::Document;
    use crate::index::StemmingMode;
    use crate::config::PinotConfig;

    fn ctx() -> Context {
        Context::new(PinotConfig::default())
    }

    fn doc(location: &str, title: &str, body: &str) -> Document {
        let mut d = Document::new();
        d.info.location = location.to_string();
        d.info.title = title.to_string();
        d.info.mime_type = "text/plain".to_string();
        d.set_data(body.as_bytes().to_vec());
        d
    }

    #[test]
    fn expands_from_shared_terms_across_relevant_docs() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Unstem, ctx()).unwrap();

        index
            .index_document(&doc("file:///a.txt", "A", "astronomy telescope observatory"), &[])
            .unwrap();
        index
            .index_document(&doc("file:///b.txt", "B", "astronomy nebula observatory"), &[])
            .unwrap();
        index
            .index_document(&doc("file:///c.txt", "C", "cooking recipes dinner"), &[])
            .unwrap();

        let suggestions =
            expand_feedback(&index, &["file:///a.txt".to_string(), "file:///b.txt".to_string()]);

        assert!(suggestions.contains(&"astronomy".to_string()));
        assert!(suggestions.contains(&"observatory".to_string()));
        assert!(!suggestions.contains(&"cooking".to_string()));
    }

    #[test]
    fn unknown_urls_yield_no_suggestions() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::create(dir.path(), StemmingMode::Unstem, ctx()).unwrap();
        let suggestions = expand_feedback(&index, &["file:///missing.txt".to_string()]);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn short_non_cjkv_terms_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Unstem, ctx()).unwrap();
        index.index_document(&doc("file:///a.txt", "A", "an ox is in it"), &[]).unwrap();

        let suggestions = expand_feedback(&index, &["file:///a.txt".to_string()]);
        assert!(!suggestions.iter().any(|t| t.len() < MIN_TERM_LEN));
    }
}
