//! Query execution, ranking and the two-pass stemmed search strategy (spec
//! §4.6).

use ahash::{AHashMap, AHashSet};

use crate::error::{PinotError, Result};
use crate::index::posting::PostingList;
use crate::index::value_slots::{SLOT_DATE_TIME, SLOT_SIZE, SLOT_TIME};
use crate::index::Index;
use crate::language::StemmerRegistry;
use crate::term::{self, MAGIC_TERM};
use crate::tokenizer;

use super::parser::{self, QueryNode, RangeKind};

/// How results are ordered (spec §4.6 "Result ranking").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// BM25-style relevance score, descending.
    Relevance,
    /// Value slot 4 (full date+time), descending; relevance breaks ties.
    Date,
}

/// Caller-supplied search parameters.
pub struct SearchOptions {
    pub start: usize,
    pub count: usize,
    pub sort: SortOrder,
    /// Declared query language for the stemmed second pass, if known.
    pub language: Option<String>,
    /// An internal rewrite restricting results to a set of URLs (spec §4.6
    /// "Limit sets"), not exposed in the surface query language.
    pub limit_urls: Option<Vec<String>>,
}

impl Default for SearchOptions {
    fn default() -> SearchOptions {
        SearchOptions {
            start: 0,
            count: 10,
            sort: SortOrder::Relevance,
            language: None,
            limit_urls: None,
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub doc_id: u64,
    pub score: f64,
}

/// Outcome of a search, including whether spelling correction had to be
/// surfaced (spec §4.6: "only surfaced ... if no results were returned at
/// all").
#[derive(Debug)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub total_matches: usize,
    pub stemmed_pass_used: bool,
    pub corrected_query: Option<String>,
}

#[derive(Default)]
struct Evaluation {
    docs: AHashSet<u64>,
    scores: AHashMap<u64, f64>,
}

impl Evaluation {
    fn add(&mut self, doc_id: u64, score: f64) {
        self.docs.insert(doc_id);
        *self.scores.entry(doc_id).or_insert(0.0) += score;
    }

    fn universe(index: &Index) -> Evaluation {
        let mut eval = Evaluation::default();
        for doc_id in index.list_documents(Some(MAGIC_TERM), usize::MAX, 0) {
            eval.add(doc_id, 0.0);
        }
        eval
    }
}

fn idf(index: &Index, term: &str) -> f64 {
    let n = doc_frequency(index, MAGIC_TERM).max(1) as f64;
    let df = doc_frequency(index, term).max(1) as f64;
    (1.0 + (n / df)).ln()
}

fn doc_frequency(index: &Index, term: &str) -> usize {
    index.postings().get(term).map(|l| l.docs.len()).unwrap_or(0)
}

fn eval_term(index: &Index, prefix: &str, word: &str) -> Evaluation {
    let term_text = term::build_term(prefix, &word.to_lowercase());
    let mut eval = Evaluation::default();
    if let Some(list) = index.postings().get(&term_text) {
        let weight = idf(index, &term_text);
        for doc_id in list.docs.keys() {
            let tf = list.term_frequency(*doc_id) as f64;
            eval.add(*doc_id, weight * (tf / (tf + 1.2)));
        }
    }
    eval
}

fn eval_literal(index: &Index, prefix: &str, value: &str) -> Evaluation {
    let term_text = term::build_term(prefix, value);
    let mut eval = Evaluation::default();
    if let Some(list) = index.postings().get(&term_text) {
        let weight = idf(index, &term_text);
        for doc_id in list.docs.keys() {
            eval.add(*doc_id, weight);
        }
    }
    eval
}

fn eval_wildcard(index: &Index, prefix: &str, stem_prefix_word: &str) -> Evaluation {
    let candidate_prefix = format!("{prefix}{}", stem_prefix_word.to_lowercase());
    let mut eval = Evaluation::default();
    for matched in index.get_close_terms(&candidate_prefix, 64) {
        if let Some(list) = index.postings().get(&matched) {
            let weight = idf(index, &matched);
            for doc_id in list.docs.keys() {
                let tf = list.term_frequency(*doc_id) as f64;
                eval.add(*doc_id, weight * (tf / (tf + 1.2)));
            }
        }
    }
    eval
}

fn eval_phrase(index: &Index, prefix: &str, words: &[String]) -> Evaluation {
    let mut eval = Evaluation::default();
    if words.is_empty() {
        return eval;
    }
    let terms: Vec<String> = words.iter().map(|w| term::build_term(prefix, &w.to_lowercase())).collect();
    let lists: Vec<&PostingList> = terms.iter().filter_map(|t| index.postings().get(t)).collect();
    if lists.len() != terms.len() {
        return eval;
    }
    let base_weight: f64 = terms.iter().map(|t| idf(index, t)).sum();

    'doc: for (doc_id, first_positions) in &lists[0].docs {
        for start in first_positions {
            let mut ok = true;
            for (offset, list) in lists.iter().enumerate().skip(1) {
                let Some(positions) = list.docs.get(doc_id) else {
                    ok = false;
                    break;
                };
                if !positions.contains(&(start + offset as u32)) {
                    ok = false;
                    break;
                }
            }
            if ok {
                eval.add(*doc_id, base_weight * 1.5);
                continue 'doc;
            }
        }
    }
    eval
}

fn eval_range(index: &Index, kind: RangeKind, min: i64, max: i64) -> Evaluation {
    let slot = match kind {
        RangeKind::Date => crate::index::value_slots::SLOT_DATE,
        RangeKind::Size => SLOT_SIZE,
        RangeKind::Time => SLOT_TIME,
    };
    let mut eval = Evaluation::default();
    for doc_id in index.list_documents(Some(MAGIC_TERM), usize::MAX, 0) {
        if let Some(slots) = index.value_slots(doc_id) {
            if slots[slot] >= min && slots[slot] <= max {
                eval.add(doc_id, 0.0);
            }
        }
    }
    eval
}

fn intersect(a: Evaluation, b: Evaluation) -> Evaluation {
    let mut eval = Evaluation::default();
    for doc_id in a.docs.intersection(&b.docs) {
        let score = a.scores.get(doc_id).copied().unwrap_or(0.0) + b.scores.get(doc_id).copied().unwrap_or(0.0);
        eval.add(*doc_id, score);
    }
    eval
}

fn union(a: Evaluation, b: Evaluation) -> Evaluation {
    let mut eval = a;
    for doc_id in b.docs {
        eval.add(doc_id, b.scores.get(&doc_id).copied().unwrap_or(0.0));
    }
    eval
}

fn difference(a: Evaluation, b: Evaluation) -> Evaluation {
    let mut eval = Evaluation::default();
    for doc_id in a.docs.difference(&b.docs) {
        eval.add(*doc_id, a.scores.get(doc_id).copied().unwrap_or(0.0));
    }
    eval
}

/// Recursively evaluates `node` against `index`. `prefix` is the current
/// field context (empty string = body, set by a wrapping [`QueryNode::Field`]).
/// `stem` selects the first (literal) or second (stemmed) pass; `language`
/// is the declared/guessed language used by the stemmed pass.
fn eval(
    node: &QueryNode,
    index: &Index,
    prefix: &str,
    stem: bool,
    language: &str,
    stemmers: &mut StemmerRegistry,
) -> Evaluation {
    match node {
        QueryNode::Term(word) => {
            if stem {
                let stemmed = stemmers.stem(word, language);
                eval_term(index, prefix, &stemmed)
            } else {
                eval_term(index, prefix, word)
            }
        }
        QueryNode::Literal(value) => eval_literal(index, prefix, value),
        QueryNode::Phrase(words) => {
            if stem {
                let stemmed: Vec<String> = words.iter().map(|w| stemmers.stem(w, language)).collect();
                eval_phrase(index, prefix, &stemmed)
            } else {
                eval_phrase(index, prefix, words)
            }
        }
        QueryNode::Wildcard(word) => eval_wildcard(index, prefix, word),
        QueryNode::Range(kind, min, max) => eval_range(index, *kind, *min, *max),
        QueryNode::Field(field, inner) => eval(inner, index, field.prefix(), stem, language, stemmers),
        QueryNode::And(children) => children
            .iter()
            .map(|c| eval(c, index, prefix, stem, language, stemmers))
            .reduce(intersect)
            .unwrap_or_default(),
        QueryNode::Or(children) => children
            .iter()
            .map(|c| eval(c, index, prefix, stem, language, stemmers))
            .reduce(union)
            .unwrap_or_default(),
        QueryNode::Not(child) => {
            let excluded = eval(child, index, prefix, stem, language, stemmers);
            difference(Evaluation::universe(index), excluded)
        }
    }
}

fn run_pass(
    ast: &QueryNode,
    index: &Index,
    stem: bool,
    language: &str,
    stemmers: &mut StemmerRegistry,
    limit_urls: Option<&[String]>,
) -> Evaluation {
    let mut evaluation = eval(ast, index, term::PREFIX_BODY, stem, language, stemmers);
    if let Some(urls) = limit_urls {
        let mut allowed = Evaluation::default();
        for url in urls {
            if let Some(doc_id) = index.has_document(url) {
                allowed.add(doc_id, 0.0);
            }
        }
        evaluation = intersect(evaluation, allowed);
    }
    evaluation
}

fn rank(evaluation: Evaluation, index: &Index, sort: SortOrder, start: usize, count: usize) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = evaluation
        .docs
        .iter()
        .map(|doc_id| SearchResult {
            doc_id: *doc_id,
            score: evaluation.scores.get(doc_id).copied().unwrap_or(0.0),
        })
        .collect();

    match sort {
        SortOrder::Relevance => {
            results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        }
        SortOrder::Date => {
            results.sort_by(|a, b| {
                let da = index.value_slots(a.doc_id).map(|s| s[SLOT_DATE_TIME]).unwrap_or(0);
                let db = index.value_slots(b.doc_id).map(|s| s[SLOT_DATE_TIME]).unwrap_or(0);
                db.cmp(&da).then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            });
        }
    }

    results.into_iter().skip(start).take(count).collect()
}

/// Executes a query string against `index` per spec §4.6's two-pass
/// strategy: an unstemmed pass first, falling back to a stemmed pass in the
/// query's declared (or CJKV-exempted) language only if the first pass
/// returns nothing.
pub fn search(index: &Index, query_text: &str, options: &SearchOptions) -> Result<SearchOutcome> {
    let ast = parser::parse(query_text)?;
    let mut stemmers = StemmerRegistry::new();
    let language = options.language.as_deref().unwrap_or("");
    let pure_cjkv = tokenizer::is_pure_cjkv(query_text);

    let limit_urls = options.limit_urls.as_deref();

    let first_pass = run_pass(&ast, index, false, language, &mut stemmers, limit_urls);
    if !first_pass.docs.is_empty() {
        let total = first_pass.docs.len();
        return Ok(SearchOutcome {
            results: rank(first_pass, index, options.sort, options.start, options.count),
            total_matches: total,
            stemmed_pass_used: false,
            corrected_query: None,
        });
    }

    if pure_cjkv || language.is_empty() {
        return Ok(SearchOutcome {
            results: Vec::new(),
            total_matches: 0,
            stemmed_pass_used: false,
            corrected_query: suggest_correction(index, &ast),
        });
    }

    let second_pass = run_pass(&ast, index, true, language, &mut stemmers, limit_urls);
    let total = second_pass.docs.len();
    Ok(SearchOutcome {
        results: rank(second_pass, index, options.sort, options.start, options.count),
        total_matches: total,
        stemmed_pass_used: true,
        corrected_query: if total == 0 { suggest_correction(index, &ast) } else { None },
    })
}

fn suggest_correction(index: &Index, ast: &QueryNode) -> Option<String> {
    let words = collect_terms(ast);
    let mut corrected = Vec::new();
    let mut changed = false;
    for word in words {
        match index.spelling().suggest(&word, 2) {
            Some(suggestion) => {
                changed = true;
                corrected.push(suggestion);
            }
            None => corrected.push(word),
        }
    }
    if changed {
        Some(corrected.join(" "))
    } else {
        None
    }
}

fn collect_terms(node: &QueryNode) -> Vec<String> {
    match node {
        QueryNode::Term(word) => vec![word.clone()],
        QueryNode::Phrase(words) => words.clone(),
        QueryNode::Wildcard(prefix) => vec![prefix.clone()],
        QueryNode::Literal(_) | QueryNode::Range(..) => Vec::new(),
        QueryNode::Field(_, inner) => collect_terms(inner),
        QueryNode::And(children) | QueryNode::Or(children) => children.iter().flat_map(collect_terms).collect(),
        QueryNode::Not(child) => collect_terms(child),
    }
}

/// Used by callers who construct a query string programmatically (e.g. the
/// CLI's `--xesamql`/`--xesamul` flags); surfaces parse errors explicitly
/// rather than silently matching nothing.
pub fn validate(query_text: &str) -> Result<()> {
    parser::parse(query_text).map(|_| ()).map_err(|e| match e {
        PinotError::QuerySyntax(reason) => PinotError::QuerySyntax(reason),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PinotConfig;
    use crate::context::Context;
    use crate::document::{Document, DocumentInfo};
    use crate::index::StemmingMode;

    fn ctx() -> Context {
        Context::new(PinotConfig::default())
    }

    fn doc(location: &str, title: &str, body: &str) -> Document {
        let mut info = DocumentInfo::new();
        info.location = location.to_string();
        info.title = title.to_string();
        info.mime_type = "text/plain".to_string();
        info.timestamp = 1_700_000_000;
        let mut d = Document::from_info(info);
        d.set_data(body.as_bytes().to_vec());
        d
    }

    #[test]
    fn finds_exact_term_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();
        let id = index.index_document(&doc("file:///a.txt", "", "the quick brown fox"), &[]).unwrap();

        let outcome = search(&index, "quick", &SearchOptions::default()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, id);
        assert!(!outcome.stemmed_pass_used);
    }

    #[test]
    fn boolean_and_excludes_non_matching_docs() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();
        index.index_document(&doc("file:///a.txt", "", "quick brown fox"), &[]).unwrap();
        let id_b = index.index_document(&doc("file:///b.txt", "", "quick brown fox lazy dog"), &[]).unwrap();

        let outcome = search(&index, "quick AND lazy", &SearchOptions::default()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, id_b);
    }

    #[test]
    fn phrase_requires_adjacency() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();
        let id = index.index_document(&doc("file:///a.txt", "", "the quick brown fox"), &[]).unwrap();
        index.index_document(&doc("file:///b.txt", "", "brown and quick things"), &[]).unwrap();

        let outcome = search(&index, "\"quick brown\"", &SearchOptions::default()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, id);
    }

    #[test]
    fn not_excludes_matching_docs() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();
        let id_a = index.index_document(&doc("file:///a.txt", "", "quick brown fox"), &[]).unwrap();
        index.index_document(&doc("file:///b.txt", "", "quick silver lining"), &[]).unwrap();

        let outcome = search(&index, "quick NOT silver", &SearchOptions::default()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, id_a);
    }

    #[test]
    fn field_filter_restricts_to_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();
        let id = index
            .index_document(&doc("http://example.com/a.txt", "", "hello world"), &[])
            .unwrap();
        index.index_document(&doc("http://other.org/a.txt", "", "hello world"), &[]).unwrap();

        let outcome = search(&index, "hello AND site:example.com", &SearchOptions::default()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, id);
    }

    #[test]
    fn stemmed_pass_falls_back_when_literal_pass_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();
        let mut info = DocumentInfo::new();
        info.location = "file:///a.txt".to_string();
        info.mime_type = "text/plain".to_string();
        info.language = "english".to_string();
        let mut d = Document::from_info(info);
        d.set_data(b"the consultants are consulting".to_vec());
        let id = index.index_document(&d, &[]).unwrap();

        let options = SearchOptions {
            language: Some("english".to_string()),
            ..SearchOptions::default()
        };
        let outcome = search(&index, "consultant", &options).unwrap();
        assert!(outcome.stemmed_pass_used);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, id);
    }

    #[test]
    fn date_range_filters_by_value_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();
        let mut old = doc("file:///old.txt", "", "quick brown fox");
        old.info.timestamp = 0;
        let mut recent = doc("file:///new.txt", "", "quick brown fox");
        recent.info.timestamp = 1_700_000_000;
        index.index_document(&old, &[]).unwrap();
        let id_new = index.index_document(&recent, &[]).unwrap();

        let outcome = search(&index, "quick AND date:20200101..20300101", &SearchOptions::default()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, id_new);
    }
}
