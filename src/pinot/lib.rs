//! # `pinot`
//! Pinot is a personal desktop search engine: a crawler, a filter pipeline that
//! reduces arbitrary file formats to plain text, a writable inverted index, and
//! a query engine with boolean/phrase/field/range syntax, ranking, abstracts
//! and relevance feedback.
//!
//! ### index and search a directory
//! ```no_run
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//! use pinot::config::PinotConfig;
//! use pinot::context::Context;
//! use pinot::history::History;
//! use pinot::index::{Index, StemmingMode};
//! use pinot::scanner::{ScanMode, ScanRequest, Scanner};
//!
//! let config = PinotConfig::default();
//! let context = Context::new(config.clone());
//! let mut index = Index::create(&config.index_dir(), StemmingMode::Unstem, context).unwrap();
//! let history = History::open(&config.history_path()).unwrap();
//! let cancel = AtomicBool::new(false);
//! let scanner = Scanner::new(&history, &config.blacklist_patterns, &cancel);
//! let request = ScanRequest {
//!     root: Path::new("/home/me/Documents"),
//!     source_id: "documents",
//!     depth_cap: 0,
//!     follow_symlinks: false,
//!     mode: ScanMode::Incremental,
//! };
//! scanner.scan(&request, &mut |_action| { /* hand to the indexing pipeline */ }).unwrap();
//! ```

/// Crawler configuration: indexable roots, blacklist patterns, the default
/// search backend, and on-disk config-file handling.
pub mod config;
/// Shared crawl-time state: MIME-parent caching and the set of labels seen so
/// far, so the filter pipeline and CLI can offer label completion.
pub mod context;
/// The in-memory document representation passed between the crawler, the
/// filter pipeline and the index.
pub mod document;
/// The crate's error type and `Result` alias.
pub mod error;
/// Filter dispatch: the pipeline that reduces arbitrary documents to
/// `text/plain` sub-documents, plus the built-in filters (plain text, mbox
/// mailboxes, line-oriented archives).
pub mod filter;
/// Action queue and crawl history: a small embedded SQLite store tracking
/// what has been crawled, what work is queued, and metadata backups taken
/// before a reindex.
pub mod history;
/// The writable inverted index: postings, stored document records, the
/// spelling dictionary, and the label/value-slot side tables.
pub mod index;
/// Language detection and the stemmer registry used by indexing and search.
pub mod language;
/// MIME type detection and the parent-type table used to pick a filter.
pub mod mime;
/// The query engine: QP grammar parsing, two-pass stemmed search, ranking,
/// abstract generation and relevance-feedback expansion.
pub mod query;
/// The directory scanner: walks a filesystem root, diffs entries against
/// crawl history, and emits indexing work.
pub mod scanner;
/// Term construction: field prefixes, the magic all-documents term, and the
/// overflow hash used for terms past the length cap.
pub mod term;
/// Text tokenization: word splitting, diacritic folding and CJKV detection.
pub mod tokenizer;
/// URL canonicalization and the host/path accessors used for field queries.
pub mod url;
