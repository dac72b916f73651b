//! The writable inverted index (spec §4.5) — the single-writer serialization
//! point of the whole pipeline (spec §5).
//!
//! Postings live in an in-process `AHashMap<Term, PostingList>` (grounded on
//! the teacher's `AHashMap`-everywhere posting storage), snapshotted to disk
//! on `flush()` in the teacher's "commit moves RAM to disk" style, but as a
//! single `bincode`-serialized segment rather than the teacher's
//! block-compressed roaring-bitmap format — the spec does not require
//! byte-for-byte compatibility with a specific wire format, only the
//! operations and invariants of spec §4.5/§8.

pub mod posting;
pub mod spelling;
pub mod stored_record;
pub mod value_slots;

use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PinotConfig;
use crate::context::Context;
use crate::document::{Document, DocumentInfo};
use crate::error::{PinotError, Result};
use crate::language::{self, StemmerRegistry};
use crate::term::{self, MAGIC_TERM};
use crate::tokenizer::{self, Token};
use crate::url;

use self::posting::{PostingList, PostingStore};
use self::spelling::SpellingDict;
use self::value_slots::ValueSlots;

const META_FILENAME: &str = "index.json";
const DOCS_FILENAME: &str = "index.bin";
const POSTINGS_FILENAME: &str = "postings.bin";

/// How terms are stored relative to stemming (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StemmingMode {
    /// Store raw tokens only.
    Unstem,
    /// Store only stemmed tokens.
    Stem,
    /// Store both at the same position. Recommended by the design.
    Both,
}

impl Default for StemmingMode {
    fn default() -> Self {
        StemmingMode::Both
    }
}

/// Selector kind for [`Index::unindex_documents_by`] and filtered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Label,
    Directory,
    File,
}

#[derive(Serialize, Deserialize)]
struct IndexMeta {
    version: u32,
    stemming_mode: StemmingMode,
    labels: Vec<String>,
    next_doc_id: u64,
}

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone)]
struct StoredDoc {
    info: DocumentInfo,
    value_slots: ValueSlots,
    /// Terms contributed by the body (positional + raw-case).
    content_terms: AHashSet<String>,
    /// Terms contributed by the title: `S`-prefixed plus the secondary
    /// unprefixed/stemmed pass `add_title_terms` also emits (positional +
    /// raw-case). Kept apart from `content_terms` so a title-only update
    /// (`update_document_info`) can regenerate title postings without
    /// touching body postings.
    title_terms: AHashSet<String>,
    /// Position counter left by the body pass, where a (re)generated title
    /// pass should resume numbering from.
    title_start_position: u32,
    /// Terms contributed by the common prefixed fields (U/H/P/L/T/XDIR/
    /// XFILE/XEXT/XCLASS/magic).
    common_terms: AHashSet<String>,
    /// `XLABEL:` terms currently applied.
    label_terms: AHashSet<String>,
}

/// The writable inverted index for one on-disk location.
pub struct Index {
    dir: PathBuf,
    context: Context,
    stemming_mode: StemmingMode,
    next_doc_id: u64,
    docs: AHashMap<u64, StoredDoc>,
    postings: PostingStore,
    url_to_id: AHashMap<String, u64>,
    stemmers: StemmerRegistry,
    spelling: SpellingDict,
    labels: AHashSet<String>,
    dirty: bool,
}

impl Index {
    /// Creates a brand new, empty index at `dir`.
    pub fn create(dir: &Path, stemming_mode: StemmingMode, context: Context) -> Result<Index> {
        std::fs::create_dir_all(dir)?;
        PinotConfig::write_cachedir_tag(dir)?;
        let index = Index {
            dir: dir.to_path_buf(),
            context,
            stemming_mode,
            next_doc_id: 0,
            docs: AHashMap::new(),
            postings: PostingStore::default(),
            url_to_id: AHashMap::new(),
            stemmers: StemmerRegistry::new(),
            spelling: SpellingDict::new(),
            labels: AHashSet::new(),
            dirty: true,
        };
        Ok(index)
    }

    /// Opens an existing index at `dir`, reading its persisted segments.
    pub fn open(dir: &Path, context: Context) -> Result<Index> {
        let meta_path = dir.join(META_FILENAME);
        if !meta_path.exists() {
            return Err(PinotError::IndexCorrupt(format!(
                "no index metadata at {}",
                meta_path.display()
            )));
        }
        let meta_text = std::fs::read_to_string(&meta_path)?;
        let meta: IndexMeta = serde_json::from_str(&meta_text)
            .map_err(|e| PinotError::IndexCorrupt(e.to_string()))?;
        if meta.version != FORMAT_VERSION {
            return Err(PinotError::IndexCorrupt(format!(
                "unsupported index format version {}",
                meta.version
            )));
        }

        let docs: AHashMap<u64, StoredDoc> = read_segment(&dir.join(DOCS_FILENAME))?.unwrap_or_default();
        let postings: PostingStore = read_segment(&dir.join(POSTINGS_FILENAME))?.unwrap_or_default();

        let mut url_to_id = AHashMap::new();
        for (id, doc) in &docs {
            url_to_id.insert(doc.info.location.clone(), *id);
        }

        context.seed_labels(meta.labels.iter().cloned());

        Ok(Index {
            dir: dir.to_path_buf(),
            context,
            stemming_mode: meta.stemming_mode,
            next_doc_id: meta.next_doc_id,
            docs,
            postings,
            url_to_id,
            stemmers: StemmerRegistry::new(),
            spelling: SpellingDict::new(),
            labels: meta.labels.into_iter().collect(),
            dirty: false,
        })
    }

    /// Removes every document and resets the index to empty, keeping the
    /// on-disk location.
    pub fn clear(&mut self) {
        self.docs.clear();
        self.postings.clear();
        self.url_to_id.clear();
        self.next_doc_id = 0;
        self.labels.clear();
        self.dirty = true;
    }

    /// Deletes the index's on-disk directory entirely.
    pub fn delete(self) -> Result<()> {
        std::fs::remove_dir_all(&self.dir)?;
        Ok(())
    }

    /// Flushes pending writes durably (spec §4.5 `flush`).
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let meta = IndexMeta {
            version: FORMAT_VERSION,
            stemming_mode: self.stemming_mode,
            labels: self.labels.iter().cloned().collect(),
            next_doc_id: self.next_doc_id,
        };
        let meta_text = serde_json::to_string_pretty(&meta)?;

        match std::fs::write(self.dir.join(META_FILENAME), &meta_text) {
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "failed writing index metadata, falling back to sidecar file");
                std::fs::write(self.dir.join("labels.sidecar"), meta.labels.join("\n"))?;
            }
        }

        write_segment(&self.dir.join(DOCS_FILENAME), &self.docs)?;
        write_segment(&self.dir.join(POSTINGS_FILENAME), &self.postings)?;
        self.dirty = false;
        info!(docs = self.docs.len(), terms = self.postings.len(), "index flushed");
        Ok(())
    }

    /// Indexes a new document, returning its assigned id (spec §4.5
    /// `index_document`).
    pub fn index_document(&mut self, doc: &Document, labels: &[String]) -> Result<u64> {
        if !doc.info.is_valid() {
            return Err(PinotError::InputMissing(doc.info.location.clone()));
        }
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.write_document(doc_id, doc, labels.to_vec())?;
        Ok(doc_id)
    }

    /// Replaces a document's content in place, preserving its labels (spec
    /// §4.5 `update_document`, §8 invariant 4).
    pub fn update_document(&mut self, doc_id: u64, doc: &Document) -> Result<()> {
        let old = self
            .docs
            .get(&doc_id)
            .ok_or_else(|| PinotError::NotFound(doc_id.to_string()))?
            .clone();

        self.remove_terms(doc_id, &old.content_terms);
        self.remove_terms(doc_id, &old.title_terms);
        self.remove_terms(doc_id, &old.common_terms);
        // Labels are preserved: neither removed nor touched here.

        self.write_document(doc_id, doc, old.info.labels.clone())?;
        Ok(())
    }

    /// Updates only metadata: stored record, common prefixed terms and
    /// title-derived (`S` plus the secondary body-style pass) postings
    /// regenerate; body postings are untouched since the body text itself
    /// is never stored and so cannot be re-tokenized here (spec §4.5
    /// `update_document_info`). Changing `info.title` therefore leaves no
    /// orphaned `S`/... postings behind, matching the common-prefixed-term
    /// invariant this function already upheld.
    pub fn update_document_info(&mut self, doc_id: u64, info: &DocumentInfo) -> Result<()> {
        let old = self
            .docs
            .get(&doc_id)
            .ok_or_else(|| PinotError::NotFound(doc_id.to_string()))?
            .clone();

        self.remove_terms(doc_id, &old.common_terms);
        self.remove_terms(doc_id, &old.title_terms);
        self.url_to_id.remove(&old.info.location);

        let mut new_info = info.clone();
        new_info.location = url::canonicalize(&new_info.location);
        new_info.labels = old.info.labels.clone();

        let common_terms = self.add_common_terms(doc_id, &new_info);

        let mut title_terms = AHashSet::new();
        if !new_info.title.is_empty() {
            self.add_title_terms(
                doc_id,
                &new_info.title,
                &new_info.language,
                old.title_start_position,
                &mut title_terms,
            );
        }

        let value_slots = value_slots::compute(new_info.timestamp, new_info.size);

        self.url_to_id.insert(new_info.location.clone(), doc_id);
        self.docs.insert(
            doc_id,
            StoredDoc {
                info: new_info,
                value_slots,
                content_terms: old.content_terms,
                title_terms,
                title_start_position: old.title_start_position,
                common_terms,
                label_terms: old.label_terms,
            },
        );
        self.dirty = true;
        Ok(())
    }

    /// Removes a document entirely; its id is no longer retrievable (spec
    /// §4.5 `unindex_document`).
    pub fn unindex_document(&mut self, doc_id: u64) -> Result<()> {
        let Some(doc) = self.docs.remove(&doc_id) else {
            return Err(PinotError::NotFound(doc_id.to_string()));
        };
        self.remove_terms(doc_id, &doc.content_terms);
        self.remove_terms(doc_id, &doc.title_terms);
        self.remove_terms(doc_id, &doc.common_terms);
        self.remove_terms(doc_id, &doc.label_terms);
        self.url_to_id.remove(&doc.info.location);
        self.dirty = true;
        Ok(())
    }

    /// Deletes every document matching the corresponding prefix term (spec
    /// §4.5 `unindex_documents_by`). Returns the number of documents removed.
    pub fn unindex_documents_by(&mut self, name: &str, kind: SelectorKind) -> Result<usize> {
        let term = match kind {
            SelectorKind::Label => term::build_term(term::PREFIX_LABEL, name),
            SelectorKind::Directory => term::build_term(term::PREFIX_DIR, name),
            SelectorKind::File => term::build_term(term::PREFIX_FILE_PATH, name),
        };
        let ids = self
            .postings
            .get(&term)
            .map(|list| list.doc_ids())
            .unwrap_or_default();
        for id in &ids {
            self.unindex_document(*id)?;
        }
        Ok(ids.len())
    }

    /// Sets a document's labels (spec §4.5 `set_document_labels`).
    pub fn set_document_labels(&mut self, doc_id: u64, labels: &[String], reset: bool) -> Result<()> {
        let mut doc = self
            .docs
            .get(&doc_id)
            .ok_or_else(|| PinotError::NotFound(doc_id.to_string()))?
            .clone();

        if reset {
            let non_internal: Vec<String> = doc
                .label_terms
                .iter()
                .filter(|t| {
                    let label = t.strip_prefix(term::PREFIX_LABEL).unwrap_or(t);
                    !crate::config::PinotConfig::is_internal_label(label)
                })
                .cloned()
                .collect();
            for term in &non_internal {
                if let Some(list) = self.postings.get_mut(term) {
                    list.remove_doc(doc_id);
                    self.spelling.decrement(term);
                    if list.is_empty() {
                        self.postings.remove(term);
                    }
                }
                doc.label_terms.remove(term);
            }
            doc.info.labels.retain(|l| crate::config::PinotConfig::is_internal_label(l));
        }

        for label in labels {
            let term = term::build_term(term::PREFIX_LABEL, label);
            if doc.label_terms.insert(term.clone()) {
                self.postings.entry(term.clone()).or_default().add_boolean(doc_id);
                self.spelling.increment(&term);
            }
            if !doc.info.labels.contains(label) {
                doc.info.labels.push(label.clone());
            }
            self.labels.insert(label.clone());
            self.context.remember_label(label);
        }

        self.docs.insert(doc_id, doc);
        self.dirty = true;
        Ok(())
    }

    /// Looks up the document id holding the unique `U` term for `url`.
    pub fn has_document(&self, location: &str) -> Option<u64> {
        let canonical = url::canonicalize(location);
        self.url_to_id.get(&canonical).copied()
    }

    /// Retrieves the stored metadata for a document id.
    pub fn get_document_info(&self, doc_id: u64) -> Result<DocumentInfo> {
        self.docs
            .get(&doc_id)
            .map(|d| d.info.clone())
            .ok_or_else(|| PinotError::NotFound(doc_id.to_string()))
    }

    /// Retrieves a document's current labels.
    pub fn get_document_labels(&self, doc_id: u64) -> Result<Vec<String>> {
        self.docs
            .get(&doc_id)
            .map(|d| d.info.labels.clone())
            .ok_or_else(|| PinotError::NotFound(doc_id.to_string()))
    }

    /// Lists document ids matching `selector` (or every indexed document
    /// when `None`, via the magic term), paged by `start`/`max`.
    pub fn list_documents(&self, selector: Option<&str>, max: usize, start: usize) -> Vec<u64> {
        let term = selector.unwrap_or(MAGIC_TERM);
        self.postings
            .get(term)
            .map(|list| list.doc_ids().into_iter().skip(start).take(max).collect())
            .unwrap_or_default()
    }

    /// Up to `limit` terms from the global dictionary sharing `prefix`.
    pub fn get_close_terms(&self, prefix: &str, limit: usize) -> Vec<String> {
        let mut terms: Vec<String> = self
            .postings
            .keys()
            .filter(|t| t.starts_with(prefix))
            .cloned()
            .collect();
        terms.sort();
        terms.truncate(limit);
        terms
    }

    /// Terms added to the postings store for the given doc (used by the
    /// query engine's relevance-feedback expansion, spec §4.6).
    pub(crate) fn terms_for(&self, doc_id: u64) -> AHashSet<String> {
        self.docs
            .get(&doc_id)
            .map(|d| {
                d.content_terms
                    .union(&d.title_terms)
                    .chain(d.common_terms.iter())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn postings(&self) -> &PostingStore {
        &self.postings
    }

    pub(crate) fn value_slots(&self, doc_id: u64) -> Option<ValueSlots> {
        self.docs.get(&doc_id).map(|d| d.value_slots)
    }

    pub(crate) fn stemming_mode(&self) -> StemmingMode {
        self.stemming_mode
    }

    pub(crate) fn stemmers_mut(&mut self) -> &mut StemmerRegistry {
        &mut self.stemmers
    }

    pub(crate) fn known_labels(&self) -> &AHashSet<String> {
        &self.labels
    }

    pub(crate) fn spelling(&self) -> &SpellingDict {
        &self.spelling
    }

    // --- internal helpers -------------------------------------------------

    fn remove_terms(&mut self, doc_id: u64, terms: &AHashSet<String>) {
        for term in terms {
            if let Some(list) = self.postings.get_mut(term) {
                list.remove_doc(doc_id);
                self.spelling.decrement(term);
                if list.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    fn write_document(&mut self, doc_id: u64, doc: &Document, labels: Vec<String>) -> Result<()> {
        let mut info = doc.info.clone();
        info.location = url::canonicalize(&info.location);

        if info.language.is_empty() {
            let candidates = language::guess_language(doc.data(), language::DEFAULT_SAMPLE_LEN);
            info.language = self.stemmers.select(&candidates);
        }
        info.labels = labels;

        let body_text = std::str::from_utf8(doc.data()).unwrap_or("").to_string();

        let mut content_terms = AHashSet::new();
        let mut title_terms = AHashSet::new();

        let title_start_position = self.add_body_terms(doc_id, &body_text, &info.language, 0, &mut content_terms);
        if !info.title.is_empty() {
            self.add_title_terms(doc_id, &info.title, &info.language, title_start_position, &mut title_terms);
        }

        let common_terms = self.add_common_terms(doc_id, &info);

        let mut label_terms = AHashSet::new();
        for label in &info.labels {
            let term = term::build_term(term::PREFIX_LABEL, label);
            self.postings.entry(term.clone()).or_default().add_boolean(doc_id);
            self.spelling.increment(&term);
            label_terms.insert(term);
            self.labels.insert(label.clone());
            self.context.remember_label(label);
        }

        let value_slots = value_slots::compute(info.timestamp, info.size);

        self.url_to_id.insert(info.location.clone(), doc_id);
        self.docs.insert(
            doc_id,
            StoredDoc {
                info,
                value_slots,
                content_terms,
                title_terms,
                title_start_position,
                common_terms,
                label_terms,
            },
        );
        self.dirty = true;
        debug!(doc_id, "document written");
        Ok(())
    }

    /// Adds body postings with consecutive positions (spec §4.5 step 4).
    /// Returns the position counter after the body, so title postings
    /// follow it (spec §5 ordering guarantee: body precedes title).
    fn add_body_terms(
        &mut self,
        doc_id: u64,
        text: &str,
        language: &str,
        start_position: u32,
        content_terms: &mut AHashSet<String>,
    ) -> u32 {
        let tokens = tokenizer::tokenize(text);
        self.add_mode_terms(doc_id, &tokens, term::PREFIX_BODY, language, start_position, content_terms)
    }

    /// Adds title postings: `S`-prefixed unstemmed terms first, then
    /// unprefixed terms per the stemming mode, each block using
    /// consecutive positions continuing from the body (spec §4.5 step 5,
    /// matching the original implementation's two sequential passes over
    /// the title tokens).
    fn add_title_terms(
        &mut self,
        doc_id: u64,
        title: &str,
        language: &str,
        start_position: u32,
        terms: &mut AHashSet<String>,
    ) -> u32 {
        let tokens = tokenizer::tokenize(title);
        let mut position = start_position;
        for token in &tokens {
            let term = term::build_term(term::PREFIX_TITLE, &token.text);
            self.postings.entry(term.clone()).or_default().add_position(doc_id, position);
            terms.insert(term);
            position += 1;
        }
        self.add_mode_terms(doc_id, &tokens, term::PREFIX_BODY, language, position, terms)
    }

    /// Applies the index's stemming mode to a token stream, adding the raw
    /// `R`-prefixed variant for capitalized tokens at the same position as
    /// the mode's own variant(s) (spec §4.5 step 4, §3).
    fn add_mode_terms(
        &mut self,
        doc_id: u64,
        tokens: &[Token],
        prefix: &str,
        language: &str,
        start_position: u32,
        terms: &mut AHashSet<String>,
    ) -> u32 {
        let mut position = start_position;
        for token in tokens {
            if token.starts_uppercase {
                let raw_term = term::build_term(term::PREFIX_RAW, &token.text);
                self.postings.entry(raw_term.clone()).or_default().add_position(doc_id, position);
                terms.insert(raw_term);
            }

            let lower = token.text.to_lowercase();
            match self.stemming_mode {
                StemmingMode::Unstem => {
                    let term = term::build_term(prefix, &lower);
                    self.postings.entry(term.clone()).or_default().add_position(doc_id, position);
                    terms.insert(term);
                }
                StemmingMode::Stem => {
                    let stemmed = self.stemmers.stem(&lower, language);
                    let term = term::build_term(prefix, &stemmed);
                    self.postings.entry(term.clone()).or_default().add_position(doc_id, position);
                    terms.insert(term);
                }
                StemmingMode::Both => {
                    let unstemmed = term::build_term(prefix, &lower);
                    self.postings.entry(unstemmed.clone()).or_default().add_position(doc_id, position);
                    terms.insert(unstemmed);

                    let stemmed_word = self.stemmers.stem(&lower, language);
                    let stemmed = term::build_term(prefix, &stemmed_word);
                    self.postings.entry(stemmed.clone()).or_default().add_position(doc_id, position);
                    terms.insert(stemmed);
                }
            }
            position += 1;
        }
        position
    }

    /// Adds every common, position-less term (spec §3, §4.5 step 6): the
    /// magic term plus `U`/`H`/`P`/`L`/`T`/`XDIR:`/`XFILE:`/`XEXT:`/`XCLASS:`.
    fn add_common_terms(&mut self, doc_id: u64, info: &DocumentInfo) -> AHashSet<String> {
        let mut terms = AHashSet::new();

        let mut add = |store: &mut PostingStore, spelling: &mut SpellingDict, term: String| {
            store.entry(term.clone()).or_default().add_boolean(doc_id);
            spelling.increment(&term);
            terms.insert(term);
        };

        add(&mut self.postings, &mut self.spelling, MAGIC_TERM.to_string());
        add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_URL, &info.location));
        add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_TYPE, &info.mime_type));
        add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_LANGUAGE, &info.language));

        if let Some(host) = url::host(&info.location) {
            add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_HOST, &host));
            let mut rest = host.as_str();
            while let Some(dot) = rest.find('.') {
                rest = &rest[dot + 1..];
                if rest.is_empty() {
                    break;
                }
                add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_HOST, rest));
            }
        }

        if let Some(basename) = url::basename(&info.location) {
            add(
                &mut self.postings,
                &mut self.spelling,
                term::build_term(term::PREFIX_FILE, &basename.to_lowercase()),
            );
        }
        if let Some(ext) = url::extension(&info.location) {
            add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_EXT, &ext));
        }
        for dir in url::directory_prefixes(&info.location) {
            add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_DIR, &dir));
        }
        if info.location.contains('?') {
            if let Some(file_part) = url::file_part(&info.location) {
                add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_FILE_PATH, &file_part));
            }
        }
        let class = crate::mime::Mime::new(info.mime_type.clone());
        add(&mut self.postings, &mut self.spelling, term::build_term(term::PREFIX_CLASS, class.class()));

        terms
    }
}

fn write_segment<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    let compressed = zstd::encode_all(bytes.as_slice(), 1).map_err(|e| PinotError::IndexIo(e.to_string()))?;
    std::fs::write(path, compressed)?;
    Ok(())
}

fn read_segment<T: for<'a> Deserialize<'a>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let compressed = std::fs::read(path)?;
    let bytes = zstd::decode_all(compressed.as_slice()).map_err(|e| PinotError::IndexCorrupt(e.to_string()))?;
    let value = bincode::deserialize(&bytes)?;
    Ok(Some(value))
}
