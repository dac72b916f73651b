//! End-to-end tests covering a document's full path from a document on disk,
//! through the filter pipeline, into the index, and back out through search.

use async_trait::async_trait;

use pinot::context::Context;
use pinot::document::{Document, DocumentInfo};
use pinot::error::Result;
use pinot::filter::{filter_document, DefaultFilterRegistry, FilterAction};
use pinot::index::{Index, StemmingMode};
use pinot::mime::Mime;
use pinot::query::{search, SearchOptions};

struct IndexingAction<'a> {
    index: &'a mut Index,
    labels: Vec<String>,
}

#[async_trait]
impl<'a> FilterAction for IndexingAction<'a> {
    async fn take_action(&mut self, mut doc: Document, is_nested: bool) -> Result<()> {
        if is_nested && !doc.info.internal_path.is_empty() {
            doc.info.location = format!("{}?ipath={}", doc.info.location, doc.info.internal_path);
        }
        if let Some(doc_id) = self.index.has_document(&doc.info.location) {
            self.index.update_document(doc_id, &doc)?;
        } else {
            self.index.index_document(&doc, &self.labels)?;
        }
        Ok(())
    }
}

fn ctx() -> Context {
    Context::new(pinot::config::PinotConfig::default())
}

fn file_doc(location: &str, mime: &str, body: &[u8]) -> Document {
    let mut info = DocumentInfo::new();
    info.location = location.to_string();
    info.mime_type = mime.to_string();
    info.timestamp = 1_700_000_000;
    let mut doc = Document::from_info(info);
    doc.set_data(body.to_vec());
    doc
}

async fn index_via_pipeline(index: &mut Index, location: &str, mime: &str, body: &[u8], labels: &[String]) {
    let registry = DefaultFilterRegistry::new(ctx());
    let doc = file_doc(location, mime, body);
    let original_type = Mime::new(mime);
    let mut action = IndexingAction { index, labels: labels.to_vec() };
    filter_document(&registry, doc, original_type, &mut action).await.unwrap();
}

#[tokio::test]
async fn index_and_query_a_plain_text_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();

    index_via_pipeline(&mut index, "file:///tmp/notes.txt", "text/plain", b"the quick brown fox", &[]).await;
    index.flush().unwrap();

    let outcome = search(&index, "quick AND fox", &SearchOptions::default()).unwrap();
    assert_eq!(outcome.results.len(), 1);
}

#[tokio::test]
async fn reindexing_changed_content_drops_stale_terms() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();

    index_via_pipeline(&mut index, "file:///tmp/a.txt", "text/plain", b"alpha beta", &[]).await;
    index_via_pipeline(&mut index, "file:///tmp/a.txt", "text/plain", b"gamma delta", &[]).await;

    let before = search(&index, "alpha", &SearchOptions::default()).unwrap();
    assert!(before.results.is_empty());
    let after = search(&index, "gamma", &SearchOptions::default()).unwrap();
    assert_eq!(after.results.len(), 1);
}

#[tokio::test]
async fn label_filtered_query_narrows_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();

    index_via_pipeline(&mut index, "file:///tmp/a.txt", "text/plain", b"kittens", &["fav".to_string()]).await;
    index_via_pipeline(&mut index, "file:///tmp/b.txt", "text/plain", b"kittens", &[]).await;

    let outcome = search(&index, "kittens AND label:fav", &SearchOptions::default()).unwrap();
    assert_eq!(outcome.results.len(), 1);
}

#[tokio::test]
async fn nested_mailbox_reindex_removes_stale_children() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();

    let two_msgs = b"From a@x Mon\nSubject: one\n\nalpha body\nFrom b@x Tue\nSubject: two\n\nbeta body\n";
    index_via_pipeline(&mut index, "mbox://inbox", "application/mbox", two_msgs, &[]).await;
    assert_eq!(search(&index, "alpha", &SearchOptions::default()).unwrap().results.len(), 1);
    assert_eq!(search(&index, "beta", &SearchOptions::default()).unwrap().results.len(), 1);

    let removed = index.unindex_documents_by("mbox://inbox", pinot::index::SelectorKind::File).unwrap();
    assert_eq!(removed, 2);

    let one_msg = b"From a@x Mon\nSubject: one\n\nalpha body\n";
    index_via_pipeline(&mut index, "mbox://inbox", "application/mbox", one_msg, &[]).await;

    assert_eq!(search(&index, "alpha", &SearchOptions::default()).unwrap().results.len(), 1);
    assert!(search(&index, "beta", &SearchOptions::default()).unwrap().results.is_empty());
}

#[tokio::test]
async fn field_query_matches_a_title_phrase() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();

    let mut info = DocumentInfo::new();
    info.location = "file:///tmp/report.txt".to_string();
    info.title = "quarterly budget review".to_string();
    info.mime_type = "text/plain".to_string();
    let mut doc = Document::from_info(info);
    doc.set_data(b"nothing interesting in the body".to_vec());
    index.index_document(&doc, &[]).unwrap();

    let outcome = search(&index, "title:\"budget review\"", &SearchOptions::default()).unwrap();
    assert_eq!(outcome.results.len(), 1);
}

#[tokio::test]
async fn pure_cjkv_query_matches_by_character_ngram() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = Index::create(dir.path(), StemmingMode::Both, ctx()).unwrap();

    index_via_pipeline(&mut index, "file:///tmp/cn.txt", "text/plain", "東京 日本 大阪".as_bytes(), &[]).await;
    index.flush().unwrap();

    let outcome = search(&index, "東京 AND 日本", &SearchOptions::default()).unwrap();
    assert_eq!(outcome.results.len(), 1);
}
