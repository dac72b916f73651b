//! The `index` subcommand: check, index or show information about a set of
//! document URLs against a given index (spec §6 "CLI surface").

use async_trait::async_trait;
use colored::Colorize;
use tracing::warn;
use url::Url;

use pinot::context::Context;
use pinot::document::Document;
use pinot::error::Result;
use pinot::filter::{filter_document, DefaultFilterRegistry, FilterAction};
use pinot::index::{Index, StemmingMode};
use pinot::mime::{self, Mime};

use crate::args::IndexArgs;
use crate::config_for;

/// Applies each reduced `text/plain` sub-document to the index (spec §4.4
/// "take_action"). The top-level document carries the original URL; nested
/// sub-documents are indexed under their own rewritten location.
struct IndexingAction<'a> {
    index: &'a mut Index,
    indexed: usize,
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
            self.index.index_document(&doc, &[])?;
        }
        self.indexed += 1;
        Ok(())
    }
}

/// Runs the `index` subcommand. Returns whether at least one requested
/// operation succeeded (spec §6 exit code rule).
pub async fn run(args: &IndexArgs) -> Result<bool> {
    if !args.check && !args.index && !args.showinfo {
        eprintln!("{}", "no operation requested: pass --check, --index or --showinfo".red());
        return Ok(false);
    }

    let config = config_for(&args.backend, &args.db);
    let context = Context::new(config);
    let mut index = open_or_create(&args.db, context.clone())?;
    let registry = DefaultFilterRegistry::new(context);

    let mut any_success = false;

    for url in &args.urls {
        if args.check {
            match index.has_document(url) {
                Some(doc_id) => {
                    println!("{url}: document ID {doc_id}");
                    any_success = true;
                }
                None => println!("{url}: {}", "not indexed".dimmed()),
            }
        }

        if args.index {
            match index_one(&mut index, &registry, url).await {
                Ok(()) => {
                    println!("{}", format!("{url}: indexed").green());
                    any_success = true;
                }
                Err(e) => warn!(url = %url, error = %e, "failed to index document"),
            }
        }

        if args.showinfo {
            if let Some(doc_id) = index.has_document(url) {
                match index.get_document_info(doc_id) {
                    Ok(info) => {
                        println!("{url}:");
                        println!("  title: {}", info.title);
                        println!("  type: {}", info.mime_type);
                        println!("  language: {}", info.language);
                        println!("  size: {}", info.size);
                        println!("  labels: {}", info.labels.join(", "));
                        any_success = true;
                    }
                    Err(e) => warn!(url = %url, error = %e, "failed to read document info"),
                }
            } else {
                println!("{url}: {}", "not indexed".dimmed());
            }
        }
    }

    if args.index {
        index.flush()?;
    }

    Ok(any_success)
}

fn open_or_create(dir: &std::path::Path, context: Context) -> Result<Index> {
    if dir.join("index.json").exists() {
        Index::open(dir, context)
    } else {
        Index::create(dir, StemmingMode::Both, context)
    }
}

async fn index_one(index: &mut Index, registry: &DefaultFilterRegistry, url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| {
        pinot::error::PinotError::FilterInput { path: None, reason: e.to_string() }
    })?;
    let path = parsed.to_file_path().map_err(|_| pinot::error::PinotError::FilterInput {
        path: None,
        reason: "only file:// URLs can be indexed from the command line".to_string(),
    })?;

    let mut doc = Document::new();
    doc.info.location = pinot::url::canonicalize(url);
    doc.set_data_from_file(&path).map_err(|e| pinot::error::PinotError::FilterInput {
        path: Some(path.clone()),
        reason: e.to_string(),
    })?;

    let detected: Mime = mime::detect(Some(&path), Some(doc.data()), false);
    doc.info.mime_type = detected.as_str().to_string();
    if let Some(name) = pinot::url::basename(&doc.info.location) {
        doc.info.title = name;
    }

    let original_type = Mime::new(doc.info.mime_type.clone());
    let mut action = IndexingAction { index, indexed: 0 };
    filter_document(registry, doc, original_type, &mut action).await?;
    Ok(())
}
