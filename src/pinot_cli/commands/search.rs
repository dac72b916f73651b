//! The `search` subcommand: parses and runs one query against an index,
//! printing, CSV-exporting and/or XML-exporting the ranked results (spec §6
//! "CLI surface").

use std::fs;
use std::io::Write;
use std::path::Path;

use colored::Colorize;

use pinot::context::Context;
use pinot::error::{PinotError, Result};
use pinot::index::Index;
use pinot::query::{search, SearchOptions, SortOrder};

use crate::args::SearchArgs;
use crate::config_for;

/// Runs the `search` subcommand. Returns whether the query executed and
/// returned at least one result (spec §6 exit code rule).
pub fn run(args: &SearchArgs) -> Result<bool> {
    let config = config_for(&args.backend, &args.db);
    let context = Context::new(config);
    let index = Index::open(&args.db, context)?;

    let query_text = resolve_query_text(args)?;

    let options = SearchOptions {
        start: 0,
        count: args.max,
        sort: if args.datefirst { SortOrder::Date } else { SortOrder::Relevance },
        language: args.stemming.clone(),
        limit_urls: None,
    };

    let outcome = match search(&index, &query_text, &options) {
        Ok(outcome) => outcome,
        Err(PinotError::QuerySyntax(reason)) => {
            println!("syntax error near '{reason}'");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let rows: Vec<ResultRow> = outcome
        .results
        .iter()
        .filter_map(|r| {
            let info = index.get_document_info(r.doc_id).ok()?;
            Some(ResultRow { url: info.location, title: info.title, mime_type: info.mime_type, score: r.score })
        })
        .collect();

    if let Some(corrected) = &outcome.corrected_query {
        println!("{}", format!("did you mean: {corrected}?").yellow());
    }

    let silent = args.tocsv.is_some() || args.toxml.is_some();
    if !silent {
        print_results(&rows, outcome.total_matches);
    }
    if let Some(path) = &args.tocsv {
        write_csv(path, &rows)?;
    }
    if let Some(path) = &args.toxml {
        write_xml(path, &rows)?;
    }

    Ok(!rows.is_empty())
}

struct ResultRow {
    url: String,
    title: String,
    mime_type: String,
    score: f64,
}

fn resolve_query_text(args: &SearchArgs) -> Result<String> {
    if args.xesamql || args.xesamul {
        let contents = fs::read_to_string(&args.query).map_err(|e| PinotError::FilterInput {
            path: Some(std::path::PathBuf::from(&args.query)),
            reason: e.to_string(),
        })?;
        return Ok(contents.trim().to_string());
    }
    Ok(args.query.clone())
}

fn print_results(rows: &[ResultRow], total_matches: usize) {
    println!("{total_matches} match(es)");
    for (rank, row) in rows.iter().enumerate() {
        println!(
            "{}. {} [{}] ({:.3})",
            rank + 1,
            row.title.green(),
            row.url,
            row.score,
        );
    }
}

fn write_csv(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| PinotError::IndexIo(e.to_string()))?;
    writer
        .write_record(["url", "title", "type", "score"])
        .map_err(|e| PinotError::IndexIo(e.to_string()))?;
    for row in rows {
        writer
            .write_record([&row.url, &row.title, &row.mime_type, &row.score.to_string()])
            .map_err(|e| PinotError::IndexIo(e.to_string()))?;
    }
    writer.flush().map_err(|e| PinotError::IndexIo(e.to_string()))?;
    Ok(())
}

fn write_xml(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<results>\n");
    for row in rows {
        out.push_str("  <result>\n");
        out.push_str(&format!("    <url>{}</url>\n", xml_escape(&row.url)));
        out.push_str(&format!("    <title>{}</title>\n", xml_escape(&row.title)));
        out.push_str(&format!("    <type>{}</type>\n", xml_escape(&row.mime_type)));
        out.push_str(&format!("    <score>{}</score>\n", row.score));
        out.push_str("  </result>\n");
    }
    out.push_str("</results>\n");
    let mut file = fs::File::create(path)?;
    file.write_all(out.as_bytes())?;
    Ok(())
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
