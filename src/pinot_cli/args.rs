//! Command-line argument definitions (spec §6 "CLI surface"). Flag and
//! subcommand names are preserved from the tool this crate's CLI grew out
//! of, even where a flag's original purpose (proxy settings, XESAM grammars)
//! no longer has a backing implementation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(name = "pinot", about = "Personal desktop search: index and query local documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index, check or inspect one or more document URLs.
    Index(IndexArgs),
    /// Query an index.
    Search(SearchArgs),
}

/// Arguments for the `index` subcommand.
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Name of the back-end to use (default "local"; kept for compatibility,
    /// there is only one back-end).
    #[arg(short, long, default_value = "local")]
    pub backend: String,

    /// Check whether each given URL is already in the index.
    #[arg(short, long)]
    pub check: bool,

    /// Path to the index directory to use.
    #[arg(short, long)]
    pub db: PathBuf,

    /// Index each given URL.
    #[arg(short, long)]
    pub index: bool,

    /// Show stored information about each given URL.
    #[arg(short, long)]
    pub showinfo: bool,

    /// Document URLs (only `file://` URLs can be indexed; any scheme can be
    /// checked or shown if already present).
    pub urls: Vec<String>,
}

/// Arguments for the `search` subcommand.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Name of the back-end to query (default "local"; kept for
    /// compatibility, there is only one back-end).
    pub backend: String,

    /// Path to the index directory to query.
    pub db: PathBuf,

    /// Query text, or (with `--xesamql`/`--xesamul`) a path to a file
    /// containing it.
    pub query: String,

    /// Maximum number of results to return.
    #[arg(short = 'm', long, default_value_t = 10)]
    pub max: usize,

    /// Sort by date then by relevance, instead of relevance alone.
    #[arg(short = 'd', long)]
    pub datefirst: bool,

    /// Stemming language (in English, e.g. "english").
    #[arg(short = 's', long)]
    pub stemming: Option<String>,

    /// File to export results to, in CSV format.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub tocsv: Option<PathBuf>,

    /// File to export results to, in XML format.
    #[arg(short = 'x', long, value_name = "FILE")]
    pub toxml: Option<PathBuf>,

    /// Query input is a file containing a Xesam QL query; read it and pass
    /// its contents through to the query parser unchanged.
    #[arg(short = 'q', long)]
    pub xesamql: bool,

    /// Query input is a file containing a Xesam UL query; read it and pass
    /// its contents through to the query parser unchanged.
    #[arg(short = 'u', long)]
    pub xesamul: bool,
}
