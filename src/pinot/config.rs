//! User configuration (spec §6): default backend, indexable roots, blacklist,
//! ignore-robots flag, new-results color, max results per query.
//!
//! Replaces the source's process-wide settings singleton with an ordinary
//! value loaded once and shared via [`crate::context::Context`] (spec §9,
//! "global singleton for settings and MIME scanner").

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PinotError, Result};

/// Internal label prefix reserved for machine-applied labels (spec §6).
/// Labels starting with `X-` are never shown or renamed by user operations.
pub const INTERNAL_LABEL_PREFIX: &str = "X-";

/// Label applied to a mailbox child document while its parent is still being
/// parsed (spec §9, `parseMailAccount` open question).
pub const IN_PROGRESS_LABEL: &str = "X-parsing";

/// Top level, user-editable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinotConfig {
    /// Name of the default index backend (there is exactly one implementation
    /// today, but the name is kept so a future alternate backend can be
    /// selected without changing the on-disk config shape).
    pub default_backend: String,
    /// Filesystem roots that are crawled.
    pub indexable_roots: Vec<PathBuf>,
    /// Glob-style patterns; paths matching any of these are recorded as
    /// crawled but never fed to the pipeline.
    pub blacklist_patterns: Vec<String>,
    /// Whether `robots.txt`-style exclusion rules are honored for indexable
    /// network locations. Local crawling ignores this; it exists for parity
    /// with the web-search adapters, which are otherwise out of scope.
    pub ignore_robots: bool,
    /// Color used to highlight new results in terminal output (a `colored`
    /// color name, e.g. "green").
    pub new_results_color: String,
    /// Maximum number of results returned for a single query.
    pub max_results: usize,
    /// Directory holding all persisted state (spec §6 layout).
    pub config_dir: PathBuf,
}

impl Default for PinotConfig {
    fn default() -> Self {
        PinotConfig {
            default_backend: "local".to_string(),
            indexable_roots: Vec::new(),
            blacklist_patterns: Vec::new(),
            ignore_robots: false,
            new_results_color: "green".to_string(),
            max_results: 100,
            config_dir: default_config_dir(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pinot")
}

impl PinotConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file does not set.
    pub fn load(path: &Path) -> Result<PinotConfig> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| PinotError::IndexIo(e.to_string()))
    }

    /// Path to the document index directory (`<config_dir>/index/`).
    pub fn index_dir(&self) -> PathBuf {
        self.config_dir.join("index")
    }

    /// Path to the mail index directory (`<config_dir>/mail/`).
    pub fn mail_dir(&self) -> PathBuf {
        self.config_dir.join("mail")
    }

    /// Path to the SQL file backing crawl history and the action queue
    /// (`<config_dir>/history`).
    pub fn history_path(&self) -> PathBuf {
        self.config_dir.join("history")
    }

    /// Writes the `CACHEDIR.TAG` marker into an index directory so backup
    /// tools exclude it, if not already present (spec §6).
    pub fn write_cachedir_tag(dir: &Path) -> Result<()> {
        let tag_path = dir.join("CACHEDIR.TAG");
        if tag_path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(dir)?;
        std::fs::write(
            tag_path,
            "Signature: 8a477f597d28d172789f06886806bc55\n\
             # This file is a cache directory tag created by pinot.\n\
             # For information about cache directory tags see https://bford.info/cachedir/\n",
        )?;
        Ok(())
    }

    /// Whether a label is internal and thus hidden from user label operations.
    pub fn is_internal_label(label: &str) -> bool {
        label.starts_with(INTERNAL_LABEL_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = PinotConfig::default();
        assert_eq!(cfg.default_backend, "local");
        assert!(cfg.indexable_roots.is_empty());
        assert_eq!(cfg.max_results, 100);
    }

    #[test]
    fn internal_labels_are_detected() {
        assert!(PinotConfig::is_internal_label("X-parsing"));
        assert!(!PinotConfig::is_internal_label("fav"));
    }

    #[test]
    fn load_round_trips_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinot.toml");
        std::fs::write(
            &path,
            "default_backend = \"local\"\nindexable_roots = [\"/tmp\"]\nblacklist_patterns = []\nignore_robots = false\nnew_results_color = \"green\"\nmax_results = 50\nconfig_dir = \"/tmp/pinot-cfg\"\n",
        )
        .unwrap();
        let cfg = PinotConfig::load(&path).unwrap();
        assert_eq!(cfg.max_results, 50);
        assert_eq!(cfg.indexable_roots, vec![PathBuf::from("/tmp")]);
    }
}
