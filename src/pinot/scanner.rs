//! Directory scanner (spec §4.7): walks one filesystem root per invocation,
//! diffs entries against crawl history, and emits indexing work. The walk is
//! iterative: an explicit worklist stands in for the call stack, one level
//! of `walkdir` listing its immediate children at a time, so cycle
//! avoidance, blacklisting, and the depth cap are enforced on the worklist
//! rather than on Rust's own recursion depth (spec §4.7 "Per-entry rules").

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::DocumentInfo;
use crate::error::Result;
use crate::history::{BackupSelector, CrawlItem, CrawlStatus, History};
use crate::url;

/// Status updates are buffered and flushed to history every this many
/// entries, or at the end of the walk (spec §4.7 "Batch updates").
pub const BATCH_SIZE: usize = 500;

/// Metadata-backup rows are restored this many at a time after a reindex
/// (spec §4.7 "Reindex mode").
pub const BACKUP_PAGE_SIZE: usize = 100;

/// Full scan resets the source to `TO_CRAWL` up front and removes anything
/// still `TO_CRAWL` once the walk completes (it was deleted from disk).
/// Incremental scan relies solely on mtime comparison (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Full,
    Incremental,
}

/// Parameters for one scan invocation.
pub struct ScanRequest<'a> {
    pub root: &'a Path,
    pub source_id: &'a str,
    /// 0 means unbounded.
    pub depth_cap: usize,
    pub follow_symlinks: bool,
    pub mode: ScanMode,
}

/// One unit of work the scanner hands to the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanAction {
    Index { url: String, mtime: i64, size: u64 },
    Unindex { url: String },
}

/// Tallies from one scan, useful for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub indexed: usize,
    pub unindexed: usize,
    pub blacklisted: usize,
    pub errors: usize,
}

/// Walks a single root, consulting and updating `history` as it goes.
pub struct Scanner<'a> {
    history: &'a History,
    blacklist_patterns: &'a [String],
    cancel: &'a AtomicBool,
}

impl<'a> Scanner<'a> {
    pub fn new(history: &'a History, blacklist_patterns: &'a [String], cancel: &'a AtomicBool) -> Scanner<'a> {
        Scanner { history, blacklist_patterns, cancel }
    }

    /// Runs one scan, calling `on_action` for every work item as it is
    /// discovered. Returns once the walk (and, for a full scan, the
    /// deleted-entry sweep) completes or the cancel flag is observed set.
    pub fn scan(&self, request: &ScanRequest, on_action: &mut dyn FnMut(ScanAction)) -> Result<ScanSummary> {
        if request.mode == ScanMode::Full {
            self.history.reset_source_to_crawl(request.source_id)?;
        }

        let mut summary = ScanSummary::default();
        let mut pending: Vec<CrawlItem> = Vec::new();
        let mut covered: HashSet<PathBuf> = HashSet::new();
        if let Ok(canonical_root) = fs::canonicalize(request.root) {
            covered.insert(canonical_root);
        }

        // Explicit worklist standing in for the call stack: each entry is a
        // directory still to be listed, paired with its depth. The cap is
        // enforced on entries pushed here, never on Rust's own call depth,
        // so an unbounded (`depth_cap: 0`) walk over a pathologically deep
        // tree cannot grow the real stack (spec §4.7).
        let mut worklist: Vec<(PathBuf, usize)> = vec![(request.root.to_path_buf(), 1)];

        while let Some((dir, depth)) = worklist.pop() {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            self.walk_directory(request, &dir, depth, &mut pending, &mut covered, &mut summary, on_action, &mut worklist)?;
        }

        self.flush(&mut pending)?;

        if request.mode == ScanMode::Full && !self.cancel.load(Ordering::Relaxed) {
            summary.unindexed += self.sweep_deleted(request.source_id, on_action)?;
        }

        Ok(summary)
    }

    /// Lists one directory's immediate children and handles each: files are
    /// processed in place, subdirectories (real or symlink-resolved) are
    /// pushed onto `worklist` rather than walked by recursive call. `depth`
    /// is the depth of the entries being listed (the root's children are
    /// depth 1).
    #[allow(clippy::too_many_arguments)]
    fn walk_directory(
        &self,
        request: &ScanRequest,
        dir: &Path,
        depth: usize,
        pending: &mut Vec<CrawlItem>,
        covered: &mut HashSet<PathBuf>,
        summary: &mut ScanSummary,
        on_action: &mut dyn FnMut(ScanAction),
        worklist: &mut Vec<(PathBuf, usize)>,
    ) -> Result<()> {
        let children: Vec<_> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .collect();

        for entry in children {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }

            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }

            let path = entry.path().to_path_buf();
            let location = url::canonicalize(&format!("file://{}", path.display()));

            if matches_any(self.blacklist_patterns, &path) {
                summary.blacklisted += 1;
                pending.push(self.crawled_item(request.source_id, &location, now()));
                self.maybe_flush(pending)?;
                continue;
            }

            let file_type = entry.file_type();

            if file_type.is_symlink() {
                if !request.follow_symlinks {
                    continue;
                }
                self.handle_symlink(request, &path, depth, pending, covered, summary, on_action, worklist)?;
                continue;
            }

            if file_type.is_dir() {
                self.schedule_directory(request, &path, depth, covered, worklist);
                continue;
            }

            if file_type.is_file() {
                self.process_file(request.source_id, &path, &location, pending, summary, on_action)?;
            }
        }

        Ok(())
    }

    /// Pushes `path` onto `worklist` for later listing, unless it is already
    /// covered (by a direct path or an earlier symlink) or beyond the depth
    /// cap (spec §4.7: "already covered indexable location").
    fn schedule_directory(
        &self,
        request: &ScanRequest,
        path: &Path,
        depth: usize,
        covered: &mut HashSet<PathBuf>,
        worklist: &mut Vec<(PathBuf, usize)>,
    ) {
        if let Ok(canonical) = fs::canonicalize(path) {
            if !covered.insert(canonical) {
                return;
            }
        }
        if request.depth_cap != 0 && depth >= request.depth_cap {
            return;
        }
        worklist.push((path.to_path_buf(), depth + 1));
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_symlink(
        &self,
        request: &ScanRequest,
        link: &Path,
        depth: usize,
        pending: &mut Vec<CrawlItem>,
        covered: &mut HashSet<PathBuf>,
        summary: &mut ScanSummary,
        on_action: &mut dyn FnMut(ScanAction),
        worklist: &mut Vec<(PathBuf, usize)>,
    ) -> Result<()> {
        let target = match fs::canonicalize(link) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %link.display(), error = %e, "symlink target unreachable");
                summary.errors += 1;
                return Ok(());
            }
        };

        if covered.contains(&target) {
            debug!(path = %link.display(), "symlink cycle avoided");
            return Ok(());
        }

        let target_url = url::canonicalize(&format!("file://{}", target.display()));
        if self.history.has_item(request.source_id, &target_url)? {
            return Ok(());
        }

        // A dummy record ensuring the referree is crawled once and only
        // once, even if several symlinks point at it (spec §4.7).
        pending.push(CrawlItem {
            url: target_url.clone(),
            source_id: request.source_id.to_string(),
            status: CrawlStatus::CrawlLink,
            last_seen_time: now(),
            error_code: 0,
        });
        self.maybe_flush(pending)?;

        covered.insert(target.clone());

        if target.is_dir() {
            // Symlinked directories are pushed unconditionally, matching the
            // pre-existing behavior of only capping depth for direct
            // descendants.
            worklist.push((target, depth + 1));
        } else if target.is_file() {
            self.process_file(request.source_id, &target, &target_url, pending, summary, on_action)?;
        }

        Ok(())
    }

    fn process_file(
        &self,
        source_id: &str,
        path: &Path,
        location: &str,
        pending: &mut Vec<CrawlItem>,
        summary: &mut ScanSummary,
        on_action: &mut dyn FnMut(ScanAction),
    ) -> Result<()> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not stat file");
                summary.errors += 1;
                return Ok(());
            }
        };
        let mtime = mtime_secs(&metadata);
        let size = metadata.len();

        let previously_seen = self.history.get_item(source_id, location)?;
        let changed = match &previously_seen {
            None => true,
            Some(item) => mtime > item.last_seen_time,
        };

        if changed {
            on_action(ScanAction::Index { url: location.to_string(), mtime, size });
            summary.indexed += 1;
        }

        pending.push(self.crawled_item(source_id, location, mtime));
        self.maybe_flush(pending)
    }

    fn crawled_item(&self, source_id: &str, url: &str, last_seen_time: i64) -> CrawlItem {
        CrawlItem {
            url: url.to_string(),
            source_id: source_id.to_string(),
            status: CrawlStatus::Crawled,
            last_seen_time,
            error_code: 0,
        }
    }

    fn maybe_flush(&self, pending: &mut Vec<CrawlItem>) -> Result<()> {
        if pending.len() >= BATCH_SIZE {
            self.flush(pending)?;
        }
        Ok(())
    }

    fn flush(&self, pending: &mut Vec<CrawlItem>) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        self.history.flush_batch(pending)?;
        pending.clear();
        Ok(())
    }

    /// After a full scan's walk, anything still `TO_CRAWL` was deleted from
    /// disk: emit unindex actions and drop the rows (spec §4.7).
    fn sweep_deleted(&self, source_id: &str, on_action: &mut dyn FnMut(ScanAction)) -> Result<usize> {
        let mut removed = 0;
        loop {
            let page = self.history.get_source_items(source_id, Some(CrawlStatus::ToCrawl), 0, BATCH_SIZE)?;
            if page.is_empty() {
                break;
            }
            for item in &page {
                on_action(ScanAction::Unindex { url: item.url.clone() });
                self.history.delete_item(source_id, &item.url)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Rows left `CRAWLING` by an interrupted scan: the caller re-stats and
    /// re-enqueues these before the next walk resumes (spec §4.7
    /// "Backpressure & load").
    pub fn unfinished_entries(&self, source_id: &str) -> Result<Vec<CrawlItem>> {
        self.history.get_source_items(source_id, Some(CrawlStatus::Crawling), 0, usize::MAX)
    }

    /// Restores user-set metadata (title overrides, labels) from the
    /// metadata backup after a reindex, `BACKUP_PAGE_SIZE` rows at a time
    /// (spec §4.7 "Reindex mode"). `apply` is called once per restored row.
    pub fn restore_metadata_backup(
        &self,
        mut apply: impl FnMut(&str, BackupSelector, &DocumentInfo) -> Result<()>,
    ) -> Result<usize> {
        let mut offset = 0;
        let mut restored = 0;
        loop {
            let page = self.history.list_metadata_backups(offset, BACKUP_PAGE_SIZE)?;
            if page.is_empty() {
                break;
            }
            for (url, selector, info) in &page {
                apply(url, *selector, info)?;
                restored += 1;
            }
            offset += page.len();
        }
        Ok(restored)
    }
}

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn mtime_secs(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn matches_any(patterns: &[String], path: &Path) -> bool {
    let text = path.to_string_lossy();
    patterns.iter().any(|p| glob_match(p, &text))
}

/// A small glob matcher supporting `*` (any run of characters, including
/// none) and `?` (exactly one character); no character classes or brace
/// expansion, matching the informal "glob-style patterns" in the
/// configuration surface (spec §6).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let mut dp = vec![vec![false; t.len() + 1]; p.len() + 1];
    dp[0][0] = true;
    for (i, &pc) in p.iter().enumerate() {
        if pc == '*' {
            dp[i + 1][0] = dp[i][0];
        }
    }
    for i in 0..p.len() {
        for j in 0..t.len() {
            dp[i + 1][j + 1] = match p[i] {
                '*' => dp[i][j + 1] || dp[i + 1][j],
                '?' => dp[i][j],
                c => dp[i][j] && c == t[j],
            };
        }
    }
    dp[p.len()][t.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    fn setup() -> (tempfile::TempDir, History) {
        let dir = tempfile::tempdir().unwrap();
        let history = History::open(&dir.path().join("history.db")).unwrap();
        (dir, history)
    }

    #[test]
    fn glob_matches_wildcard_suffix() {
        assert!(glob_match("*.tmp", "/a/b/file.tmp"));
        assert!(!glob_match("*.tmp", "/a/b/file.txt"));
        assert!(glob_match("/a/*/c.txt", "/a/b/c.txt"));
    }

    #[test]
    fn emits_index_action_for_new_file() {
        let (root, history) = setup();
        fs::write(root.path().join("a.txt"), b"hello").unwrap();

        let cancel = AtomicBool::new(false);
        let scanner = Scanner::new(&history, &[], &cancel);
        let request = ScanRequest {
            root: root.path(),
            source_id: "root",
            depth_cap: 0,
            follow_symlinks: false,
            mode: ScanMode::Full,
        };

        let mut actions = Vec::new();
        let summary = scanner.scan(&request, &mut |a| actions.push(a)).unwrap();
        assert_eq!(summary.indexed, 1);
        assert!(actions.iter().any(|a| matches!(a, ScanAction::Index { url, .. } if url.ends_with("a.txt"))));
    }

    #[test]
    fn unchanged_file_is_not_reindexed_on_second_incremental_scan() {
        let (root, history) = setup();
        fs::write(root.path().join("a.txt"), b"hello").unwrap();

        let cancel = AtomicBool::new(false);
        let scanner = Scanner::new(&history, &[], &cancel);
        let request = ScanRequest {
            root: root.path(),
            source_id: "root",
            depth_cap: 0,
            follow_symlinks: false,
            mode: ScanMode::Incremental,
        };

        scanner.scan(&request, &mut |_| {}).unwrap();
        let mut actions = Vec::new();
        scanner.scan(&request, &mut |a| actions.push(a)).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn deleted_file_is_unindexed_after_full_scan() {
        let (root, history) = setup();
        let path = root.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let cancel = AtomicBool::new(false);
        let scanner = Scanner::new(&history, &[], &cancel);
        let request = ScanRequest {
            root: root.path(),
            source_id: "root",
            depth_cap: 0,
            follow_symlinks: false,
            mode: ScanMode::Full,
        };
        scanner.scan(&request, &mut |_| {}).unwrap();

        fs::remove_file(&path).unwrap();
        let mut actions = Vec::new();
        let summary = scanner.scan(&request, &mut |a| actions.push(a)).unwrap();
        assert_eq!(summary.unindexed, 1);
        assert!(actions.iter().any(|a| matches!(a, ScanAction::Unindex { url } if url.ends_with("a.txt"))));
    }

    #[test]
    fn blacklisted_file_is_recorded_but_not_indexed() {
        let (root, history) = setup();
        fs::write(root.path().join("secret.tmp"), b"hello").unwrap();

        let cancel = AtomicBool::new(false);
        let patterns = vec!["*.tmp".to_string()];
        let scanner = Scanner::new(&history, &patterns, &cancel);
        let request = ScanRequest {
            root: root.path(),
            source_id: "root",
            depth_cap: 0,
            follow_symlinks: false,
            mode: ScanMode::Full,
        };

        let mut actions = Vec::new();
        let summary = scanner.scan(&request, &mut |a| actions.push(a)).unwrap();
        assert_eq!(summary.blacklisted, 1);
        assert!(actions.is_empty());
    }

    #[test]
    fn symlink_loop_is_not_followed_twice() {
        let (root, history) = setup();
        let target_dir = root.path().join("target");
        fs::create_dir(&target_dir).unwrap();
        fs::write(target_dir.join("a.txt"), b"hello").unwrap();
        symlink(&target_dir, root.path().join("link1")).unwrap();
        symlink(&target_dir, root.path().join("link2")).unwrap();

        let cancel = AtomicBool::new(false);
        let scanner = Scanner::new(&history, &[], &cancel);
        let request = ScanRequest {
            root: root.path(),
            source_id: "root",
            depth_cap: 0,
            follow_symlinks: true,
            mode: ScanMode::Full,
        };

        let mut actions = Vec::new();
        scanner.scan(&request, &mut |a| actions.push(a)).unwrap();
        let indexed_a_txt = actions
            .iter()
            .filter(|a| matches!(a, ScanAction::Index { url, .. } if url.ends_with("a.txt")))
            .count();
        assert_eq!(indexed_a_txt, 1);
    }

    #[test]
    fn depth_cap_stops_recursion() {
        let (root, history) = setup();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("deep.txt"), b"hello").unwrap();
        fs::write(root.path().join("a").join("shallow.txt"), b"hello").unwrap();

        let cancel = AtomicBool::new(false);
        let scanner = Scanner::new(&history, &[], &cancel);
        let request = ScanRequest {
            root: root.path(),
            source_id: "root",
            depth_cap: 1,
            follow_symlinks: false,
            mode: ScanMode::Full,
        };

        let mut actions = Vec::new();
        scanner.scan(&request, &mut |a| actions.push(a)).unwrap();
        assert!(actions.is_empty());
    }
}
