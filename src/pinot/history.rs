//! Action queue & crawl history (spec §4.8, §3): a single embedded SQL
//! store backing two tables plus metadata backup, used by the scanner (C7)
//! to diff the filesystem against what was last seen and to persist
//! pending index/unindex work across restarts.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::document::DocumentInfo;
use crate::error::Result;

/// Status of one crawl-history row (spec §3 "Crawl history record").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlStatus {
    ToCrawl,
    Crawling,
    Crawled,
    CrawlError,
    CrawlLink,
}

impl CrawlStatus {
    fn as_str(self) -> &'static str {
        match self {
            CrawlStatus::ToCrawl => "TO_CRAWL",
            CrawlStatus::Crawling => "CRAWLING",
            CrawlStatus::Crawled => "CRAWLED",
            CrawlStatus::CrawlError => "CRAWL_ERROR",
            CrawlStatus::CrawlLink => "CRAWL_LINK",
        }
    }

    fn parse(value: &str) -> CrawlStatus {
        match value {
            "CRAWLING" => CrawlStatus::Crawling,
            "CRAWLED" => CrawlStatus::Crawled,
            "CRAWL_ERROR" => CrawlStatus::CrawlError,
            "CRAWL_LINK" => CrawlStatus::CrawlLink,
            _ => CrawlStatus::ToCrawl,
        }
    }
}

/// One crawl-history row.
#[derive(Debug, Clone)]
pub struct CrawlItem {
    pub url: String,
    pub source_id: String,
    pub status: CrawlStatus,
    pub last_seen_time: i64,
    pub error_code: i32,
}

/// An action queued for the index writer (spec §3 "Action queue record").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Index,
    Unindex,
}

impl ActionKind {
    fn as_str(self) -> &'static str {
        match self {
            ActionKind::Index => "INDEX",
            ActionKind::Unindex => "UNINDEX",
        }
    }

    fn parse(value: &str) -> ActionKind {
        match value {
            "UNINDEX" => ActionKind::Unindex,
            _ => ActionKind::Index,
        }
    }
}

/// One popped/pushed action-queue entry.
#[derive(Debug, Clone)]
pub struct QueuedAction {
    pub url: String,
    pub action: ActionKind,
    pub enqueued_time: i64,
    pub document_info: Option<DocumentInfo>,
}

/// What a metadata-backup record carries, as a selector bitmask (spec §3
/// "Metadata backup record").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupSelector {
    Fields,
    Labels,
    All,
}

impl BackupSelector {
    fn as_str(self) -> &'static str {
        match self {
            BackupSelector::Fields => "FIELDS",
            BackupSelector::Labels => "LABELS",
            BackupSelector::All => "ALL",
        }
    }

    fn parse(value: &str) -> BackupSelector {
        match value {
            "LABELS" => BackupSelector::Labels,
            "ALL" => BackupSelector::All,
            _ => BackupSelector::Fields,
        }
    }
}

/// SQLite-backed crawl history, action queue, and metadata backup store.
pub struct History {
    db_path: PathBuf,
}

impl History {
    /// Opens (creating if absent) the history database at `path` and
    /// ensures its schema exists.
    pub fn open(path: &Path) -> Result<History> {
        let history = History { db_path: path.to_path_buf() };
        history.init_schema()?;
        Ok(history)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 30000;
            "#,
        )?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_history (
                url TEXT NOT NULL,
                source_id TEXT NOT NULL,
                status TEXT NOT NULL,
                last_seen_time INTEGER NOT NULL,
                error_code INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (source_id, url)
            );
            CREATE INDEX IF NOT EXISTS crawl_history_source_status
                ON crawl_history (source_id, status);

            CREATE TABLE IF NOT EXISTS action_queue (
                queue_id TEXT NOT NULL,
                url TEXT NOT NULL,
                action TEXT NOT NULL,
                enqueued_time INTEGER NOT NULL,
                document_info TEXT,
                PRIMARY KEY (queue_id, url)
            );

            CREATE TABLE IF NOT EXISTS metadata_backup (
                url TEXT NOT NULL PRIMARY KEY,
                kind TEXT NOT NULL,
                serialized_value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    // ---- Crawl history -------------------------------------------------

    /// Whether a crawl-history row exists for `url` under `source_id`.
    pub fn has_item(&self, source_id: &str, url: &str) -> Result<bool> {
        let conn = self.connect()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM crawl_history WHERE source_id = ?1 AND url = ?2",
                params![source_id, url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    /// Inserts or replaces a crawl-history row.
    pub fn insert_item(&self, item: &CrawlItem) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO crawl_history (url, source_id, status, last_seen_time, error_code)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(source_id, url) DO UPDATE SET
                status = excluded.status,
                last_seen_time = excluded.last_seen_time,
                error_code = excluded.error_code",
            params![item.url, item.source_id, item.status.as_str(), item.last_seen_time, item.error_code],
        )?;
        Ok(())
    }

    /// Updates the status/seen-time/error-code of an existing row, or
    /// inserts it if absent.
    pub fn update_item(&self, item: &CrawlItem) -> Result<()> {
        self.insert_item(item)
    }

    /// Looks up a single crawl-history row.
    pub fn get_item(&self, source_id: &str, url: &str) -> Result<Option<CrawlItem>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT url, source_id, status, last_seen_time, error_code
                 FROM crawl_history WHERE source_id = ?1 AND url = ?2",
                params![source_id, url],
                |row| {
                    Ok(CrawlItem {
                        url: row.get(0)?,
                        source_id: row.get(1)?,
                        status: CrawlStatus::parse(&row.get::<_, String>(2)?),
                        last_seen_time: row.get(3)?,
                        error_code: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Deletes a single crawl-history row.
    pub fn delete_item(&self, source_id: &str, url: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM crawl_history WHERE source_id = ?1 AND url = ?2",
            params![source_id, url],
        )?;
        Ok(())
    }

    /// Deletes every row under `source_id` with the given `status`, used
    /// after a full scan to drop entries left `TO_CRAWL` (spec §4.7).
    pub fn delete_items_by_status(&self, source_id: &str, status: CrawlStatus) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM crawl_history WHERE source_id = ?1 AND status = ?2",
            params![source_id, status.as_str()],
        )?;
        Ok(removed)
    }

    /// Resets every row under `source_id` to `TO_CRAWL`, the start of a
    /// full scan (spec §4.7).
    pub fn reset_source_to_crawl(&self, source_id: &str) -> Result<usize> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE crawl_history SET status = ?2 WHERE source_id = ?1",
            params![source_id, CrawlStatus::ToCrawl.as_str()],
        )?;
        Ok(updated)
    }

    /// Pages through crawl-history rows for `source_id`, optionally
    /// filtered by `status`, `page_size` rows starting at `offset`.
    pub fn get_source_items(
        &self,
        source_id: &str,
        status: Option<CrawlStatus>,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<CrawlItem>> {
        let conn = self.connect()?;
        // A single query shape regardless of `status` so the bound parameter
        // count always matches the placeholders actually referenced.
        let mut stmt = conn.prepare(
            "SELECT url, source_id, status, last_seen_time, error_code
             FROM crawl_history WHERE source_id = ?1 AND (?2 = '' OR status = ?2)
             ORDER BY url LIMIT ?3 OFFSET ?4",
        )?;

        let status_str = status.map(|s| s.as_str()).unwrap_or("");
        let rows = stmt.query_map(
            params![source_id, status_str, page_size as i64, offset as i64],
            |row| {
                Ok(CrawlItem {
                    url: row.get(0)?,
                    source_id: row.get(1)?,
                    status: CrawlStatus::parse(&row.get::<_, String>(2)?),
                    last_seen_time: row.get(3)?,
                    error_code: row.get(4)?,
                })
            },
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Writes a batch of crawl-history rows in one transaction, amortizing
    /// SQL overhead for the scanner's 500-entry flush cadence (spec §4.7).
    pub fn flush_batch(&self, items: &[CrawlItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        for item in items {
            tx.execute(
                "INSERT INTO crawl_history (url, source_id, status, last_seen_time, error_code)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(source_id, url) DO UPDATE SET
                    status = excluded.status,
                    last_seen_time = excluded.last_seen_time,
                    error_code = excluded.error_code",
                params![item.url, item.source_id, item.status.as_str(), item.last_seen_time, item.error_code],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ---- Action queue ----------------------------------------------------

    /// Pushes an action; idempotent on `(queue_id, url)` (spec §4.8): a
    /// second push for the same key overwrites the action and timestamp.
    pub fn push(
        &self,
        queue_id: &str,
        url: &str,
        action: ActionKind,
        enqueued_time: i64,
        document_info: Option<&DocumentInfo>,
    ) -> Result<()> {
        let serialized = document_info.map(serde_json::to_string).transpose()?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO action_queue (queue_id, url, action, enqueued_time, document_info)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(queue_id, url) DO UPDATE SET
                action = excluded.action,
                enqueued_time = excluded.enqueued_time,
                document_info = excluded.document_info",
            params![queue_id, url, action.as_str(), enqueued_time, serialized],
        )?;
        Ok(())
    }

    /// Pops the most recently enqueued action across every url in
    /// `queue_id`, deleting it. `None` when the queue is empty. The queue
    /// is last-write-wins, not FIFO (spec §4.8, §5).
    pub fn pop(&self, queue_id: &str) -> Result<Option<QueuedAction>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let row: Option<(String, String, i64, Option<String>)> = tx
            .query_row(
                "SELECT url, action, enqueued_time, document_info FROM action_queue
                 WHERE queue_id = ?1 ORDER BY enqueued_time DESC LIMIT 1",
                params![queue_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((url, action, enqueued_time, document_info)) = row else {
            return Ok(None);
        };

        tx.execute(
            "DELETE FROM action_queue WHERE queue_id = ?1 AND url = ?2",
            params![queue_id, url],
        )?;
        tx.commit()?;

        let document_info = document_info
            .map(|s| serde_json::from_str(&s))
            .transpose()?;

        Ok(Some(QueuedAction {
            url,
            action: ActionKind::parse(&action),
            enqueued_time,
            document_info,
        }))
    }

    /// Deletes every action-queue row older than `older_than`.
    pub fn expire(&self, queue_id: &str, older_than: i64) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM action_queue WHERE queue_id = ?1 AND enqueued_time < ?2",
            params![queue_id, older_than],
        )?;
        Ok(removed)
    }

    // ---- Metadata backup ---------------------------------------------

    /// Backs up `info` under `url`, tagged with what it represents, so a
    /// later reindex can restore user-set title/labels (spec §3, §4.7).
    pub fn backup_metadata(&self, url: &str, selector: BackupSelector, info: &DocumentInfo) -> Result<()> {
        let serialized = serde_json::to_string(info)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO metadata_backup (url, kind, serialized_value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET
                kind = excluded.kind,
                serialized_value = excluded.serialized_value",
            params![url, selector.as_str(), serialized],
        )?;
        Ok(())
    }

    /// Looks up a single metadata-backup record.
    pub fn get_metadata_backup(&self, url: &str) -> Result<Option<(BackupSelector, DocumentInfo)>> {
        let conn = self.connect()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT kind, serialized_value FROM metadata_backup WHERE url = ?1",
                params![url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((kind, serialized)) => {
                let info: DocumentInfo = serde_json::from_str(&serialized)?;
                Ok(Some((BackupSelector::parse(&kind), info)))
            }
            None => Ok(None),
        }
    }

    /// Pages through every metadata-backup record, `page_size` rows at a
    /// time (spec §4.7 "Reindex mode": "100 rows at a time").
    pub fn list_metadata_backups(
        &self,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<(String, BackupSelector, DocumentInfo)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT url, kind, serialized_value FROM metadata_backup
             ORDER BY url LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![page_size as i64, offset as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut backups = Vec::new();
        for row in rows {
            let (url, kind, serialized) = row?;
            let info: DocumentInfo = serde_json::from_str(&serialized)?;
            backups.push((url, BackupSelector::parse(&kind), info));
        }
        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> (tempfile::TempDir, History) {
        let dir = tempfile::tempdir().unwrap();
        let history = History::open(&dir.path().join("history")).unwrap();
        (dir, history)
    }

    fn item(url: &str, status: CrawlStatus) -> CrawlItem {
        CrawlItem {
            url: url.to_string(),
            source_id: "root".to_string(),
            status,
            last_seen_time: 1000,
            error_code: 0,
        }
    }

    #[test]
    fn insert_and_has_item_round_trip() {
        let (_dir, history) = history();
        assert!(!history.has_item("root", "file:///a.txt").unwrap());
        history.insert_item(&item("file:///a.txt", CrawlStatus::Crawled)).unwrap();
        assert!(history.has_item("root", "file:///a.txt").unwrap());
    }

    #[test]
    fn update_item_overwrites_status() {
        let (_dir, history) = history();
        history.insert_item(&item("file:///a.txt", CrawlStatus::ToCrawl)).unwrap();
        history.update_item(&item("file:///a.txt", CrawlStatus::Crawled)).unwrap();
        let got = history.get_item("root", "file:///a.txt").unwrap().unwrap();
        assert_eq!(got.status, CrawlStatus::Crawled);
    }

    #[test]
    fn delete_items_by_status_removes_only_matching_rows() {
        let (_dir, history) = history();
        history.insert_item(&item("file:///a.txt", CrawlStatus::ToCrawl)).unwrap();
        history.insert_item(&item("file:///b.txt", CrawlStatus::Crawled)).unwrap();

        let removed = history.delete_items_by_status("root", CrawlStatus::ToCrawl).unwrap();
        assert_eq!(removed, 1);
        assert!(!history.has_item("root", "file:///a.txt").unwrap());
        assert!(history.has_item("root", "file:///b.txt").unwrap());
    }

    #[test]
    fn get_source_items_paginates() {
        let (_dir, history) = history();
        for i in 0..5 {
            history
                .insert_item(&item(&format!("file:///{i}.txt"), CrawlStatus::Crawled))
                .unwrap();
        }
        let page = history.get_source_items("root", Some(CrawlStatus::Crawled), 0, 2).unwrap();
        assert_eq!(page.len(), 2);
        let page2 = history.get_source_items("root", Some(CrawlStatus::Crawled), 2, 2).unwrap();
        assert_eq!(page2.len(), 2);
    }

    #[test]
    fn push_is_idempotent_and_overwrites() {
        let (_dir, history) = history();
        history.push("q", "file:///a.txt", ActionKind::Index, 100, None).unwrap();
        history.push("q", "file:///a.txt", ActionKind::Unindex, 200, None).unwrap();

        let popped = history.pop("q").unwrap().unwrap();
        assert_eq!(popped.action, ActionKind::Unindex);
        assert_eq!(popped.enqueued_time, 200);
        assert!(history.pop("q").unwrap().is_none());
    }

    #[test]
    fn pop_returns_most_recently_enqueued_across_urls() {
        let (_dir, history) = history();
        history.push("q", "file:///a.txt", ActionKind::Index, 100, None).unwrap();
        history.push("q", "file:///b.txt", ActionKind::Index, 300, None).unwrap();
        history.push("q", "file:///c.txt", ActionKind::Index, 200, None).unwrap();

        let popped = history.pop("q").unwrap().unwrap();
        assert_eq!(popped.url, "file:///b.txt");
    }

    #[test]
    fn expire_deletes_rows_older_than_cutoff() {
        let (_dir, history) = history();
        history.push("q", "file:///old.txt", ActionKind::Index, 100, None).unwrap();
        history.push("q", "file:///new.txt", ActionKind::Index, 500, None).unwrap();

        let removed = history.expire("q", 300).unwrap();
        assert_eq!(removed, 1);
        let popped = history.pop("q").unwrap().unwrap();
        assert_eq!(popped.url, "file:///new.txt");
    }

    #[test]
    fn metadata_backup_round_trips() {
        let (_dir, history) = history();
        let mut info = DocumentInfo::new();
        info.location = "file:///a.txt".to_string();
        info.title = "My title".to_string();
        info.labels = vec!["fav".to_string()];

        history.backup_metadata("file:///a.txt", BackupSelector::All, &info).unwrap();
        let (selector, restored) = history.get_metadata_backup("file:///a.txt").unwrap().unwrap();
        assert_eq!(selector, BackupSelector::All);
        assert_eq!(restored.title, "My title");
        assert_eq!(restored.labels, vec!["fav".to_string()]);
    }

    #[test]
    fn list_metadata_backups_paginates() {
        let (_dir, history) = history();
        for i in 0..3 {
            let mut info = DocumentInfo::new();
            info.location = format!("file:///{i}.txt");
            history
                .backup_metadata(&info.location.clone(), BackupSelector::Fields, &info)
                .unwrap();
        }
        let page = history.list_metadata_backups(0, 2).unwrap();
        assert_eq!(page.len(), 2);
        let page2 = history.list_metadata_backups(2, 2).unwrap();
        assert_eq!(page2.len(), 1);
    }
}
