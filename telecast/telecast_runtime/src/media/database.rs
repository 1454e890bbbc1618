//! The media database service.
//!
//! Feeds, downloads, and tab orders live in in-memory tables restored
//! from a versioned JSON snapshot. A snapshot written by a newer build
//! fails restoration with `DatabaseError::TooNew`; the startup sequencer
//! translates that into a structured startup failure.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::ThreadId;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use telecast_core::error::DatabaseError;
use telecast_core::id::{DownloadId, FeedId, TabOrderId};

/// Snapshot format version this build reads and writes.
pub const FORMAT_VERSION: u32 = 2;

/// A subscribed feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: FeedId,
    pub url: String,
    pub auto_downloadable: bool,
    pub created_at: DateTime<Utc>,
}

impl Feed {
    /// Create a feed subscribed now.
    pub fn new(url: impl Into<String>, auto_downloadable: bool) -> Self {
        Self {
            id: FeedId::new(),
            url: url.into(),
            auto_downloadable,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle state of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    Queued,
    InFlight,
    Finished,
    Failed,
}

/// A tracked download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: DownloadId,
    pub feed_id: Option<FeedId>,
    pub url: String,
    pub destination: PathBuf,
    pub state: DownloadState,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Download {
    /// Create a queued download targeting the given destination file.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id: DownloadId::new(),
            feed_id: None,
            url: url.into(),
            destination: destination.into(),
            state: DownloadState::Queued,
            finished_at: None,
        }
    }

    /// Attach the download to a feed.
    pub fn with_feed(mut self, feed_id: FeedId) -> Self {
        self.feed_id = Some(feed_id);
        self
    }

    /// Mark the download finished now.
    pub fn finished(mut self) -> Self {
        self.state = DownloadState::Finished;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Whether the transfer completed.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, DownloadState::Finished)
    }

    /// Destination file path of the transfer.
    pub fn destination_path(&self) -> &Path {
        &self.destination
    }
}

/// The three fixed view categories with a canonical tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TabCategory {
    Site,
    Channel,
    Playlist,
}

impl fmt::Display for TabCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Site => write!(f, "site"),
            Self::Channel => write!(f, "channel"),
            Self::Playlist => write!(f, "playlist"),
        }
    }
}

/// Canonical ordering object for one view category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabOrder {
    pub id: TabOrderId,
    pub category: TabCategory,
    pub order: Vec<FeedId>,
}

impl TabOrder {
    fn new(category: TabCategory) -> Self {
        Self {
            id: TabOrderId::new(),
            category,
            order: Vec::new(),
        }
    }
}

/// On-disk snapshot shape.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    feeds: Vec<Feed>,
    #[serde(default)]
    downloads: Vec<Download>,
    #[serde(default)]
    tab_orders: Vec<TabOrder>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            feeds: Vec::new(),
            downloads: Vec::new(),
            tab_orders: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Tables {
    feeds: HashMap<FeedId, Feed>,
    feeds_by_url: HashMap<String, Vec<FeedId>>,
    downloads: HashMap<DownloadId, Download>,
    tab_orders: HashMap<TabCategory, TabOrder>,
    restored: bool,
}

impl Tables {
    fn rebuild_indices(&mut self) {
        self.feeds_by_url.clear();
        for feed in self.feeds.values() {
            self.feeds_by_url
                .entry(feed.url.clone())
                .or_default()
                .push(feed.id);
        }
    }
}

/// In-memory media database restored from a versioned snapshot.
pub struct MediaDatabase {
    path: Mutex<Option<PathBuf>>,
    tables: Mutex<Tables>,

    /// Thread the event loop binds for database access.
    access_thread: Mutex<Option<ThreadId>>,
}

impl MediaDatabase {
    /// Create an empty, un-restored database.
    pub fn new() -> Self {
        Self {
            path: Mutex::new(None),
            tables: Mutex::new(Tables::default()),
            access_thread: Mutex::new(None),
        }
    }

    /// Set the snapshot path restored by [`MediaDatabase::restore`].
    pub fn set_path(&self, path: impl Into<PathBuf>) {
        *self.path.lock() = Some(path.into());
    }

    /// Record the thread all database work is expected to run on.
    pub fn bind_thread(&self, thread_id: ThreadId) {
        debug!("Binding database access to {:?}", thread_id);
        *self.access_thread.lock() = Some(thread_id);
    }

    /// The bound database-access thread, if one was recorded.
    pub fn access_thread(&self) -> Option<ThreadId> {
        *self.access_thread.lock()
    }

    /// Prepare the in-memory views before a restore.
    pub fn initialize_views(&self) {
        debug!("Initializing database views");
        let mut tables = self.tables.lock();
        tables.feeds_by_url.clear();
    }

    /// Restore the tables from the configured snapshot. A missing file
    /// (or no configured path) starts a fresh database; a snapshot from a
    /// newer build fails with [`DatabaseError::TooNew`].
    pub fn restore(&self) -> Result<(), DatabaseError> {
        let path = self.path.lock().clone();

        let snapshot = match path {
            Some(ref p) if p.exists() => {
                let content = fs::read_to_string(p)?;
                let snapshot: Snapshot = serde_json::from_str(&content)
                    .map_err(|e| DatabaseError::Corrupt(e.to_string()))?;
                if snapshot.version > FORMAT_VERSION {
                    return Err(DatabaseError::TooNew {
                        version: snapshot.version,
                        supported: FORMAT_VERSION,
                    });
                }
                snapshot
            }
            _ => {
                info!("No saved database, starting fresh");
                Snapshot::default()
            }
        };

        let mut tables = self.tables.lock();
        tables.feeds = snapshot.feeds.into_iter().map(|f| (f.id, f)).collect();
        tables.downloads = snapshot
            .downloads
            .into_iter()
            .map(|d| (d.id, d))
            .collect();
        tables.tab_orders = snapshot
            .tab_orders
            .into_iter()
            .map(|t| (t.category, t))
            .collect();
        tables.rebuild_indices();
        tables.restored = true;

        info!(
            "Restored database: {} feeds, {} downloads",
            tables.feeds.len(),
            tables.downloads.len()
        );
        Ok(())
    }

    /// Whether a restore has completed.
    pub fn is_restored(&self) -> bool {
        self.tables.lock().restored
    }

    /// Rebuild the derived indices over the feed table.
    pub fn recompute_filters(&self) {
        let mut tables = self.tables.lock();
        tables.rebuild_indices();
        debug!(
            "Recomputed filters over {} feeds",
            tables.feeds.len()
        );
    }

    /// Feeds subscribed at the given URL.
    pub fn feeds_by_url(&self, url: &str) -> Vec<Feed> {
        let tables = self.tables.lock();
        tables
            .feeds_by_url
            .get(url)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.feeds.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All feeds.
    pub fn feeds(&self) -> Vec<Feed> {
        self.tables.lock().feeds.values().cloned().collect()
    }

    /// Insert a feed and index it.
    pub fn insert_feed(&self, feed: Feed) -> FeedId {
        let mut tables = self.tables.lock();
        let id = feed.id;
        tables
            .feeds_by_url
            .entry(feed.url.clone())
            .or_default()
            .push(id);
        tables.feeds.insert(id, feed);
        id
    }

    /// Remove duplicate feed rows for a URL, keeping the oldest. Returns
    /// the number of rows removed.
    pub fn prune_duplicate_feeds(&self, url: &str) -> usize {
        let mut tables = self.tables.lock();

        let mut matches: Vec<Feed> = tables
            .feeds
            .values()
            .filter(|f| f.url == url)
            .cloned()
            .collect();
        if matches.len() < 2 {
            return 0;
        }

        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let extras = &matches[1..];
        for extra in extras {
            tables.feeds.remove(&extra.id);
        }
        tables.rebuild_indices();
        extras.len()
    }

    /// Create the canonical tab order for a category if absent. The check
    /// and creation happen under one lock, so concurrent callers cannot
    /// both create. Returns `true` if this call created it.
    pub fn ensure_tab_order(&self, category: TabCategory) -> bool {
        let mut tables = self.tables.lock();
        if tables.tab_orders.contains_key(&category) {
            return false;
        }
        tables.tab_orders.insert(category, TabOrder::new(category));
        true
    }

    /// The canonical tab order for a category, if it exists.
    pub fn tab_order(&self, category: TabCategory) -> Option<TabOrder> {
        self.tables.lock().tab_orders.get(&category).cloned()
    }

    /// Insert a download.
    pub fn insert_download(&self, download: Download) -> DownloadId {
        let mut tables = self.tables.lock();
        let id = download.id;
        tables.downloads.insert(id, download);
        id
    }

    /// All downloads.
    pub fn downloads(&self) -> Vec<Download> {
        self.tables.lock().downloads.values().cloned().collect()
    }

    /// Update the state of a download; finishing stamps the completion
    /// time.
    pub fn update_download_state(&self, id: DownloadId, state: DownloadState) {
        let mut tables = self.tables.lock();
        if let Some(download) = tables.downloads.get_mut(&id) {
            download.state = state;
            if state == DownloadState::Finished && download.finished_at.is_none() {
                download.finished_at = Some(Utc::now());
            }
        }
    }

    /// Remove finished downloads completed before the cutoff. Returns the
    /// number removed.
    pub fn expire_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut tables = self.tables.lock();
        let before = tables.downloads.len();
        tables.downloads.retain(|_, d| {
            !(d.is_finished() && d.finished_at.map(|t| t < cutoff).unwrap_or(false))
        });
        before - tables.downloads.len()
    }
}

impl Default for MediaDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_snapshot(dir: &TempDir, snapshot: &Snapshot) -> PathBuf {
        let path = dir.path().join("telecast.db");
        fs::write(&path, serde_json::to_string(snapshot).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_restore_without_path_starts_fresh() {
        let db = MediaDatabase::new();
        db.restore().unwrap();
        assert!(db.is_restored());
        assert!(db.feeds().is_empty());
    }

    #[test]
    fn test_restore_reads_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = Snapshot {
            feeds: vec![Feed::new("https://example.com/feed.rss", true)],
            ..Default::default()
        };
        let path = write_snapshot(&dir, &snapshot);

        let db = MediaDatabase::new();
        db.set_path(path);
        db.restore().unwrap();

        assert_eq!(db.feeds().len(), 1);
        assert_eq!(db.feeds_by_url("https://example.com/feed.rss").len(), 1);
    }

    #[test]
    fn test_restore_rejects_newer_format() {
        let dir = TempDir::new().unwrap();
        let snapshot = Snapshot {
            version: FORMAT_VERSION + 1,
            ..Default::default()
        };
        let path = write_snapshot(&dir, &snapshot);

        let db = MediaDatabase::new();
        db.set_path(path);
        let err = db.restore().unwrap_err();
        assert!(matches!(err, DatabaseError::TooNew { .. }));
        assert!(!db.is_restored());
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telecast.db");
        fs::write(&path, "not a snapshot").unwrap();

        let db = MediaDatabase::new();
        db.set_path(path);
        assert!(matches!(
            db.restore().unwrap_err(),
            DatabaseError::Corrupt(_)
        ));
    }

    #[test]
    fn test_prune_duplicates_keeps_oldest() {
        let db = MediaDatabase::new();
        let first = Feed::new("telecast:manualFeed", false);
        let first_id = first.id;
        db.insert_feed(first);
        db.insert_feed(Feed::new("telecast:manualFeed", false));
        db.insert_feed(Feed::new("telecast:manualFeed", false));

        let removed = db.prune_duplicate_feeds("telecast:manualFeed");
        assert_eq!(removed, 2);

        let remaining = db.feeds_by_url("telecast:manualFeed");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first_id);
    }

    #[test]
    fn test_ensure_tab_order_creates_once() {
        let db = MediaDatabase::new();
        assert!(db.ensure_tab_order(TabCategory::Site));
        assert!(!db.ensure_tab_order(TabCategory::Site));
        assert!(db.tab_order(TabCategory::Site).is_some());
        assert!(db.tab_order(TabCategory::Playlist).is_none());
    }

    #[test]
    fn test_expire_finished_before() {
        let db = MediaDatabase::new();
        let old = Download::new("https://example.com/a.mp4", "/m/a.mp4").finished();
        let old_id = db.insert_download(old);
        {
            // Backdate the completion stamp.
            let mut tables = db.tables.lock();
            tables.downloads.get_mut(&old_id).unwrap().finished_at =
                Some(Utc::now() - chrono::Duration::days(30));
        }
        db.insert_download(Download::new("https://example.com/b.mp4", "/m/b.mp4").finished());
        db.insert_download(Download::new("https://example.com/c.mp4", "/m/c.mp4"));

        let removed = db.expire_finished_before(Utc::now() - chrono::Duration::days(7));
        assert_eq!(removed, 1);
        assert_eq!(db.downloads().len(), 2);
    }
}
