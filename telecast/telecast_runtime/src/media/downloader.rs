//! The download manager.
//!
//! Owns the auto-download daemon thread, reconnects in-flight downloads
//! after a restart, and expires stale finished items per the expiration
//! preference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{ensure, Result};
use chrono::Utc;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use telecast_core::prefs;

use super::database::{Download, DownloadState, MediaDatabase};
use crate::config::PrefStore;

const DAEMON_TICK: Duration = Duration::from_millis(250);

/// Manager for downloads and the background auto-download daemon.
pub struct DownloadManager {
    database: Arc<MediaDatabase>,
    store: Arc<PrefStore>,
    started: AtomicBool,
    daemon: Mutex<Option<JoinHandle<()>>>,
    daemon_stop: Mutex<Option<Sender<()>>>,
}

impl DownloadManager {
    /// Create a manager over the given database and preference store.
    pub fn new(database: Arc<MediaDatabase>, store: Arc<PrefStore>) -> Self {
        Self {
            database,
            store,
            started: AtomicBool::new(false),
            daemon: Mutex::new(None),
            daemon_stop: Mutex::new(None),
        }
    }

    /// Bring the manager online. Requires a restored database.
    pub fn startup(&self) -> Result<()> {
        ensure!(
            self.database.is_restored(),
            "download manager requires a restored database"
        );
        info!("Starting download manager");
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Whether [`DownloadManager::startup`] has run.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Spawn the auto-download daemon thread. A second call is a no-op.
    pub fn start_daemon(&self) {
        let mut daemon = self.daemon.lock();
        if daemon.is_some() {
            debug!("Auto downloader already running");
            return;
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let database = self.database.clone();
        let store = self.store.clone();

        let handle = thread::Builder::new()
            .name("telecast-autodler".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(DAEMON_TICK) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        Self::run_auto_pass(&database, &store);
                    }
                }
            })
            .expect("Failed to spawn auto downloader thread");

        *self.daemon_stop.lock() = Some(stop_tx);
        *daemon = Some(handle);
    }

    /// One scan of the queue: promote queued downloads from
    /// auto-downloadable feeds until the configured number of transfers
    /// is in flight. Returns how many were promoted.
    pub fn auto_download_pass(&self) -> usize {
        Self::run_auto_pass(&self.database, &self.store)
    }

    fn run_auto_pass(database: &MediaDatabase, store: &PrefStore) -> usize {
        let target = store
            .get(&prefs::DOWNLOADS_TARGET)
            .as_integer()
            .unwrap_or(3)
            .max(0) as usize;

        let downloads = database.downloads();
        let in_flight = downloads
            .iter()
            .filter(|d| d.state == DownloadState::InFlight)
            .count();
        if in_flight >= target {
            return 0;
        }

        let auto_feeds: std::collections::HashSet<_> = database
            .feeds()
            .into_iter()
            .filter(|f| f.auto_downloadable)
            .map(|f| f.id)
            .collect();

        let mut promoted = 0;
        for download in downloads {
            if in_flight + promoted >= target {
                break;
            }
            let eligible = download.state == DownloadState::Queued
                && download
                    .feed_id
                    .map(|id| auto_feeds.contains(&id))
                    .unwrap_or(false);
            if eligible {
                database.update_download_state(download.id, DownloadState::InFlight);
                promoted += 1;
            }
        }

        if promoted > 0 {
            debug!("Auto downloader promoted {} downloads", promoted);
        }
        promoted
    }

    /// Re-attach downloads that were in flight when the process last
    /// exited. Returns how many were reconnected.
    pub fn reconnect_in_flight(&self) -> usize {
        let count = self
            .database
            .downloads()
            .iter()
            .filter(|d| d.state == DownloadState::InFlight)
            .count();
        info!("Reconnecting {} in-flight downloads", count);
        count
    }

    /// Downloads whose transfer completed.
    pub fn completed(&self) -> Vec<Download> {
        self.database
            .downloads()
            .into_iter()
            .filter(Download::is_finished)
            .collect()
    }

    /// Remove finished downloads older than `days`. Returns how many were
    /// expired.
    pub fn expire_items(&self, days: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let expired = self.database.expire_finished_before(cutoff);
        if expired > 0 {
            info!("Expired {} stale downloads", expired);
        }
        expired
    }

    /// Stop the auto-download daemon and wait for it.
    pub fn shutdown(&self) {
        drop(self.daemon_stop.lock().take());
        if let Some(handle) = self.daemon.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryBackend;
    use crate::media::database::Feed;
    use telecast_core::prefs::PrefValue;

    fn manager() -> Arc<DownloadManager> {
        let database = Arc::new(MediaDatabase::new());
        let store = Arc::new(PrefStore::new(Arc::new(MemoryBackend::new())));
        Arc::new(DownloadManager::new(database, store))
    }

    #[test]
    fn test_startup_requires_restored_database() {
        let manager = manager();
        assert!(manager.startup().is_err());

        manager.database.restore().unwrap();
        manager.startup().unwrap();
        assert!(manager.is_started());
    }

    #[test]
    fn test_auto_download_pass_promotes_up_to_target() {
        let manager = manager();
        let feed_id = manager
            .database
            .insert_feed(Feed::new("https://example.com/auto.rss", true));

        for i in 0..5 {
            manager.database.insert_download(
                Download::new(
                    format!("https://example.com/{}.mp4", i),
                    format!("/m/{}.mp4", i),
                )
                .with_feed(feed_id),
            );
        }

        manager
            .store
            .set(&prefs::DOWNLOADS_TARGET, PrefValue::Integer(2))
            .unwrap();

        assert_eq!(manager.auto_download_pass(), 2);
        // Target reached; nothing further to promote.
        assert_eq!(manager.auto_download_pass(), 0);
    }

    #[test]
    fn test_auto_download_skips_manual_feeds() {
        let manager = manager();
        let feed_id = manager
            .database
            .insert_feed(Feed::new("telecast:manualFeed", false));
        manager.database.insert_download(
            Download::new("https://example.com/x.mp4", "/m/x.mp4").with_feed(feed_id),
        );

        assert_eq!(manager.auto_download_pass(), 0);
    }

    #[test]
    fn test_completed_lists_only_finished() {
        let manager = manager();
        manager
            .database
            .insert_download(Download::new("https://example.com/a.mp4", "/m/a.mp4").finished());
        manager
            .database
            .insert_download(Download::new("https://example.com/b.mp4", "/m/b.mp4"));

        let completed = manager.completed();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].is_finished());
    }

    #[test]
    fn test_daemon_starts_and_stops() {
        let manager = manager();
        manager.start_daemon();
        // Idempotent second start.
        manager.start_daemon();
        manager.shutdown();
        assert!(manager.daemon.lock().is_none());
    }
}
