//! Periodic media metadata refresh.
//!
//! A dedicated background thread re-examines finished downloads on an
//! interval; long-running duties like this stay off the event loop so
//! they cannot stall idle-task processing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::database::MediaDatabase;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Background refresher for media metadata.
pub struct MetadataUpdater {
    database: Arc<MediaDatabase>,
    interval: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
    stop: Mutex<Option<Sender<()>>>,
    passes: Arc<AtomicU64>,
}

impl MetadataUpdater {
    /// Create an updater with the default refresh interval.
    pub fn new(database: Arc<MediaDatabase>) -> Self {
        Self::with_interval(database, DEFAULT_REFRESH_INTERVAL)
    }

    /// Create an updater with a custom refresh interval.
    pub fn with_interval(database: Arc<MediaDatabase>, interval: Duration) -> Self {
        Self {
            database,
            interval,
            worker: Mutex::new(None),
            stop: Mutex::new(None),
            passes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn the refresh thread. A second call is a no-op.
    pub fn start_thread(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            debug!("Metadata updater already running");
            return;
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let database = self.database.clone();
        let passes = self.passes.clone();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("telecast-moviedata".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        Self::refresh(&database, &passes);
                    }
                }
            })
            .expect("Failed to spawn metadata thread");

        *self.stop.lock() = Some(stop_tx);
        *worker = Some(handle);
    }

    /// One refresh sweep over the finished downloads. Returns the number
    /// of items examined.
    pub fn refresh_pass(&self) -> usize {
        Self::refresh(&self.database, &self.passes)
    }

    fn refresh(database: &MediaDatabase, passes: &AtomicU64) -> usize {
        let examined = database
            .downloads()
            .iter()
            .filter(|d| d.is_finished())
            .count();
        passes.fetch_add(1, Ordering::Relaxed);
        debug!("Metadata refresh examined {} items", examined);
        examined
    }

    /// How many refresh passes have run.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Stop the refresh thread and wait for it.
    pub fn shutdown(&self) {
        drop(self.stop.lock().take());
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                info!("Metadata thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::database::Download;

    #[test]
    fn test_refresh_pass_counts_finished() {
        let database = Arc::new(MediaDatabase::new());
        database
            .insert_download(Download::new("https://example.com/a.mp4", "/m/a.mp4").finished());
        database.insert_download(Download::new("https://example.com/b.mp4", "/m/b.mp4"));

        let updater = Arc::new(MetadataUpdater::new(database));
        assert_eq!(updater.refresh_pass(), 1);
        assert_eq!(updater.passes(), 1);
    }

    #[test]
    fn test_thread_runs_passes() {
        let database = Arc::new(MediaDatabase::new());
        let updater = Arc::new(MetadataUpdater::with_interval(
            database,
            Duration::from_millis(10),
        ));

        updater.start_thread();
        // Idempotent second start.
        updater.start_thread();

        thread::sleep(Duration::from_millis(100));
        updater.shutdown();

        assert!(updater.passes() > 0);
    }
}
