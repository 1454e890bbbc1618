//! Telecast Runtime - backend runtime for the Telecast media player
//!
//! This crate provides the main runtime components for the Telecast system:
//! the preference store with change notification, the cooperative event
//! loop, the signal bus, the phased startup sequencer, and the lifecycle
//! facades for the media subsystems the sequencer brings online.

pub mod config;
pub mod logging;
pub mod media;
pub mod services;
pub mod system;

use std::sync::Arc;

use anyhow::Result;

use config::{PlatformBackend, PrefStore};
use media::database::MediaDatabase;
use media::downloader::DownloadManager;
use media::iconcache::IconCache;
use media::metadata::MetadataUpdater;
use services::messages::MessageHub;
use services::search::SearchEngineRegistry;
use system::eventloop::EventLoop;
use system::signals::SystemSignals;
use system::startup::StartupSequencer;

use telecast_core::prefs;

/// Runtime facade that wires together the Telecast backend.
pub struct Runtime {
    /// Preference store with change notification
    pub store: Arc<PrefStore>,

    /// Signal bus frontends subscribe to
    pub signals: Arc<SystemSignals>,

    /// Cooperative event loop the startup phases run on
    pub event_loop: Arc<EventLoop>,

    /// Media database service
    pub database: Arc<MediaDatabase>,

    /// Download manager and auto-download daemon
    pub downloader: Arc<DownloadManager>,

    /// Periodic media metadata refresher
    pub metadata: Arc<MetadataUpdater>,

    /// Cached icon storage
    pub icon_cache: Arc<IconCache>,

    /// Built-in search engine registry
    pub search: Arc<SearchEngineRegistry>,

    /// Frontend-to-backend message bridge
    pub messages: Arc<MessageHub>,

    /// Startup sequencer driving all of the above
    pub startup: Arc<StartupSequencer>,
}

impl Runtime {
    /// Create a new Runtime instance around the given platform backend.
    pub fn new(backend: Arc<dyn PlatformBackend>) -> Result<Self> {
        let store = Arc::new(PrefStore::new(backend));
        let signals = Arc::new(SystemSignals::new());
        let event_loop = Arc::new(EventLoop::new());
        let database = Arc::new(MediaDatabase::new());

        let downloader = Arc::new(DownloadManager::new(database.clone(), store.clone()));
        let metadata = Arc::new(MetadataUpdater::new(database.clone()));

        let icon_dir = store
            .get(&prefs::SUPPORT_DIRECTORY)
            .as_path()
            .unwrap_or_else(|| std::env::temp_dir().join("telecast"))
            .join("icon-cache");
        let icon_cache = Arc::new(IconCache::new(icon_dir));

        let search = Arc::new(SearchEngineRegistry::new());
        let messages = Arc::new(MessageHub::new());

        let startup = Arc::new(StartupSequencer::new(
            store.clone(),
            signals.clone(),
            event_loop.clone(),
            database.clone(),
            downloader.clone(),
            metadata.clone(),
            icon_cache.clone(),
            search.clone(),
            messages.clone(),
        ));

        Ok(Self {
            store,
            signals,
            event_loop,
            database,
            downloader,
            metadata,
            icon_cache,
            search,
            messages,
            startup,
        })
    }

    /// Initialize the backend. Must be called before [`Runtime::startup`].
    pub fn initialize(&self, theme: Option<&str>) -> Result<()> {
        self.startup.initialize(theme)
    }

    /// Start the backend. Frontends should then wait for either the
    /// startup-success or startup-failure signal.
    pub fn startup(&self) -> Result<()> {
        StartupSequencer::startup(self.startup.clone())
    }

    /// Stop the daemons and the event loop.
    pub fn shutdown(&self) {
        self.downloader.shutdown();
        self.metadata.shutdown();
        self.event_loop.shutdown();
    }
}
