//! The startup sequencer.
//!
//! Brings the backend from process start to "ready to serve the user" in
//! a fixed phase order. Frontends should do the following to handle
//! startup:
//!
//! - (optional) call [`StartupSequencer::install_movies_gone_handler`]
//! - call [`StartupSequencer::initialize`], then
//!   [`StartupSequencer::startup`]
//! - wait for either the startup-success or startup-failure signal
//!
//! Phase 2 (`finish_startup`) and phase 3 (`finalize_startup`) run on the
//! event loop thread. Any failure in either phase is translated into
//! exactly one failure signal rather than a raised fault, so frontends
//! have exactly two outcomes to wait for.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{ensure, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use telecast_core::error::DatabaseError;
use telecast_core::prefs::{self, Pref};

use crate::config::PrefStore;
use crate::logging;
use crate::media::database::{Feed, MediaDatabase, TabCategory};
use crate::media::downloader::DownloadManager;
use crate::media::iconcache::IconCache;
use crate::media::metadata::MetadataUpdater;
use crate::services::messages::{BackendMessageHandler, MessageHub};
use crate::services::search::SearchEngineRegistry;
use crate::services::theme::ThemeHistory;
use crate::system::eventloop::EventLoop;
use crate::system::signals::SystemSignals;

/// Errors a startup phase can produce.
///
/// Phase functions raise `Structured` for expected failure cases; anything
/// else is wrapped as `Internal` and reported as an unknown error.
#[derive(Debug, Error)]
pub enum StartupError {
    /// An expected failure with a localized summary and description,
    /// delivered verbatim on the failure signal.
    #[error("{summary}: {description}")]
    Structured { summary: String, description: String },

    /// Any unanticipated fault.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Handler invoked when the movies directory appears missing.
pub type MoviesGoneHandler = Arc<dyn Fn() + Send + Sync>;

/// The five built-in global feeds re-seeded at every startup.
const GLOBAL_FEEDS: &[(&str, bool)] = &[
    ("telecast:manualFeed", false),
    ("telecast:singleFeed", false),
    ("telecast:search", false),
    ("telecast:searchDownloads", true),
    ("telecast:directoryFeed", true),
];

/// Ordered, fault-translating bootstrap for the Telecast backend.
pub struct StartupSequencer {
    store: Arc<PrefStore>,
    signals: Arc<SystemSignals>,
    event_loop: Arc<EventLoop>,
    database: Arc<MediaDatabase>,
    downloader: Arc<DownloadManager>,
    metadata: Arc<MetadataUpdater>,
    icon_cache: Arc<IconCache>,
    search: Arc<SearchEngineRegistry>,
    messages: Arc<MessageHub>,

    theme_history: OnceCell<Arc<ThemeHistory>>,
    movies_gone_handler: Mutex<Option<MoviesGoneHandler>>,
    pending_args: Mutex<Vec<String>>,
    initialized: AtomicBool,
}

impl StartupSequencer {
    /// Wire the sequencer to its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<PrefStore>,
        signals: Arc<SystemSignals>,
        event_loop: Arc<EventLoop>,
        database: Arc<MediaDatabase>,
        downloader: Arc<DownloadManager>,
        metadata: Arc<MetadataUpdater>,
        icon_cache: Arc<IconCache>,
        search: Arc<SearchEngineRegistry>,
        messages: Arc<MessageHub>,
    ) -> Self {
        Self {
            store,
            signals,
            event_loop,
            database,
            downloader,
            metadata,
            icon_cache,
            search,
            messages,
            theme_history: OnceCell::new(),
            movies_gone_handler: Mutex::new(None),
            pending_args: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Initialize the backend: logging, the database handle, and the
    /// configuration for the given theme. Must be called before
    /// [`StartupSequencer::startup`]. Errors here are fatal and are not
    /// translated into failure signals.
    pub fn initialize(&self, theme: Option<&str>) -> Result<()> {
        logging::setup();

        if let Some(db_path) = self.store.get(&prefs::DB_PATHNAME).as_path() {
            self.database.set_path(db_path);
        }

        self.store.load();
        if let Some(theme) = theme {
            self.store.set(&prefs::THEME_NAME, theme.into())?;
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!("Initialized {}", self.pref_text(&prefs::SHORT_APP_NAME));
        Ok(())
    }

    /// Start the backend: log the diagnostic banner, start the event loop
    /// thread, and schedule the rest of startup to run on it. Returns
    /// immediately; wait for the success or failure signal.
    pub fn startup(self: Arc<Self>) -> Result<()> {
        ensure!(
            self.initialized.load(Ordering::SeqCst),
            "initialize() must be called before startup()"
        );

        info!("Starting up {}", self.pref_text(&prefs::LONG_APP_NAME));
        info!("Version:    {}", self.pref_text(&prefs::APP_VERSION));
        info!(
            "OS:         {} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        info!("Revision:   {}", self.pref_text(&prefs::APP_REVISION));
        info!("Builder:    {}", self.pref_text(&prefs::BUILD_MACHINE));
        info!("Build Time: {}", self.pref_text(&prefs::BUILD_TIME));

        let database = self.database.clone();
        self.event_loop
            .on_thread_started(move |thread_id| database.bind_thread(thread_id));

        info!("Starting event loop thread");
        self.event_loop.startup();

        let this = Arc::clone(&self);
        self.event_loop
            .add_idle(move || this.finish_startup(), "finish startup")?;
        Ok(())
    }

    /// Phase 2: restore the database and check the movies directory.
    /// Failures are translated into a single failure signal.
    pub fn finish_startup(self: Arc<Self>) {
        let this = Arc::clone(&self);
        self.run_phase("finish startup", move || this.finish_startup_phase());
    }

    /// Phase 3: bring the remaining subsystems online and announce
    /// success. Failures are translated into a single failure signal.
    pub fn finalize_startup(self: Arc<Self>) {
        let this = Arc::clone(&self);
        self.run_phase("finalize startup", move || this.finalize_startup_phase());
    }

    /// Replace the handler invoked when the movies directory appears
    /// missing. By default the check fails startup; a frontend wanting to
    /// offer a degraded continuation installs its own handler and calls
    /// [`StartupSequencer::finalize_startup`] itself. Must be installed
    /// before the check fires.
    pub fn install_movies_gone_handler(&self, handler: MoviesGoneHandler) {
        *self.movies_gone_handler.lock() = Some(handler);
    }

    /// Queue raw command-line arguments; they are parsed on the event
    /// loop after startup succeeds.
    pub fn queue_command_line_args(&self, args: Vec<String>) {
        self.pending_args.lock().extend(args);
    }

    /// The theme history, once phase 3 has materialized it.
    pub fn theme_history(&self) -> Option<Arc<ThemeHistory>> {
        self.theme_history.get().cloned()
    }

    /// Run a phase, translating any error into exactly one failure
    /// signal: structured errors verbatim, everything else as a generic
    /// unknown-error report.
    fn run_phase<F>(&self, name: &str, phase: F)
    where
        F: FnOnce() -> std::result::Result<(), StartupError>,
    {
        match phase() {
            Ok(()) => {}
            Err(StartupError::Structured {
                summary,
                description,
            }) => {
                self.signals.startup_failure(&summary, &description);
            }
            Err(StartupError::Internal(e)) => {
                warn!("Unknown error during {}: {:?}", name, e);
                let app = self.pref_text(&prefs::SHORT_APP_NAME);
                let url = self.pref_text(&prefs::BUG_REPORT_URL);
                self.signals.startup_failure(
                    "Unknown Error",
                    &format!(
                        "An unknown error prevented {} from starting up. \
                         Please file a bug report at {}.",
                        app, url
                    ),
                );
            }
        }
    }

    fn finish_startup_phase(self: Arc<Self>) -> std::result::Result<(), StartupError> {
        self.database.initialize_views();

        info!("Restoring database...");
        if let Err(e) = self.database.restore() {
            return Err(match e {
                DatabaseError::TooNew { .. } => {
                    let app = self.pref_text(&prefs::SHORT_APP_NAME);
                    StartupError::Structured {
                        summary: "Database too new".to_string(),
                        description: format!(
                            "You have a database that was saved with a newer version of \
                             {app}. You must download the latest version of {app} and \
                             run that."
                        ),
                    }
                }
                other => StartupError::Internal(other.into()),
            });
        }
        self.database.recompute_filters();

        if self.movies_directory_gone() {
            match self.movies_gone_handler.lock().clone() {
                Some(handler) => handler(),
                None => self.default_movies_gone(),
            }
        } else {
            let this = Arc::clone(&self);
            self.event_loop
                .add_urgent(move || this.finalize_startup(), "finalizing startup")
                .map_err(|e| StartupError::Internal(e.into()))?;
        }
        Ok(())
    }

    fn finalize_startup_phase(self: Arc<Self>) -> std::result::Result<(), StartupError> {
        self.downloader.startup()?;

        self.setup_global_feeds();
        self.setup_tabs();
        self.search.create_engines();
        self.setup_theme();
        self.messages
            .install_handler(Arc::new(BackendMessageHandler::new(
                self.database.clone(),
                self.search.clone(),
            )));

        info!("Spawning auto downloader...");
        self.downloader.start_daemon();
        self.downloader.reconnect_in_flight();

        let days = self
            .store
            .get(&prefs::EXPIRE_AFTER_X_DAYS)
            .as_integer()
            .unwrap_or(7);
        self.downloader.expire_items(days);

        let live: HashSet<String> = self
            .database
            .feeds()
            .iter()
            .map(|f| f.id.to_string())
            .collect();
        let sweep_start = Instant::now();
        match self.icon_cache.clear_orphans(&live) {
            Ok(removed) => info!(
                "Icon clear: {:.3}s, {} orphans removed",
                sweep_start.elapsed().as_secs_f64(),
                removed
            ),
            Err(e) => warn!("Icon clear failed: {}", e),
        }

        info!("Starting movie data updates");
        self.metadata.start_thread();

        self.signals.startup_success();

        let this = Arc::clone(&self);
        self.event_loop
            .add_idle(
                move || this.parse_command_line_args(),
                "parsing command line args",
            )
            .map_err(|e| StartupError::Internal(e.into()))?;
        Ok(())
    }

    /// Check whether the configured movies directory is missing.
    ///
    /// A directory with any contents is present. An empty directory is
    /// present only when no completed download was ever rooted there; an
    /// empty directory that previously received downloads most likely
    /// means a disconnected external drive.
    pub fn movies_directory_gone(&self) -> bool {
        let Some(movies_dir) = self.store.get(&prefs::MOVIES_DIRECTORY).as_path() else {
            warn!("No movies directory configured");
            return true;
        };
        let movies_dir = absolutize(movies_dir);
        info!("Checking movies directory {:?}...", movies_dir);

        let entries = match fs::read_dir(&movies_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Movies directory unreadable: {}", e);
                return true;
            }
        };
        if entries.count() > 0 {
            return false;
        }

        // Empty: present only if nothing was ever downloaded into it.
        let has_completed_here = self
            .downloader
            .completed()
            .iter()
            .any(|d| d.destination_path().starts_with(&movies_dir));
        !has_completed_here
    }

    fn default_movies_gone(&self) {
        let app = self.pref_text(&prefs::SHORT_APP_NAME);
        let movies_dir = self.store.get(&prefs::MOVIES_DIRECTORY);
        self.signals.startup_failure(
            "Video Directory Missing",
            &format!(
                "{app} can't find your primary video directory {movies_dir}. This may \
                 be because it's located on an external drive that is currently \
                 disconnected. Please connect the drive or create the directory, \
                 then start {app} again."
            ),
        );
    }

    fn setup_global_feeds(&self) {
        for (url, auto_downloadable) in GLOBAL_FEEDS {
            self.setup_global_feed(url, *auto_downloadable);
        }
    }

    /// Ensure exactly one feed row exists for a built-in URL. Missing rows
    /// are created; extra rows are a data-integrity problem that is
    /// repaired in place and reported as a system warning.
    fn setup_global_feed(&self, url: &str, auto_downloadable: bool) {
        let existing = self.database.feeds_by_url(url);
        if existing.is_empty() {
            info!("Spawning global feed {}", url);
            self.database.insert_feed(Feed::new(url, auto_downloadable));
        } else if existing.len() > 1 {
            let removed = self.database.prune_duplicate_feeds(url);
            debug!("Pruned {} duplicate rows for {}", removed, url);
            self.signals
                .failed(&format!("Too many db objects for {}", url));
        }
    }

    fn setup_tabs(&self) {
        for category in [TabCategory::Site, TabCategory::Channel, TabCategory::Playlist] {
            if self.database.ensure_tab_order(category) {
                info!("Creating {} tab order", category);
            }
        }
    }

    fn setup_theme(&self) {
        let history = self
            .theme_history
            .get_or_init(|| Arc::new(ThemeHistory::new()));
        let theme = self.store.get(&prefs::THEME_NAME);
        history.check_new_theme(theme.as_str());
    }

    /// Parse queued command-line arguments: feed URLs are subscribed,
    /// anything else is ignored with a log line.
    pub fn parse_command_line_args(&self) {
        let args: Vec<String> = std::mem::take(&mut *self.pending_args.lock());
        for arg in args {
            let is_feed_url = arg.starts_with("http://")
                || arg.starts_with("https://")
                || arg.starts_with("telecast:");
            if is_feed_url {
                if self.database.feeds_by_url(&arg).is_empty() {
                    info!("Subscribing to feed from command line: {}", arg);
                    self.database.insert_feed(Feed::new(arg, true));
                }
            } else {
                warn!("Ignoring unrecognized command line argument: {}", arg);
            }
        }
    }

    fn pref_text(&self, pref: &Pref) -> String {
        self.store
            .get(pref)
            .as_str()
            .unwrap_or("unknown")
            .to_string()
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}
