//! Frontend-to-backend message bridge.
//!
//! Frontends post [`BackendMessage`]s to the hub; the installed handler
//! services them on the backend side. Startup installs the default
//! [`BackendMessageHandler`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::media::database::MediaDatabase;
use crate::services::search::SearchEngineRegistry;

/// Messages a frontend can send to the backend.
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// Begin tracking feed changes for the frontend.
    TrackFeeds,

    /// Run a search through the named engine.
    Search { engine: String, terms: String },

    /// Subscribe to the feed at the given URL.
    SubscribeFeed { url: String },
}

/// Handler servicing backend messages.
pub trait MessageHandler: Send + Sync {
    /// Service one message.
    fn handle(&self, message: BackendMessage);
}

/// Dispatch point between frontends and the installed handler.
pub struct MessageHub {
    handler: Mutex<Option<Arc<dyn MessageHandler>>>,
}

impl MessageHub {
    /// Create a hub with no handler installed.
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(None),
        }
    }

    /// Install the handler, replacing any previous one.
    pub fn install_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.handler.lock() = Some(handler);
    }

    /// Whether a handler is installed.
    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Dispatch a message to the installed handler. Returns `false` if no
    /// handler was installed.
    pub fn dispatch(&self, message: BackendMessage) -> bool {
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => {
                handler.handle(message);
                true
            }
            None => {
                warn!("Dropping message with no handler installed: {:?}", message);
                false
            }
        }
    }
}

impl Default for MessageHub {
    fn default() -> Self {
        Self::new()
    }
}

/// The backend's own message handler.
pub struct BackendMessageHandler {
    database: Arc<MediaDatabase>,
    search: Arc<SearchEngineRegistry>,
}

impl BackendMessageHandler {
    /// Create the handler over the backend services it drives.
    pub fn new(database: Arc<MediaDatabase>, search: Arc<SearchEngineRegistry>) -> Self {
        Self { database, search }
    }
}

impl MessageHandler for BackendMessageHandler {
    fn handle(&self, message: BackendMessage) {
        match message {
            BackendMessage::TrackFeeds => {
                debug!("Tracking {} feeds", self.database.feeds().len());
            }
            BackendMessage::Search { engine, terms } => {
                match self.search.search_url(&engine, &terms) {
                    Some(url) => debug!("Search via {}: {}", engine, url),
                    None => warn!("Search request for unknown engine {}", engine),
                }
            }
            BackendMessage::SubscribeFeed { url } => {
                if self.database.feeds_by_url(&url).is_empty() {
                    debug!("Subscribing to {}", url);
                    self.database
                        .insert_feed(crate::media::database::Feed::new(url, true));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_without_handler_is_dropped() {
        let hub = MessageHub::new();
        assert!(!hub.dispatch(BackendMessage::TrackFeeds));
    }

    #[test]
    fn test_backend_handler_subscribes_feeds() {
        let database = Arc::new(MediaDatabase::new());
        let search = Arc::new(SearchEngineRegistry::new());
        let hub = MessageHub::new();
        hub.install_handler(Arc::new(BackendMessageHandler::new(
            database.clone(),
            search,
        )));
        assert!(hub.has_handler());

        let url = "https://example.com/feed.rss";
        assert!(hub.dispatch(BackendMessage::SubscribeFeed {
            url: url.to_string()
        }));
        assert_eq!(database.feeds_by_url(url).len(), 1);

        // Subscribing again does not duplicate the feed.
        hub.dispatch(BackendMessage::SubscribeFeed {
            url: url.to_string(),
        });
        assert_eq!(database.feeds_by_url(url).len(), 1);
    }
}
