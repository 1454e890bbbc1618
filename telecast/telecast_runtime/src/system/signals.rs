//! Signal bus for system-level notifications.
//!
//! Frontends subscribe here and wait for one of exactly two terminal
//! startup outcomes: a success signal, or a failure signal carrying a
//! human-readable summary and description. Non-fatal problems are
//! reported through the generic `failed` signal.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

/// Typed subscriber interface for system signals. All methods have empty
/// defaults so subscribers implement only what they care about.
pub trait SystemSubscriber: Send + Sync {
    /// Startup finished and the backend is ready.
    fn on_startup_success(&self) {}

    /// Startup failed with a localized summary and description.
    fn on_startup_failure(&self, summary: &str, description: &str) {
        let _ = (summary, description);
    }

    /// A non-fatal system problem was detected and repaired or ignored.
    fn on_failed(&self, message: &str) {
        let _ = message;
    }
}

/// Dispatches system signals synchronously to registered subscribers.
pub struct SystemSignals {
    subscribers: Mutex<Vec<Arc<dyn SystemSubscriber>>>,
}

impl SystemSignals {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a subscriber. Registering the same handle twice is a
    /// no-op.
    pub fn add_subscriber(&self, subscriber: Arc<dyn SystemSubscriber>) {
        let mut subscribers = self.subscribers.lock();
        if !subscribers.iter().any(|s| same_handle(s, &subscriber)) {
            subscribers.push(subscriber);
        }
    }

    /// Remove a subscriber; absent handles are a no-op.
    pub fn remove_subscriber(&self, subscriber: &Arc<dyn SystemSubscriber>) {
        self.subscribers
            .lock()
            .retain(|s| !same_handle(s, subscriber));
    }

    /// Announce that startup completed.
    pub fn startup_success(&self) {
        info!("Startup succeeded");
        for subscriber in self.snapshot() {
            subscriber.on_startup_success();
        }
    }

    /// Announce that startup failed.
    pub fn startup_failure(&self, summary: &str, description: &str) {
        warn!("Startup failed: {}: {}", summary, description);
        for subscriber in self.snapshot() {
            subscriber.on_startup_failure(summary, description);
        }
    }

    /// Report a non-fatal system problem.
    pub fn failed(&self, message: &str) {
        warn!("System warning: {}", message);
        for subscriber in self.snapshot() {
            subscriber.on_failed(message);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn SystemSubscriber>> {
        self.subscribers.lock().clone()
    }
}

impl Default for SystemSignals {
    fn default() -> Self {
        Self::new()
    }
}

fn same_handle(a: &Arc<dyn SystemSubscriber>, b: &Arc<dyn SystemSubscriber>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        successes: Mutex<usize>,
        failures: Mutex<Vec<(String, String)>>,
        warnings: Mutex<Vec<String>>,
    }

    impl SystemSubscriber for Recorder {
        fn on_startup_success(&self) {
            *self.successes.lock() += 1;
        }

        fn on_startup_failure(&self, summary: &str, description: &str) {
            self.failures
                .lock()
                .push((summary.to_string(), description.to_string()));
        }

        fn on_failed(&self, message: &str) {
            self.warnings.lock().push(message.to_string());
        }
    }

    #[test]
    fn test_signals_reach_subscriber() {
        let signals = SystemSignals::new();
        let recorder = Arc::new(Recorder::default());
        signals.add_subscriber(recorder.clone());

        signals.startup_success();
        signals.startup_failure("Bad", "Something went wrong");
        signals.failed("repaired a duplicate");

        assert_eq!(*recorder.successes.lock(), 1);
        assert_eq!(
            recorder.failures.lock()[0],
            ("Bad".to_string(), "Something went wrong".to_string())
        );
        assert_eq!(recorder.warnings.lock()[0], "repaired a duplicate");
    }

    #[test]
    fn test_duplicate_subscriber_fires_once() {
        let signals = SystemSignals::new();
        let recorder = Arc::new(Recorder::default());
        signals.add_subscriber(recorder.clone());
        signals.add_subscriber(recorder.clone());

        signals.startup_success();
        assert_eq!(*recorder.successes.lock(), 1);
    }

    #[test]
    fn test_removed_subscriber_is_silent() {
        let signals = SystemSignals::new();
        let recorder = Arc::new(Recorder::default());
        let handle: Arc<dyn SystemSubscriber> = recorder.clone();
        signals.add_subscriber(handle.clone());
        signals.remove_subscriber(&handle);

        signals.startup_success();
        assert_eq!(*recorder.successes.lock(), 0);
    }
}
