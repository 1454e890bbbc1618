//! The locked preference store.
//!
//! Process-wide keyed configuration with typed defaults, platform-specific
//! overrides, and change notification. The store is an explicitly
//! constructed object; callers share it via `Arc` rather than through
//! hidden global state.
//!
//! The in-memory map is lazily populated from the platform backend on
//! first access, so `get`/`set` always observe a loaded store without
//! callers having to sequence a `load` first.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use telecast_core::error::ConfigError;
use telecast_core::prefs::{Pref, PrefValue};

use super::backend::PlatformBackend;

/// Subscriber notified after every preference write.
pub trait ChangeSubscriber: Send + Sync {
    /// Called with the written key and value. Runs while the store lock is
    /// held; calling back into the store from here deadlocks.
    fn on_change(&self, key: &str, value: &PrefValue);
}

/// Locked key/value preference store with typed defaults and change
/// notification.
pub struct PrefStore {
    backend: Arc<dyn PlatformBackend>,

    /// `None` until the first load; replaced wholesale by `load`.
    data: Mutex<Option<HashMap<String, PrefValue>>>,

    /// Registered subscribers, set semantics keyed on the `Arc` identity.
    subscribers: Mutex<Vec<Arc<dyn ChangeSubscriber>>>,
}

impl PrefStore {
    /// Create a store over the given platform backend. No I/O happens
    /// until the first access.
    pub fn new(backend: Arc<dyn PlatformBackend>) -> Self {
        Self {
            backend,
            data: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Replace the in-memory state with the persisted mapping. A backend
    /// failure degrades to defaults rather than erroring.
    pub fn load(&self) {
        let fetched = self.fetch();
        *self.data.lock() = Some(fetched);
    }

    /// Persist the entire in-memory mapping. Backend errors propagate to
    /// the caller.
    pub fn save(&self) -> Result<(), ConfigError> {
        let mut data = self.data.lock();
        let map = data.get_or_insert_with(|| self.fetch());
        self.backend.save(map)
    }

    /// Read a preference. Platform-specific descriptors delegate entirely
    /// to the backend; everything else answers from the in-memory map,
    /// falling back to the descriptor default. Never fails for a missing
    /// key.
    pub fn get(&self, pref: &Pref) -> PrefValue {
        if pref.platform_specific {
            self.ensure_loaded();
            return self.backend.get(pref);
        }

        let mut data = self.data.lock();
        let map = data.get_or_insert_with(|| self.fetch());
        map.get(pref.key).cloned().unwrap_or_else(|| pref.default_value())
    }

    /// Write a preference and synchronously notify every subscriber while
    /// the store lock is still held. A slow subscriber blocks all other
    /// store operations for its duration.
    ///
    /// Platform-specific descriptors are forwarded to the backend instead
    /// of the in-memory map; backend errors propagate.
    pub fn set(&self, pref: &Pref, value: PrefValue) -> Result<(), ConfigError> {
        let mut data = self.data.lock();
        let map = data.get_or_insert_with(|| self.fetch());

        if pref.platform_specific {
            self.backend.set(pref, value.clone())?;
        } else {
            map.insert(pref.key.to_string(), value.clone());
        }

        self.notify(pref.key, &value);
        Ok(())
    }

    /// Register a change subscriber. Registering the same handle twice is
    /// a no-op.
    pub fn add_change_subscriber(&self, subscriber: Arc<dyn ChangeSubscriber>) {
        let mut subscribers = self.subscribers.lock();
        if !subscribers.iter().any(|s| same_handle(s, &subscriber)) {
            subscribers.push(subscriber);
        }
    }

    /// Remove a change subscriber. Removing a handle that was never
    /// registered is a no-op.
    pub fn remove_change_subscriber(&self, subscriber: &Arc<dyn ChangeSubscriber>) {
        self.subscribers
            .lock()
            .retain(|s| !same_handle(s, subscriber));
    }

    fn ensure_loaded(&self) {
        let mut data = self.data.lock();
        if data.is_none() {
            *data = Some(self.fetch());
        }
    }

    fn fetch(&self) -> HashMap<String, PrefValue> {
        match self.backend.load() {
            Ok(Some(map)) => {
                debug!("Loaded {} saved preferences", map.len());
                map
            }
            Ok(None) => {
                debug!("No saved preferences, starting from defaults");
                HashMap::new()
            }
            Err(e) => {
                warn!("Could not load saved preferences, using defaults: {}", e);
                HashMap::new()
            }
        }
    }

    fn notify(&self, key: &str, value: &PrefValue) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.on_change(key, value);
        }
    }
}

/// Identity comparison on the data pointer, so a cloned `Arc` counts as
/// the same subscription.
fn same_handle(a: &Arc<dyn ChangeSubscriber>, b: &Arc<dyn ChangeSubscriber>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::backend::MemoryBackend;
    use parking_lot::Mutex as PlMutex;
    use telecast_core::prefs;

    fn store() -> PrefStore {
        PrefStore::new(Arc::new(MemoryBackend::new()))
    }

    struct Recorder {
        seen: PlMutex<Vec<(String, PrefValue)>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: PlMutex::new(Vec::new()),
            })
        }
    }

    impl ChangeSubscriber for Recorder {
        fn on_change(&self, key: &str, value: &PrefValue) {
            self.seen.lock().push((key.to_string(), value.clone()));
        }
    }

    #[test]
    fn test_get_before_set_returns_default() {
        let store = store();
        assert_eq!(store.get(&prefs::RUN_AT_STARTUP), PrefValue::Bool(false));
        assert_eq!(
            store.get(&prefs::EXPIRE_AFTER_X_DAYS),
            PrefValue::Integer(7)
        );
    }

    #[test]
    fn test_set_then_get_returns_written_value() {
        let store = store();
        store
            .set(&prefs::RUN_AT_STARTUP, PrefValue::Bool(true))
            .unwrap();
        assert_eq!(store.get(&prefs::RUN_AT_STARTUP), PrefValue::Bool(true));
    }

    #[test]
    fn test_load_answers_every_known_descriptor() {
        let store = store();
        store.load();
        for pref in prefs::CACHED_PREFS {
            // get always produces a value; the default when nothing is set
            let _ = store.get(pref);
        }
    }

    #[test]
    fn test_load_replaces_state_wholesale() {
        let backend = Arc::new(MemoryBackend::new());
        let store = PrefStore::new(backend);
        store
            .set(&prefs::PRESERVE_X_GB_FREE, PrefValue::Integer(5))
            .unwrap();

        // Nothing was saved, so a reload drops the unsaved write.
        store.load();
        assert_eq!(
            store.get(&prefs::PRESERVE_X_GB_FREE),
            PrefValue::Integer(1)
        );
    }

    #[test]
    fn test_save_then_reload_keeps_values() {
        let backend = Arc::new(MemoryBackend::new());
        let store = PrefStore::new(backend);
        store
            .set(&prefs::CHECK_FEEDS_EVERY_X_MN, PrefValue::Integer(15))
            .unwrap();
        store.save().unwrap();

        store.load();
        assert_eq!(
            store.get(&prefs::CHECK_FEEDS_EVERY_X_MN),
            PrefValue::Integer(15)
        );
    }

    #[test]
    fn test_subscriber_fires_on_set() {
        let store = store();
        let recorder = Recorder::new();
        store.add_change_subscriber(recorder.clone());

        store
            .set(&prefs::LIMIT_UPSTREAM, PrefValue::Bool(false))
            .unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "limitUpstream");
        assert_eq!(seen[0].1, PrefValue::Bool(false));
    }

    #[test]
    fn test_duplicate_registration_fires_once() {
        let store = store();
        let recorder = Recorder::new();
        store.add_change_subscriber(recorder.clone());
        store.add_change_subscriber(recorder.clone());

        store
            .set(&prefs::NO_FULLSCREEN_ALERT, PrefValue::Bool(true))
            .unwrap();

        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[test]
    fn test_remove_subscriber_stops_notifications() {
        let store = store();
        let recorder = Recorder::new();
        let handle: Arc<dyn ChangeSubscriber> = recorder.clone();
        store.add_change_subscriber(handle.clone());
        store.remove_change_subscriber(&handle);

        // Removing a non-member is a no-op.
        store.remove_change_subscriber(&handle);

        store
            .set(&prefs::DOWNLOADS_TARGET, PrefValue::Integer(5))
            .unwrap();
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_platform_specific_reads_bypass_cache() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_platform_value(&prefs::MOVIES_DIRECTORY, PrefValue::from("/media/a")),
        );
        let store = PrefStore::new(backend.clone());
        assert_eq!(
            store.get(&prefs::MOVIES_DIRECTORY).as_str(),
            Some("/media/a")
        );

        // A live change in the backend is visible on the next read.
        backend
            .set(&prefs::MOVIES_DIRECTORY, PrefValue::from("/media/b"))
            .unwrap();
        assert_eq!(
            store.get(&prefs::MOVIES_DIRECTORY).as_str(),
            Some("/media/b")
        );
    }

    #[test]
    fn test_platform_specific_set_notifies() {
        let store = store();
        let recorder = Recorder::new();
        store.add_change_subscriber(recorder.clone());
        store
            .set(&prefs::MOVIES_DIRECTORY, PrefValue::from("/media/x"))
            .unwrap();
        assert_eq!(recorder.seen.lock().len(), 1);
    }
}
