//! Platform preference backends.
//!
//! A [`PlatformBackend`] persists the generic preference mapping and
//! resolves platform-specific descriptors (storage paths, the movies
//! directory) from live OS conventions. Platform-specific values are never
//! cached by the store; every read comes through here.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use telecast_core::error::ConfigError;
use telecast_core::prefs::{self, Pref, PrefValue};

/// Persistence and platform-resolution backend for the preference store.
pub trait PlatformBackend: Send + Sync {
    /// Fetch the persisted mapping, or `None` if nothing has been saved.
    fn load(&self) -> Result<Option<HashMap<String, PrefValue>>, ConfigError>;

    /// Persist the entire mapping.
    fn save(&self, data: &HashMap<String, PrefValue>) -> Result<(), ConfigError>;

    /// Resolve a platform-specific descriptor. Always produces a value;
    /// resolution failures degrade to the descriptor default.
    fn get(&self, pref: &Pref) -> PrefValue;

    /// Write a platform-specific descriptor.
    fn set(&self, pref: &Pref, value: PrefValue) -> Result<(), ConfigError>;
}

const PREFS_FILE: &str = "preferences.json";
const PLATFORM_FILE: &str = "platform.json";

/// File-based backend persisting the mapping as JSON under the support
/// directory. Platform-specific paths are resolved from OS conventions on
/// every read, with explicit overrides persisted separately.
pub struct JsonFileBackend {
    support_dir: PathBuf,
    overrides: Mutex<HashMap<String, PrefValue>>,
}

impl JsonFileBackend {
    /// Create a backend rooted at the given support directory, creating
    /// the directory if needed.
    pub fn new(support_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let support_dir = support_dir.into();
        fs::create_dir_all(&support_dir)?;

        let overrides = match Self::read_mapping(&support_dir.join(PLATFORM_FILE))? {
            Some(map) => map,
            None => HashMap::new(),
        };

        Ok(Self {
            support_dir,
            overrides: Mutex::new(overrides),
        })
    }

    /// Create a backend rooted at the conventional per-user support
    /// directory for this OS.
    pub fn discover() -> Result<Self, ConfigError> {
        let base = dirs::data_local_dir()
            .ok_or_else(|| ConfigError::Backend("no local data directory".to_string()))?;
        Self::new(base.join("Telecast"))
    }

    /// The support directory this backend is rooted at.
    pub fn support_dir(&self) -> &Path {
        &self.support_dir
    }

    fn read_mapping(path: &Path) -> Result<Option<HashMap<String, PrefValue>>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_mapping(path: &Path, data: &HashMap<String, PrefValue>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(data)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn resolve_movies_dir(&self) -> PathBuf {
        let dir = dirs::video_dir()
            .map(|d| d.join("Telecast"))
            .unwrap_or_else(|| self.support_dir.join("Movies"));
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Could not create movies directory {:?}: {}", dir, e);
        }
        dir
    }
}

impl PlatformBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<HashMap<String, PrefValue>>, ConfigError> {
        Self::read_mapping(&self.support_dir.join(PREFS_FILE))
    }

    fn save(&self, data: &HashMap<String, PrefValue>) -> Result<(), ConfigError> {
        Self::write_mapping(&self.support_dir.join(PREFS_FILE), data)
    }

    fn get(&self, pref: &Pref) -> PrefValue {
        if let Some(value) = self.overrides.lock().get(pref.key) {
            return value.clone();
        }

        match pref.key {
            k if k == prefs::SUPPORT_DIRECTORY.key => self.support_dir.clone().into(),
            k if k == prefs::MOVIES_DIRECTORY.key => self.resolve_movies_dir().into(),
            k if k == prefs::DB_PATHNAME.key => self.support_dir.join("telecast.db").into(),
            _ => {
                debug!("No platform resolution for {}, using default", pref.key);
                pref.default_value()
            }
        }
    }

    fn set(&self, pref: &Pref, value: PrefValue) -> Result<(), ConfigError> {
        let mut overrides = self.overrides.lock();
        overrides.insert(pref.key.to_string(), value);
        Self::write_mapping(&self.support_dir.join(PLATFORM_FILE), &overrides)
    }
}

/// In-memory backend for tests and embedding frontends that manage their
/// own persistence.
#[derive(Default)]
pub struct MemoryBackend {
    saved: Mutex<Option<HashMap<String, PrefValue>>>,
    platform: Mutex<HashMap<String, PrefValue>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a platform-specific value, e.g. the movies directory.
    pub fn with_platform_value(self, pref: &Pref, value: PrefValue) -> Self {
        self.platform.lock().insert(pref.key.to_string(), value);
        self
    }
}

impl PlatformBackend for MemoryBackend {
    fn load(&self) -> Result<Option<HashMap<String, PrefValue>>, ConfigError> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, data: &HashMap<String, PrefValue>) -> Result<(), ConfigError> {
        *self.saved.lock() = Some(data.clone());
        Ok(())
    }

    fn get(&self, pref: &Pref) -> PrefValue {
        self.platform
            .lock()
            .get(pref.key)
            .cloned()
            .unwrap_or_else(|| pref.default_value())
    }

    fn set(&self, pref: &Pref, value: PrefValue) -> Result<(), ConfigError> {
        self.platform.lock().insert(pref.key.to_string(), value);
        Ok(())
    }
}
