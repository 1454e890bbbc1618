//! Preference descriptors and the typed preference value.
//!
//! A [`Pref`] is an immutable record describing one preference: its key, a
//! typed default, and whether reads and writes route to the platform
//! backend instead of the in-memory store. Descriptors are defined once as
//! named constants and never mutated.
//!
//! Platform-specific descriptors (storage paths, the movies directory) must
//! reflect live OS conventions, so they are never cached in the generic
//! map; every read is forwarded to the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A typed preference value.
///
/// Persisted untagged, so the on-disk mapping reads as plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    /// No value.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Integer(i64),

    /// Floating-point value.
    Float(f64),

    /// String value. Filesystem paths are stored in this variant.
    Text(String),
}

impl PrefValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get this value as a floating-point number, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get this value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a filesystem path.
    pub fn as_path(&self) -> Option<PathBuf> {
        self.as_str().map(PathBuf::from)
    }
}

impl Default for PrefValue {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for PrefValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PrefValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for PrefValue {
    fn from(i: i32) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for PrefValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for PrefValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<PathBuf> for PrefValue {
    fn from(p: PathBuf) -> Self {
        Self::Text(p.to_string_lossy().into_owned())
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A const-constructible default for a preference descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    /// No default.
    Null,

    /// Boolean default.
    Bool(bool),

    /// Integer default.
    Integer(i64),

    /// Floating-point default.
    Float(f64),

    /// String default.
    Text(&'static str),
}

impl DefaultValue {
    /// Materialize the default as a [`PrefValue`].
    pub fn to_value(self) -> PrefValue {
        match self {
            Self::Null => PrefValue::Null,
            Self::Bool(b) => PrefValue::Bool(b),
            Self::Integer(i) => PrefValue::Integer(i),
            Self::Float(f) => PrefValue::Float(f),
            Self::Text(s) => PrefValue::Text(s.to_string()),
        }
    }
}

/// An immutable preference descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Pref {
    /// Key under which the value is stored.
    pub key: &'static str,

    /// Default returned when no value has been written.
    pub default: DefaultValue,

    /// Route reads and writes to the platform backend instead of the
    /// in-memory store.
    pub platform_specific: bool,
}

impl Pref {
    /// Define a descriptor.
    pub const fn new(key: &'static str, default: DefaultValue, platform_specific: bool) -> Self {
        Self {
            key,
            default,
            platform_specific,
        }
    }

    /// Materialize this descriptor's default value.
    pub fn default_value(&self) -> PrefValue {
        self.default.to_value()
    }
}

// User preferences, cached in the in-memory store.
pub const MAIN_WINDOW_FRAME: Pref = Pref::new("mainWindowFrame", DefaultValue::Null, false);
pub const LEFT_VIEW_SIZE: Pref = Pref::new("leftViewSize", DefaultValue::Null, false);
pub const RIGHT_VIEW_SIZE: Pref = Pref::new("rightViewSize", DefaultValue::Null, false);
pub const NO_FULLSCREEN_ALERT: Pref =
    Pref::new("noFullscreenAlert", DefaultValue::Bool(false), false);
pub const RUN_AT_STARTUP: Pref = Pref::new("runAtStartup", DefaultValue::Bool(false), false);
pub const CHECK_FEEDS_EVERY_X_MN: Pref =
    Pref::new("checkChannelsEveryXMn", DefaultValue::Integer(60), false);
pub const LIMIT_UPSTREAM: Pref = Pref::new("limitUpstream", DefaultValue::Bool(true), false);
pub const UPSTREAM_LIMIT_IN_KBS: Pref =
    Pref::new("upstreamLimitInKBS", DefaultValue::Integer(4), false);
pub const PRESERVE_DISK_SPACE: Pref =
    Pref::new("preserveDiskSpace", DefaultValue::Bool(false), false);
pub const PRESERVE_X_GB_FREE: Pref = Pref::new("preserveXGBFree", DefaultValue::Integer(1), false);
pub const EXPIRE_AFTER_X_DAYS: Pref =
    Pref::new("expireAfterXDays", DefaultValue::Integer(7), false);
pub const DOWNLOADS_TARGET: Pref = Pref::new("DownloadsTarget", DefaultValue::Integer(3), false);
pub const MAX_MANUAL_DOWNLOADS: Pref =
    Pref::new("MaxManualDownloads", DefaultValue::Integer(10), false);
pub const CHANNEL_GUIDE_URL: Pref = Pref::new(
    "ChannelGuideURL",
    DefaultValue::Text("https://guide.telecast.org/"),
    false,
);
pub const THEME_NAME: Pref = Pref::new("ThemeName", DefaultValue::Null, false);

// Build and identity metadata, logged in the startup banner.
pub const SHORT_APP_NAME: Pref = Pref::new("ShortAppName", DefaultValue::Text("Telecast"), false);
pub const LONG_APP_NAME: Pref =
    Pref::new("LongAppName", DefaultValue::Text("Telecast Player"), false);
pub const APP_VERSION: Pref = Pref::new(
    "AppVersion",
    DefaultValue::Text(env!("CARGO_PKG_VERSION")),
    false,
);
pub const APP_REVISION: Pref = Pref::new("AppRevision", DefaultValue::Text("unknown"), false);
pub const BUILD_MACHINE: Pref = Pref::new("BuildMachine", DefaultValue::Text("unknown"), false);
pub const BUILD_TIME: Pref = Pref::new("BuildTime", DefaultValue::Text("unknown"), false);
pub const BUG_REPORT_URL: Pref = Pref::new(
    "BugReportURL",
    DefaultValue::Text("https://bugs.telecast.org/"),
    false,
);

// Platform-specific descriptors, resolved live by the platform backend.
pub const MOVIES_DIRECTORY: Pref = Pref::new("MoviesDirectory", DefaultValue::Null, true);
pub const SUPPORT_DIRECTORY: Pref = Pref::new("SupportDirectory", DefaultValue::Null, true);
pub const DB_PATHNAME: Pref = Pref::new("DBPathname", DefaultValue::Null, true);

/// All descriptors with cached (non-platform) storage, used to validate
/// that a loaded store can answer every known key.
pub const CACHED_PREFS: &[Pref] = &[
    MAIN_WINDOW_FRAME,
    LEFT_VIEW_SIZE,
    RIGHT_VIEW_SIZE,
    NO_FULLSCREEN_ALERT,
    RUN_AT_STARTUP,
    CHECK_FEEDS_EVERY_X_MN,
    LIMIT_UPSTREAM,
    UPSTREAM_LIMIT_IN_KBS,
    PRESERVE_DISK_SPACE,
    PRESERVE_X_GB_FREE,
    EXPIRE_AFTER_X_DAYS,
    DOWNLOADS_TARGET,
    MAX_MANUAL_DOWNLOADS,
    CHANNEL_GUIDE_URL,
    THEME_NAME,
    SHORT_APP_NAME,
    LONG_APP_NAME,
    APP_VERSION,
    APP_REVISION,
    BUILD_MACHINE,
    BUILD_TIME,
    BUG_REPORT_URL,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_materialization() {
        assert_eq!(RUN_AT_STARTUP.default_value(), PrefValue::Bool(false));
        assert_eq!(
            EXPIRE_AFTER_X_DAYS.default_value(),
            PrefValue::Integer(7)
        );
        assert!(MAIN_WINDOW_FRAME.default_value().is_null());
        assert_eq!(
            SHORT_APP_NAME.default_value().as_str(),
            Some("Telecast")
        );
    }

    #[test]
    fn test_platform_specific_flags() {
        assert!(MOVIES_DIRECTORY.platform_specific);
        assert!(SUPPORT_DIRECTORY.platform_specific);
        assert!(DB_PATHNAME.platform_specific);
        for pref in CACHED_PREFS {
            assert!(!pref.platform_specific, "{} should be cached", pref.key);
        }
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(PrefValue::Bool(true).as_bool(), Some(true));
        assert_eq!(PrefValue::Integer(4).as_integer(), Some(4));
        assert_eq!(PrefValue::Integer(4).as_float(), Some(4.0));
        assert_eq!(PrefValue::from("x").as_str(), Some("x"));
        assert_eq!(
            PrefValue::from("/tmp/movies").as_path(),
            Some(PathBuf::from("/tmp/movies"))
        );
        assert!(PrefValue::Null.as_bool().is_none());
    }

    #[test]
    fn test_untagged_serialization() {
        let value = PrefValue::Integer(60);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "60");

        let parsed: PrefValue = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(parsed, PrefValue::Text("hello".to_string()));

        let parsed: PrefValue = serde_json::from_str("null").unwrap();
        assert!(parsed.is_null());
    }

    #[test]
    fn test_cached_keys_are_distinct() {
        let mut keys: Vec<&str> = CACHED_PREFS.iter().map(|p| p.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), CACHED_PREFS.len());
    }
}
