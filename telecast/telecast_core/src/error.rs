//! Error types for the Telecast media backend.
//!
//! This module defines the error hierarchy used throughout the system. Each
//! subsystem has its own error type, and the root `Error` type can wrap any
//! of them for uniform handling at the top level.
//!
//! Preference persistence faults (`ConfigError`) are propagated to callers
//! uncaught; database faults surface during startup where the sequencer
//! translates the expected ones into failure signals.

use thiserror::Error;

/// Result type used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the Telecast backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Preference persistence errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Media database errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// General runtime errors
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Errors from the platform preference backend.
///
/// These are never translated into startup failures; whoever calls `save`
/// or writes a platform-specific preference handles them.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing file could not be read or written
    #[error("Failed to access preference storage: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted mapping could not be parsed or encoded
    #[error("Failed to encode preferences: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The platform backend rejected the operation
    #[error("Platform backend error: {0}")]
    Backend(String),
}

/// Errors raised by the media database service.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The persisted snapshot was written by a newer build
    #[error("Database format version {version} is newer than the supported version {supported}")]
    TooNew { version: u32, supported: u32 },

    /// The persisted snapshot could not be decoded
    #[error("Database snapshot is corrupt: {0}")]
    Corrupt(String),

    /// The snapshot file could not be accessed
    #[error("Failed to access database storage: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_new_message_names_both_versions() {
        let err = DatabaseError::TooNew {
            version: 9,
            supported: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains('9'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_root_error_wraps_subsystems() {
        let err: Error = ConfigError::Backend("no keychain".to_string()).into();
        assert!(matches!(err, Error::Config(_)));

        let err: Error = DatabaseError::Corrupt("truncated".to_string()).into();
        assert!(matches!(err, Error::Database(_)));
    }
}
