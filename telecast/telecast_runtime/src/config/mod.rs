//! Preference storage for the Telecast backend.
//!
//! This module provides the locked preference store with change
//! notification and the platform backend it persists through.

pub mod backend;
pub mod store;

// Re-export key types for convenience
pub use backend::{JsonFileBackend, MemoryBackend, PlatformBackend};
pub use store::{ChangeSubscriber, PrefStore};
