//! # Telecast Core
//!
//! `telecast_core` provides the fundamental building blocks for the Telecast
//! media backend. This includes error types, ID definitions, and the typed
//! preference descriptors shared by the runtime and its frontends.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Telecast components
//! - **id**: Strongly-typed identifier types
//! - **prefs**: Preference descriptors and the typed preference value

pub mod error;
pub mod id;
pub mod prefs;

// Re-export key types for convenience
pub use error::{ConfigError, DatabaseError, Error, Result};
pub use id::{DownloadId, FeedId, ItemId, TabOrderId};
pub use prefs::{Pref, PrefValue};
