//! Strongly-typed identifiers for Telecast database objects.
//!
//! Each identifier type is a thin wrapper around a UUID with a phantom type
//! parameter, so identifiers for different object kinds cannot be mixed up
//! even though they share the same underlying structure.
//!
//! # Examples
//!
//! ```
//! use telecast_core::id::{FeedId, DownloadId};
//!
//! let feed_id = FeedId::new();
//! let download_id = DownloadId::new();
//!
//! // Different ID types are different types, even with the same shape
//! assert_ne!(feed_id.to_string(), download_id.to_string());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A type-safe identifier based on UUID.
///
/// Specialized for different object kinds via the phantom type parameter
/// `T`; see the type aliases at the bottom of this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: std::marker::PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Create an identifier from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Create a nil (all zeros) identifier, useful as a sentinel.
    pub fn nil() -> Self {
        Self {
            uuid: Uuid::nil(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

/// Marker types for the identifier aliases.
pub mod markers {
    /// Marker for feed identifiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Feed;

    /// Marker for media item identifiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Item;

    /// Marker for download identifiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Download;

    /// Marker for tab-order identifiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct TabOrder;
}

/// Identifier for a feed.
pub type FeedId = Id<markers::Feed>;

/// Identifier for a media item.
pub type ItemId = Id<markers::Item>;

/// Identifier for a download.
pub type DownloadId = Id<markers::Download>;

/// Identifier for a tab-order object.
pub type TabOrderId = Id<markers::TabOrder>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let id = FeedId::new();
        let parsed = FeedId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_nil_id() {
        let nil = DownloadId::nil();
        assert_eq!(nil.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
    }
}
