use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CollectionError {
    #[error("unknown collection: {0}")]
    Unknown(String),
}

/// Which per-item flag a synchronizer tracks.
///
/// Each collection owns its own local keys and remote table; the
/// synchronization rules are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Learned,
    Favorites,
}

impl Collection {
    /// Key of the type-aware (v2) local cache.
    #[must_use]
    pub fn local_key(self) -> &'static str {
        match self {
            Collection::Learned => "learnedItems_v2",
            Collection::Favorites => "favoriteItems_v2",
        }
    }

    /// Key of the video-only (v1) local cache, for collections that had one.
    #[must_use]
    pub fn legacy_key(self) -> Option<&'static str> {
        match self {
            Collection::Learned => Some("learnedVideoIds"),
            Collection::Favorites => None,
        }
    }

    #[must_use]
    pub fn remote_table(self) -> &'static str {
        match self {
            Collection::Learned => "user_progress",
            Collection::Favorites => "user_favorites",
        }
    }

    /// Column holding the time the flag was set.
    #[must_use]
    pub fn timestamp_column(self) -> &'static str {
        match self {
            Collection::Learned => "learned_at",
            Collection::Favorites => "created_at",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Learned => "learned",
            Collection::Favorites => "favorites",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "learned" => Ok(Collection::Learned),
            "favorites" => Ok(Collection::Favorites),
            other => Err(CollectionError::Unknown(other.to_owned())),
        }
    }
}
