//! Stable identifiers shared by every layer.
//!
//! The platform adapter resolves handles and usernames before events reach
//! the engine, so everything below this boundary works with numeric ids only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an actor (platform user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub i64);

/// Identifier of a group communication space (chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(pub i64);

/// Identifier of a message within a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authorization domain an exemption applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Space(SpaceId),
}

impl Scope {
    const GLOBAL_KEY: &'static str = "global";

    /// Key used for the `scope` column.
    pub fn storage_key(&self) -> String {
        match self {
            Scope::Global => Self::GLOBAL_KEY.to_string(),
            Scope::Space(space) => space.0.to_string(),
        }
    }

    /// Inverse of [`Scope::storage_key`].
    pub fn from_storage_key(key: &str) -> Option<Self> {
        if key == Self::GLOBAL_KEY {
            return Some(Scope::Global);
        }
        key.parse::<i64>().ok().map(|id| Scope::Space(SpaceId(id)))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Space(space) => write!(f, "space {}", space),
        }
    }
}
