//! User identifiers issued by the identity service.
//!
//! The identity service hands out UUIDs; the `profiles` collection is keyed by
//! the same value, so one `UserId` addresses both the account and its profile.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a string is not a valid user ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid user id: {0}")]
pub struct UserIdError(String);

/// Identifier of a signed-in account and of its profile record.
///
/// ```
/// use skilltrack_core::UserId;
///
/// let id: UserId = "0b8f6c52-6a3e-4d0e-9a57-3d1f7e0c2b11".parse().unwrap();
/// assert_eq!(id.to_string(), "0b8f6c52-6a3e-4d0e-9a57-3d1f7e0c2b11");
/// assert!("not-a-uuid".parse::<UserId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random ID.
    ///
    /// Only in-process backends mint IDs; the hosted identity service assigns
    /// its own.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| UserIdError(s.to_owned()))
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<UserId> for Uuid {
    fn from(id: UserId) -> Self {
        id.0
    }
}
