//! Session and account types issued by the identity service.
//!
//! The client only ever holds a read-only copy of these; the identity
//! service decides when they start, refresh and end.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use skilltrack_core::{Email, UserId};

/// The signed-in account as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Account ID; also the key of the account's profile record.
    pub id: UserId,
    /// Primary email. Phone-only accounts have none.
    #[serde(default, deserialize_with = "lenient_email")]
    pub email: Option<Email>,
    /// Free-form metadata captured at sign-up.
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Metadata attached to an account at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Display name entered on the sign-up form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Everything else, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthUser {
    /// Display-name hint for a freshly synthesized profile.
    ///
    /// Returns `None` when no name was captured or it is blank.
    #[must_use]
    pub fn display_name_hint(&self) -> Option<&str> {
        self.user_metadata
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Accept whatever the identity service sends for `email`; blank or malformed
/// values become `None` instead of failing the whole user record.
fn lenient_email<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Email>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Email::parse(&s).ok()))
}

/// A client-held session: bearer tokens plus the account they belong to.
///
/// Tokens are wrapped in [`SecretString`] so they never show up in `Debug`
/// output or logs.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token for API calls.
    pub access_token: SecretString,
    /// Token used to obtain a new access token.
    pub refresh_token: SecretString,
    /// Token type, normally `bearer`.
    pub token_type: String,
    /// When the access token stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
    /// The signed-in account.
    pub user: AuthUser,
}

impl Session {
    /// Shorthand for the signed-in account's ID.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }

    /// Whether the access token has expired, or will within `leeway_secs`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, leeway_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now + chrono::Duration::seconds(leeway_secs))
    }

    /// Whether two sessions carry the same access token.
    #[must_use]
    pub fn same_token(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
    }
}

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// A session was established (sign-in, sign-up, or restored).
    SignedIn,
    /// The session ended.
    SignedOut,
    /// The access token was renewed.
    TokenRefreshed,
    /// Account details (email, metadata) changed.
    UserUpdated,
}

impl std::fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignedIn => write!(f, "SIGNED_IN"),
            Self::SignedOut => write!(f, "SIGNED_OUT"),
            Self::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
            Self::UserUpdated => write!(f, "USER_UPDATED"),
        }
    }
}

/// An auth-state change delivered to subscribers.
#[derive(Debug, Clone)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    /// The session after the change; `None` once signed out.
    pub session: Option<Session>,
}

impl AuthStateChange {
    #[must_use]
    pub const fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }
}
