//! Remote identity service and profile record store.
//!
//! The rest of the crate talks to the hosted backend only through the
//! [`IdentityService`] and [`ProfileStore`] traits. Two implementations ship:
//!
//! - [`SupabaseClient`] - GoTrue for identity, PostgREST for the `profiles`
//!   collection, over `reqwest`
//! - [`MemoryBackend`] - an in-process stand-in with fault injection, used by
//!   tests
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use skilltrack_labs::backend::{Backend, SupabaseClient};
//!
//! let client = SupabaseClient::connect(&config).await?;
//! let backend: Arc<dyn Backend> = Arc::new(client);
//! let session = backend.current_session().await?;
//! ```

pub mod memory;
pub mod supabase;

pub use memory::{Fault, MemoryBackend, Operation};
pub use supabase::SupabaseClient;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::broadcast;

use skilltrack_core::{Email, UserId};

use crate::models::{AuthStateChange, AuthUser, NewProfile, Profile, ProfileChanges, Session};

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error payload.
    #[error("API error ({status}{}): {message}", format_code(.code.as_deref()))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The requested record does not exist.
    #[error("Not found")]
    NotFound,

    /// Missing, expired or rejected credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A record with the same key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Reading or writing the persisted session failed.
    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// An endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

fn format_code(code: Option<&str>) -> String {
    code.map(|c| format!(", {c}")).unwrap_or_default()
}

/// Outcome of looking up a profile by id.
///
/// "Not found" is a normal outcome here, distinct from a failed call.
#[derive(Debug)]
pub enum ProfileLookup {
    Found(Profile),
    NotFound,
    Failed(BackendError),
}

/// The hosted identity service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The current session, if any. May renew an expired access token.
    async fn current_session(&self) -> Result<Option<Session>, BackendError>;

    /// Subscribe to auth-state changes. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;

    /// The account behind the current session, as the service sees it now.
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError>;

    /// Start a session with email and password.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, BackendError>;

    /// Register an account. Returns `None` when the service holds the
    /// session back until the email address is confirmed.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: Option<&str>,
    ) -> Result<Option<Session>, BackendError>;

    /// Exchange the refresh token for a new access token.
    async fn refresh_session(&self) -> Result<Session, BackendError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// The `profiles` record collection, keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn select_by_id(&self, id: UserId) -> ProfileLookup;

    /// Insert a new record. Fails with [`BackendError::Conflict`] if a record
    /// with the same id exists.
    async fn insert(&self, profile: &NewProfile) -> Result<Profile, BackendError>;

    /// Apply a partial update and return the stored record.
    async fn update(&self, id: UserId, changes: &ProfileChanges)
    -> Result<Profile, BackendError>;
}

/// Everything the session bootstrap needs from the backend.
pub trait Backend: IdentityService + ProfileStore {}

impl<T: IdentityService + ProfileStore + ?Sized> Backend for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_includes_code() {
        let err = BackendError::Api {
            status: 400,
            code: Some("invalid_credentials".to_owned()),
            message: "Invalid login credentials".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "API error (400, invalid_credentials): Invalid login credentials"
        );

        let err = BackendError::Api {
            status: 502,
            code: None,
            message: "bad gateway".to_owned(),
        };
        assert_eq!(err.to_string(), "API error (502): bad gateway");
    }
}
