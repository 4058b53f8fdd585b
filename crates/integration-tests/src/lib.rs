//! Integration tests for Skilltrack Labs.
//!
//! Everything runs against the in-memory backend, so no hosted project or
//! network access is needed:
//!
//! ```bash
//! cargo test -p skilltrack-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_bootstrap` - start-up, auth changes, sign-out ordering
//! - `profile_resolution` - default profile synthesis and failure handling
//! - `profile_editing` - validated write-through edits
//! - `route_access` - page guard decisions over live snapshots
//! - `catalog_labs` - catalog queries feeding lab sessions
//! - `supabase_offline` - hosted client start-up without network access

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use skilltrack_core::{Email, Role};
use skilltrack_labs::backend::MemoryBackend;
use skilltrack_labs::config::{LabsConfig, SupabaseConfig};
use skilltrack_labs::models::{AuthUser, NewProfile, Profile};
use skilltrack_labs::state::AppState;
use url::Url;

/// A running app over a shared in-memory backend.
pub struct TestContext {
    pub backend: MemoryBackend,
    pub state: AppState,
}

impl TestContext {
    /// Start the app. Seed the backend first with [`TestContext::with`] if
    /// the start-up state matters.
    #[must_use]
    pub fn new() -> Self {
        Self::with(MemoryBackend::new())
    }

    #[must_use]
    pub fn with(backend: MemoryBackend) -> Self {
        let state = AppState::with_backend(test_config(), Arc::new(backend.clone())).unwrap();
        Self { backend, state }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration pointing at a local project. Nothing connects to it.
#[must_use]
pub fn test_config() -> LabsConfig {
    LabsConfig {
        supabase: SupabaseConfig {
            url: Url::parse("http://127.0.0.1:54321/").unwrap(),
            anon_key: SecretString::from("local-test-key"),
        },
        session_file: std::env::temp_dir()
            .join(format!("skilltrack-test-{}", uuid::Uuid::new_v4()))
            .join("session.json"),
        http_timeout: Duration::from_secs(5),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

#[must_use]
pub fn email(s: &str) -> Email {
    Email::parse(s).unwrap()
}

/// A stored profile for `user` with the given role.
#[must_use]
pub fn stored_profile(user: &AuthUser, role: Role) -> Profile {
    let mut profile = NewProfile::for_user(user).unwrap().into_profile(Utc::now());
    profile.role = role;
    profile
}

/// Register an account, give it a live session and optionally a stored
/// profile. Returns the account.
pub fn signed_in_user(backend: &MemoryBackend, address: &str, role: Option<Role>) -> AuthUser {
    let user = backend.register(&email(address), "correct horse", Some("Test Learner"));
    backend.restore_session(user.clone());
    if let Some(role) = role {
        backend.seed_profile(stored_profile(&user, role));
    }
    user
}
