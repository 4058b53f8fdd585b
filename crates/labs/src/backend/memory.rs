//! In-process backend with the same semantics as the hosted one.
//!
//! Holds accounts, the current session and profile records in memory.
//! Any operation can be made to fail, every call is counted, and profile
//! lookups can be held at a gate so that tests can interleave auth events
//! with in-flight resolutions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Notify, broadcast, watch};

use skilltrack_core::{Email, UserId};

use super::{BackendError, IdentityService, ProfileLookup, ProfileStore};
use crate::models::{
    AuthEvent, AuthStateChange, AuthUser, NewProfile, Profile, ProfileChanges, Session,
    UserMetadata,
};

const SESSION_LIFETIME_SECS: i64 = 3600;
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Backend operations that can be counted and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CurrentSession,
    CurrentUser,
    SignIn,
    SignUp,
    RefreshSession,
    SignOut,
    SelectProfile,
    InsertProfile,
    UpdateProfile,
}

/// An injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The service is unreachable or answered with a server error.
    Unavailable,
    /// Credentials were rejected.
    Unauthorized,
    /// A record with the same key exists.
    Conflict,
}

impl Fault {
    fn into_error(self, operation: Operation) -> BackendError {
        match self {
            Self::Unavailable => BackendError::Api {
                status: 503,
                code: None,
                message: format!("{operation:?} unavailable"),
            },
            Self::Unauthorized => BackendError::Unauthorized(format!("{operation:?} rejected")),
            Self::Conflict => BackendError::Conflict(format!("{operation:?} conflicts")),
        }
    }
}

struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct State {
    accounts: HashMap<Email, Account>,
    session: Option<Session>,
    profiles: HashMap<UserId, Profile>,
    faults: HashMap<Operation, Fault>,
    calls: HashMap<Operation, usize>,
}

/// In-memory identity service and profile store.
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

struct MemoryBackendInner {
    state: Mutex<State>,
    events: broadcast::Sender<AuthStateChange>,
    calls_changed: Notify,
    lookup_gate: watch::Sender<bool>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (lookup_gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(MemoryBackendInner {
                state: Mutex::new(State::default()),
                events,
                calls_changed: Notify::new(),
                lookup_gate,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a call and return the injected fault for it, if any.
    fn enter(&self, operation: Operation) -> Result<(), BackendError> {
        let fault = {
            let mut state = self.state();
            *state.calls.entry(operation).or_default() += 1;
            state.faults.get(&operation).copied()
        };
        self.inner.calls_changed.notify_waiters();
        fault.map_or(Ok(()), |fault| Err(fault.into_error(operation)))
    }

    fn emit(&self, change: AuthStateChange) {
        let _ = self.inner.events.send(change);
    }

    // =========================================================================
    // Test controls
    // =========================================================================

    /// Create an account. Returns the new user.
    #[must_use]
    pub fn register(&self, email: &Email, password: &str, full_name: Option<&str>) -> AuthUser {
        let user = AuthUser {
            id: UserId::random(),
            email: Some(email.clone()),
            user_metadata: UserMetadata {
                full_name: full_name.map(str::to_owned),
                extra: serde_json::Map::new(),
            },
        };
        self.state().accounts.insert(
            email.clone(),
            Account {
                user: user.clone(),
                password: password.to_owned(),
            },
        );
        user
    }

    /// Install a session for `user` without emitting an event, as if it had
    /// been restored from storage.
    pub fn restore_session(&self, user: AuthUser) -> Session {
        let session = issue_session(user);
        self.state().session = Some(session.clone());
        session
    }

    /// Deliver an auth-state change to subscribers, updating the current
    /// session to match.
    pub fn push_event(&self, change: AuthStateChange) {
        self.state().session.clone_from(&change.session);
        self.emit(change);
    }

    /// Store a profile record directly.
    pub fn seed_profile(&self, profile: Profile) {
        self.state().profiles.insert(profile.id, profile);
    }

    #[must_use]
    pub fn profile(&self, id: UserId) -> Option<Profile> {
        self.state().profiles.get(&id).cloned()
    }

    #[must_use]
    pub fn profile_count(&self) -> usize {
        self.state().profiles.len()
    }

    /// Make every later call to `operation` fail with `fault`.
    pub fn fail(&self, operation: Operation, fault: Fault) {
        self.state().faults.insert(operation, fault);
    }

    pub fn clear_fault(&self, operation: Operation) {
        self.state().faults.remove(&operation);
    }

    /// How many times `operation` has been called.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.state().calls.get(&operation).copied().unwrap_or_default()
    }

    /// Wait until `operation` has been called at least `count` times.
    pub async fn wait_for_calls(&self, operation: Operation, count: usize) {
        loop {
            let notified = self.inner.calls_changed.notified();
            if self.calls(operation) >= count {
                return;
            }
            notified.await;
        }
    }

    /// Hold profile lookups until [`release_lookups`](Self::release_lookups).
    ///
    /// Held lookups are already counted and answered as of when they were
    /// made; only the reply is delayed.
    pub fn hold_lookups(&self) {
        self.inner.lookup_gate.send_replace(false);
    }

    pub fn release_lookups(&self) {
        self.inner.lookup_gate.send_replace(true);
    }
}

fn issue_session(user: AuthUser) -> Session {
    Session {
        access_token: SecretString::from(format!("access-{}", uuid::Uuid::new_v4())),
        refresh_token: SecretString::from(format!("refresh-{}", uuid::Uuid::new_v4())),
        token_type: "bearer".to_owned(),
        expires_at: Some(Utc::now() + chrono::Duration::seconds(SESSION_LIFETIME_SECS)),
        user,
    }
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        self.enter(Operation::CurrentSession)?;
        Ok(self.state().session.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.inner.events.subscribe()
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        self.enter(Operation::CurrentUser)?;
        Ok(self.state().session.as_ref().map(|s| s.user.clone()))
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        self.enter(Operation::SignIn)?;
        let session = {
            let mut state = self.state();
            let user = state
                .accounts
                .get(email)
                .filter(|account| account.password == password.expose_secret())
                .map(|account| account.user.clone())
                .ok_or_else(|| BackendError::Unauthorized("Invalid login credentials".to_owned()))?;
            let session = issue_session(user);
            state.session = Some(session.clone());
            session
        };
        self.emit(AuthStateChange::new(AuthEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: Option<&str>,
    ) -> Result<Option<Session>, BackendError> {
        self.enter(Operation::SignUp)?;
        if self.state().accounts.contains_key(email) {
            return Err(BackendError::Conflict("User already registered".to_owned()));
        }
        let user = self.register(email, password.expose_secret(), full_name);
        let session = issue_session(user);
        self.state().session = Some(session.clone());
        self.emit(AuthStateChange::new(AuthEvent::SignedIn, Some(session.clone())));
        Ok(Some(session))
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        self.enter(Operation::RefreshSession)?;
        let session = {
            let mut state = self.state();
            let user = state
                .session
                .as_ref()
                .map(|s| s.user.clone())
                .ok_or_else(|| BackendError::Unauthorized("no session to refresh".to_owned()))?;
            let session = issue_session(user);
            state.session = Some(session.clone());
            session
        };
        self.emit(AuthStateChange::new(
            AuthEvent::TokenRefreshed,
            Some(session.clone()),
        ));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.enter(Operation::SignOut)?;
        if self.state().session.take().is_some() {
            self.emit(AuthStateChange::signed_out());
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn select_by_id(&self, id: UserId) -> ProfileLookup {
        if let Err(err) = self.enter(Operation::SelectProfile) {
            return ProfileLookup::Failed(err);
        }

        let lookup = match self.state().profiles.get(&id) {
            Some(profile) => ProfileLookup::Found(profile.clone()),
            None => ProfileLookup::NotFound,
        };

        let mut gate = self.inner.lookup_gate.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = gate.wait_for(|open| *open).await;
        lookup
    }

    async fn insert(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        self.enter(Operation::InsertProfile)?;
        let mut state = self.state();
        if state.profiles.contains_key(&profile.id) {
            return Err(BackendError::Conflict(
                "duplicate key value violates unique constraint \"profiles_pkey\"".to_owned(),
            ));
        }
        let stored = profile.clone().into_profile(Utc::now());
        state.profiles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<Profile, BackendError> {
        self.enter(Operation::UpdateProfile)?;
        let mut state = self.state();
        let profile = state.profiles.get_mut(&id).ok_or(BackendError::NotFound)?;
        changes.apply_to(profile);
        Ok(profile.clone())
    }
}
