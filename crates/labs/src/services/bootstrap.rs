//! Session bootstrap: keeps the (session, profile) pair current.
//!
//! On start the bootstrapper fetches the current session and resolves its
//! profile. It then follows the identity service's auth-state changes,
//! re-resolving the profile for every change. Consumers read the result as
//! an [`AuthSnapshot`] through a `watch` channel.
//!
//! # Ordering
//!
//! Every trigger (start, auth change, sign-out, refresh, shutdown) takes a
//! new generation. A resolution only publishes if its generation is still
//! current, so a slow lookup can never overwrite a later sign-out, and
//! nothing is published after shutdown.
//!
//! Sign-out also hands the driver a fresh event subscription. Changes still
//! queued from before the sign-out are dropped with the old one, so a failed
//! remote sign-out cannot bring the cleared session back.
//!
//! # Example
//!
//! ```rust,ignore
//! let bootstrapper = SessionBootstrapper::start(backend);
//! let snapshot = bootstrapper.wait_until_loaded().await;
//! if let Some(profile) = &snapshot.profile {
//!     println!("Welcome back, {}", profile.display_name());
//! }
//! bootstrapper.shutdown().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use skilltrack_core::UserId;

use crate::backend::{Backend, BackendError};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{AuthStateChange, Profile, Session};
use crate::services::profile::ProfileResolver;

/// Errors from explicit session actions.
///
/// Start-up and auth changes never fail; they degrade to a signed-out or
/// profile-less snapshot instead.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Local state was cleared but the identity service did not confirm.
    #[error("sign-out failed: {0}")]
    SignOut(#[source] BackendError),

    /// The bootstrapper was shut down.
    #[error("session bootstrap has shut down")]
    ShutDown,

    /// A sign-out or auth change overtook the refresh before it could
    /// publish.
    #[error("profile refresh was superseded by a newer auth change")]
    Superseded,
}

/// The published authentication state.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// True only until the first resolution completes.
    pub loading: bool,
}

impl AuthSnapshot {
    const fn loading() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
        }
    }

    const fn signed_out() -> Self {
        Self {
            session: None,
            profile: None,
            loading: false,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.session.as_ref().map(Session::user_id)
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the loaded profile has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.role.is_admin())
    }
}

/// Resolves and publishes the current session and profile.
pub struct SessionBootstrapper {
    inner: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// State shared with the driver task.
struct Shared {
    backend: Arc<dyn Backend>,
    resolver: ProfileResolver,
    state: watch::Sender<AuthSnapshot>,
    generation: AtomicU64,
    /// Subscription taken at sign-out, replacing the driver's receiver.
    fresh_events: Mutex<Option<broadcast::Receiver<AuthStateChange>>>,
    shutdown: watch::Sender<bool>,
}

impl SessionBootstrapper {
    /// Subscribe to auth-state changes, then spawn the task that fetches the
    /// initial session and follows changes.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(backend: Arc<dyn Backend>) -> Self {
        // Subscribe first so no change between the initial fetch and the
        // listener starting is missed.
        let events = backend.subscribe();

        let (state, _) = watch::channel(AuthSnapshot::loading());
        let (shutdown, _) = watch::channel(false);
        let inner = Arc::new(Shared {
            resolver: ProfileResolver::new(Arc::clone(&backend)),
            backend,
            state,
            generation: AtomicU64::new(0),
            fresh_events: Mutex::new(None),
            shutdown,
        });

        let driver = tokio::spawn(drive(Arc::clone(&inner), events));

        Self {
            inner,
            driver: Mutex::new(Some(driver)),
        }
    }

    /// Receiver for published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Wait for the first resolution to complete.
    pub async fn wait_until_loaded(&self) -> AuthSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|snapshot| !snapshot.loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Wait until a snapshot for `user_id` has been published, e.g. after a
    /// sign-in whose auth change is still being resolved.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::ShutDown` if the bootstrapper stops first.
    pub async fn wait_for_user(&self, user_id: UserId) -> Result<AuthSnapshot, BootstrapError> {
        let mut rx = self.subscribe();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|stopped| *stopped) => Err(BootstrapError::ShutDown),
            snapshot = rx.wait_for(|s| !s.loading && s.user_id() == Some(user_id)) => {
                snapshot.map(|s| AuthSnapshot::clone(&s)).map_err(|_| BootstrapError::ShutDown)
            }
        }
    }

    /// The backend this bootstrapper talks to.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    /// Sign out.
    ///
    /// Local state is cleared and published before the identity service is
    /// called, so it stays cleared whatever the service answers.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::SignOut` if the identity service call fails.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), BootstrapError> {
        // Subscribe before clearing so changes made after this point are
        // still seen.
        let fresh = self.inner.backend.subscribe();
        *self
            .inner
            .fresh_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(fresh);

        self.inner.state.send_modify(|snapshot| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *snapshot = AuthSnapshot::signed_out();
        });
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);
        info!("Signed out locally");

        self.inner.backend.sign_out().await.map_err(|err| {
            warn!(error = %err, "Remote sign-out failed");
            BootstrapError::SignOut(err)
        })
    }

    /// Re-resolve the current user's profile and publish it, replacing the
    /// cached one.
    ///
    /// Returns `Ok(None)` without doing anything when signed out, and the
    /// newly published profile otherwise (which may be `None` if resolution
    /// failed).
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::ShutDown` after shutdown, and
    /// `BootstrapError::Superseded` if another trigger ran while the profile
    /// was being fetched; the fetched profile is discarded in both cases.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> Result<Option<Profile>, BootstrapError> {
        if self.inner.is_shut_down() {
            return Err(BootstrapError::ShutDown);
        }

        let (generation, user_id) = {
            let snapshot = self.inner.state.borrow();
            (
                self.inner.generation.load(Ordering::SeqCst),
                snapshot.user_id(),
            )
        };
        let Some(user_id) = user_id else {
            debug!("No session, nothing to refresh");
            return Ok(None);
        };

        let mut shutdown = self.inner.shutdown.subscribe();
        let profile = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stopped| *stopped) => return Err(BootstrapError::ShutDown),
            profile = self.inner.resolver.resolve(user_id) => profile,
        };

        let published = self.inner.state.send_if_modified(|snapshot| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            snapshot.profile.clone_from(&profile);
            true
        });

        if published {
            identify(profile.as_ref());
            Ok(profile)
        } else if self.inner.is_shut_down() {
            Err(BootstrapError::ShutDown)
        } else {
            Err(BootstrapError::Superseded)
        }
    }

    /// Stop following auth changes and wait for the driver task to finish.
    ///
    /// In-flight resolutions are dropped and never published.
    pub async fn shutdown(&self) {
        self.inner.stop();
        let driver = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(driver) = driver
            && let Err(err) = driver.await
            && err.is_panic()
        {
            tracing::error!(error = %err, "Session driver panicked");
        }
    }
}

impl Drop for SessionBootstrapper {
    fn drop(&mut self) {
        self.inner.stop();
        if let Some(driver) = self
            .driver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            driver.abort();
        }
    }
}

impl Shared {
    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn stop(&self) {
        self.state.send_if_modified(|_| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            false
        });
        self.shutdown.send_replace(true);
    }

    fn take_fresh_events(&self) -> Option<broadcast::Receiver<AuthStateChange>> {
        self.fresh_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish `snapshot` if `generation` is still current.
    fn publish(&self, generation: u64, snapshot: AuthSnapshot) -> bool {
        let profile = snapshot.profile.clone();
        let signed_in = snapshot.is_signed_in();

        let published = self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = snapshot;
            true
        });

        if published {
            if signed_in {
                identify(profile.as_ref());
            } else {
                clear_sentry_user();
            }
        } else {
            debug!(generation, "Discarding stale resolution");
        }
        published
    }

    /// Fetch the current session and its profile. Never fails.
    async fn initialize(&self) -> AuthSnapshot {
        match self.backend.current_session().await {
            Ok(Some(session)) => {
                let profile = self.resolver.resolve(session.user_id()).await;
                AuthSnapshot {
                    session: Some(session),
                    profile,
                    loading: false,
                }
            }
            Ok(None) => {
                debug!("No session at start-up");
                AuthSnapshot::signed_out()
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch session, continuing signed out");
                AuthSnapshot::signed_out()
            }
        }
    }

    /// Re-resolve for an auth change. Never fails.
    async fn apply_change(&self, change: AuthStateChange) -> AuthSnapshot {
        let event = change.event.to_string();
        add_breadcrumb("auth", "Auth state changed", Some(&[("event", event.as_str())]));

        let profile = match &change.session {
            Some(session) => self.resolver.resolve(session.user_id()).await,
            None => None,
        };
        AuthSnapshot {
            session: change.session,
            profile,
            loading: false,
        }
    }
}

fn identify(profile: Option<&Profile>) {
    if let Some(profile) = profile {
        set_sentry_user(&profile.id, Some(profile.email.as_str()));
    }
}

/// Driver task: initial fetch, then one resolution per auth change.
///
/// Every await is raced against the shutdown signal.
async fn drive(shared: Arc<Shared>, mut events: broadcast::Receiver<AuthStateChange>) {
    let mut shutdown = shared.shutdown.subscribe();

    let generation = shared.next_generation();
    let snapshot = tokio::select! {
        biased;
        _ = shutdown.wait_for(|stopped| *stopped) => return,
        snapshot = shared.initialize() => snapshot,
    };
    shared.publish(generation, snapshot);

    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stopped| *stopped) => break,
            received = events.recv() => received,
        };

        if let Some(fresh) = shared.take_fresh_events() {
            // Whatever was received came from before the sign-out. Anything
            // newer is also queued on the fresh receiver.
            debug!("Dropping auth changes queued before sign-out");
            events = fresh;
            continue;
        }

        let generation = shared.next_generation();
        let snapshot = match received {
            Ok(change) => {
                info!(event = %change.event, "Auth state changed");
                tokio::select! {
                    biased;
                    _ = shutdown.wait_for(|stopped| *stopped) => break,
                    snapshot = shared.apply_change(change) => snapshot,
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed auth changes, re-reading session");
                tokio::select! {
                    biased;
                    _ = shutdown.wait_for(|stopped| *stopped) => break,
                    snapshot = shared.initialize() => snapshot,
                }
            }
            Err(RecvError::Closed) => {
                debug!("Identity service closed its event stream");
                break;
            }
        };
        shared.publish(generation, snapshot);
    }

    debug!("Session driver stopped");
}
