//! Profile resolution and editing.
//!
//! [`ProfileResolver`] fetches a user's profile and creates the default
//! record on first sign-in. Failures degrade to "no profile"; they are
//! logged here and never returned.
//!
//! [`ProfileEditor`] writes validated edits through to the store and then
//! republishes the stored record via the session bootstrapper.

mod editor;
mod error;

pub use editor::ProfileEditor;
pub use error::ProfileError;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use skilltrack_core::UserId;

use crate::backend::{Backend, BackendError, ProfileLookup};
use crate::models::{NewProfile, Profile};

/// Fetch-or-create for profile records.
#[derive(Clone)]
pub struct ProfileResolver {
    backend: Arc<dyn Backend>,
}

impl ProfileResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Resolve the profile for `user_id`.
    ///
    /// - an existing record is returned as stored, without writing
    /// - a missing record is created with the default values, taking email
    ///   and display name from the current user
    /// - any failure yields `None`
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn resolve(&self, user_id: UserId) -> Option<Profile> {
        match self.backend.select_by_id(user_id).await {
            ProfileLookup::Found(profile) => {
                debug!("Profile found");
                Some(profile)
            }
            ProfileLookup::NotFound => {
                info!("No profile yet, creating default");
                self.create_default(user_id).await
            }
            ProfileLookup::Failed(err) => {
                tracing::error!(error = %err, "Profile lookup failed");
                None
            }
        }
    }

    async fn create_default(&self, user_id: UserId) -> Option<Profile> {
        let user = match self.backend.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("No current user, cannot create profile");
                return None;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch current user");
                return None;
            }
        };

        if user.id != user_id {
            warn!(current_user = %user.id, "Current user changed during profile resolution");
            return None;
        }

        let Some(new_profile) = NewProfile::for_user(&user) else {
            warn!("Current user has no email, cannot create profile");
            return None;
        };

        match self.backend.insert(&new_profile).await {
            Ok(profile) => {
                info!("Created default profile");
                Some(profile)
            }
            // Another client created it first; the stored record wins and
            // is picked up on the next resolution.
            Err(BackendError::Conflict(message)) => {
                warn!(%message, "Profile was created concurrently");
                None
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to create profile");
                None
            }
        }
    }
}
