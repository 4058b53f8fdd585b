//! Editing the signed-in user's profile.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use super::ProfileError;
use crate::models::{Profile, ProfileUpdate};
use crate::services::bootstrap::SessionBootstrapper;

/// Edits the signed-in user's profile.
///
/// Writes go to the record store first; the published profile is then
/// replaced with a fresh fetch, never patched locally.
#[derive(Clone)]
pub struct ProfileEditor {
    bootstrapper: Arc<SessionBootstrapper>,
}

impl ProfileEditor {
    #[must_use]
    pub const fn new(bootstrapper: Arc<SessionBootstrapper>) -> Self {
        Self { bootstrapper }
    }

    /// The edit form, prefilled from the loaded profile.
    #[must_use]
    pub fn form(&self) -> Option<ProfileUpdate> {
        self.bootstrapper
            .snapshot()
            .profile
            .as_ref()
            .map(ProfileUpdate::from_profile)
    }

    /// Validate and save an edit, returning the republished profile.
    ///
    /// # Errors
    ///
    /// - `ProfileError::NoProfile` if no profile is loaded
    /// - `ProfileError::Validation` if a field is invalid; nothing is written
    /// - `ProfileError::Backend` if the store rejects the write
    /// - `ProfileError::Bootstrap` or `ProfileError::Unavailable` if the
    ///   write succeeded but the profile could not be republished
    #[instrument(skip(self, update))]
    pub async fn save(&self, update: &ProfileUpdate) -> Result<Profile, ProfileError> {
        let profile_id = self
            .bootstrapper
            .snapshot()
            .profile
            .map(|p| p.id)
            .ok_or(ProfileError::NoProfile)?;

        let changes = update.validate(Utc::now())?;
        self.bootstrapper
            .backend()
            .update(profile_id, &changes)
            .await?;
        info!(user_id = %profile_id, "Profile updated");

        self.bootstrapper
            .refresh_profile()
            .await?
            .ok_or(ProfileError::Unavailable)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skilltrack_core::{Email, ExperienceLevel};

    use super::*;
    use crate::backend::{Fault, MemoryBackend, Operation};

    async fn signed_in() -> (MemoryBackend, ProfileEditor) {
        let backend = MemoryBackend::new();
        let user = backend.register(&Email::parse("ed@example.com").unwrap(), "pw", Some("Ed"));
        backend.restore_session(user);
        let bootstrapper = Arc::new(SessionBootstrapper::start(Arc::new(backend.clone())));
        bootstrapper.wait_until_loaded().await;
        (backend, ProfileEditor::new(bootstrapper))
    }

    #[tokio::test]
    async fn test_save_writes_through_and_republishes() {
        let (backend, editor) = signed_in().await;
        let mut form = editor.form().unwrap();
        form.bio = "Kubernetes tinkerer".to_owned();
        form.experience_level = ExperienceLevel::Intermediate;

        let saved = editor.save(&form).await.unwrap();
        assert_eq!(saved.bio.as_deref(), Some("Kubernetes tinkerer"));
        assert_eq!(saved.experience_level, ExperienceLevel::Intermediate);
        assert_eq!(backend.profile(saved.id), Some(saved.clone()));
        assert_eq!(editor.bootstrapper.snapshot().profile, Some(saved));
    }

    #[tokio::test]
    async fn test_invalid_edit_is_not_written() {
        let (backend, editor) = signed_in().await;
        let mut form = editor.form().unwrap();
        form.language = String::new();

        let err = editor.save(&form).await.unwrap_err();
        assert!(matches!(err, ProfileError::Validation(e) if e.has_field("language")));
        assert_eq!(backend.calls(Operation::UpdateProfile), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let (backend, editor) = signed_in().await;
        backend.fail(Operation::UpdateProfile, Fault::Unavailable);

        let form = editor.form().unwrap();
        assert!(matches!(
            editor.save(&form).await,
            Err(ProfileError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_save_requires_profile() {
        let backend = MemoryBackend::new();
        let bootstrapper = Arc::new(SessionBootstrapper::start(Arc::new(backend)));
        bootstrapper.wait_until_loaded().await;
        let editor = ProfileEditor::new(bootstrapper);

        assert!(editor.form().is_none());
        let form = ProfileUpdate {
            full_name: String::new(),
            phone: String::new(),
            company: String::new(),
            bio: String::new(),
            experience_level: ExperienceLevel::Beginner,
            timezone: "UTC".to_owned(),
            language: "en".to_owned(),
            notification_preferences: skilltrack_core::NotificationPreferences::default(),
        };
        assert!(matches!(
            editor.save(&form).await,
            Err(ProfileError::NoProfile)
        ));
    }
}
