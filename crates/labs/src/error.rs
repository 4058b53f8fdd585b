//! Unified error handling with Sentry integration.
//!
//! Provides a unified `LabsError` for callers that drive several services
//! (the CLI, `AppState`), plus helpers that keep the Sentry scope in step
//! with the signed-in user.

use thiserror::Error;

use crate::backend::BackendError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::lab_session::LabSessionError;
use crate::services::bootstrap::BootstrapError;
use crate::services::profile::ProfileError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum LabsError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Hosted backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Profile edit failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Sign-out or profile refresh failed.
    #[error("Session error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Lab timer misuse.
    #[error("Lab session error: {0}")]
    LabSession(#[from] LabSessionError),

    /// The command needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,
}

impl LabsError {
    /// Whether the error points at a fault on our side or the service's,
    /// rather than at something the user typed.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Backend(err) => !matches!(
                err,
                BackendError::Unauthorized(_) | BackendError::Conflict(_) | BackendError::NotFound
            ),
            Self::Profile(ProfileError::Backend(_) | ProfileError::Unavailable) => true,
            Self::Bootstrap(BootstrapError::SignOut(_)) => true,
            _ => false,
        }
    }

    /// Log the error, capturing internal failures to Sentry.
    pub fn report(&self) {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Command failed"
            );
        } else {
            tracing::debug!(error = %self, "Command rejected");
        }
    }
}

/// Result type alias for `LabsError`.
pub type Result<T> = std::result::Result<T, LabsError>;

/// Set the Sentry user context from a user ID.
///
/// Called once a profile is resolved so errors are associated with the user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Called on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for session activity.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of auth
/// events leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("auth", "Auth state changed", Some(&[("event", "SIGNED_IN")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labs_error_display() {
        let err = LabsError::NotSignedIn;
        assert_eq!(err.to_string(), "Not signed in");

        let err = LabsError::from(BackendError::Conflict("User already registered".to_string()));
        assert_eq!(
            err.to_string(),
            "Backend error: Conflict: User already registered"
        );
    }

    #[test]
    fn test_user_mistakes_are_not_internal() {
        assert!(!LabsError::NotSignedIn.is_internal());
        assert!(!LabsError::from(BackendError::Unauthorized("bad password".to_string())).is_internal());
        assert!(!LabsError::from(ProfileError::NoProfile).is_internal());
        assert!(
            LabsError::from(BackendError::Api {
                status: 500,
                code: None,
                message: "boom".to_string(),
            })
            .is_internal()
        );
    }
}
