//! Profile editing error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::models::ValidationError;
use crate::services::bootstrap::BootstrapError;

/// Errors that can occur while saving a profile edit.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Nobody is signed in, or their profile could not be resolved.
    #[error("no profile is loaded")]
    NoProfile,

    /// The edit failed local validation; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The record store rejected the write.
    #[error("profile store error: {0}")]
    Backend(#[from] BackendError),

    /// The write went through but the profile could not be republished.
    #[error("profile refresh failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// The write went through but the re-fetch came back empty.
    #[error("profile saved but could not be reloaded")]
    Unavailable,
}
