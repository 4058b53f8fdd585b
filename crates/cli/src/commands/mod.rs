//! Command implementations.
//!
//! Commands write their results to stdout; diagnostics go through `tracing`
//! to stderr.

#![allow(clippy::print_stdout)]

pub mod auth;
pub mod catalog;
pub mod lab;
pub mod profile;

use skilltrack_core::EmailError;
use skilltrack_labs::backend::BackendError;
use skilltrack_labs::catalog::CatalogError;
use skilltrack_labs::config::ConfigError;
use skilltrack_labs::error::LabsError;
use skilltrack_labs::lab_session::LabSessionError;
use skilltrack_labs::services::{BootstrapError, ProfileError};
use thiserror::Error;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Labs(#[from] LabsError),

    /// The email address given on the command line is malformed.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Waiting for Ctrl+C failed.
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

impl CommandError {
    /// Send internal failures to Sentry.
    pub fn capture(&self) {
        if let Self::Labs(err) = self
            && err.is_internal()
        {
            sentry::capture_error(err);
        }
    }
}

macro_rules! labs_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for CommandError {
                fn from(err: $source) -> Self {
                    Self::Labs(LabsError::from(err))
                }
            }
        )*
    };
}

labs_error_from!(
    BackendError,
    BootstrapError,
    CatalogError,
    ConfigError,
    LabSessionError,
    ProfileError,
);
