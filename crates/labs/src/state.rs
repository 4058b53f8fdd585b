//! Application state shared across commands.

use std::sync::Arc;

use crate::backend::{Backend, SupabaseClient};
use crate::catalog::Catalog;
use crate::config::LabsConfig;
use crate::error::LabsError;
use crate::services::{ProfileEditor, SessionBootstrapper};

/// Application state shared across all commands.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend, the running session bootstrap and the catalog.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: LabsConfig,
    bootstrapper: Arc<SessionBootstrapper>,
    catalog: Catalog,
}

impl AppState {
    /// Connect to the hosted backend and start the session bootstrap.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built, the persisted session
    /// cannot be read, or the embedded catalog is invalid.
    pub async fn connect(config: LabsConfig) -> Result<Self, LabsError> {
        let client = SupabaseClient::connect(&config).await?;
        Self::with_backend(config, Arc::new(client))
    }

    /// Start the session bootstrap against any backend.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded catalog is invalid.
    pub fn with_backend(config: LabsConfig, backend: Arc<dyn Backend>) -> Result<Self, LabsError> {
        let catalog = Catalog::embedded()?;
        let bootstrapper = Arc::new(SessionBootstrapper::start(backend));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                bootstrapper,
                catalog,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LabsConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        self.inner.bootstrapper.backend()
    }

    #[must_use]
    pub fn bootstrapper(&self) -> &Arc<SessionBootstrapper> {
        &self.inner.bootstrapper
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Editor for the signed-in user's profile.
    #[must_use]
    pub fn profile_editor(&self) -> ProfileEditor {
        ProfileEditor::new(Arc::clone(&self.inner.bootstrapper))
    }
}
