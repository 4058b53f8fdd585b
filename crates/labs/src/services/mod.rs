//! Business logic services.
//!
//! # Services
//!
//! - `bootstrap` - Session bootstrap: keeps (session, profile) current and
//!   publishes it
//! - `profile` - Profile fetch-or-create and profile editing

pub mod bootstrap;
pub mod profile;

pub use bootstrap::{AuthSnapshot, BootstrapError, SessionBootstrapper};
pub use profile::{ProfileEditor, ProfileError, ProfileResolver};
