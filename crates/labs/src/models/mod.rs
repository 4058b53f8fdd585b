//! Domain models for sessions and profiles.

pub mod profile;
pub mod session;

pub use profile::{
    FieldError, NewProfile, Profile, ProfileChanges, ProfileUpdate, ValidationError,
};
pub use session::{AuthEvent, AuthStateChange, AuthUser, Session, UserMetadata};
