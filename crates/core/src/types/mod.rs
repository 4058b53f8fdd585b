//! Core types for Skilltrack.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod profile;

pub use email::{Email, EmailError};
pub use id::{UserId, UserIdError};
pub use price::{CurrencyCode, Price};
pub use profile::*;
