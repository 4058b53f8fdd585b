//! Skilltrack Core - Shared types library.
//!
//! This crate provides the domain vocabulary shared by the Skilltrack crates:
//! - `labs` - Session bootstrap, profile resolution, catalog and lab timer
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! Everything here can be constructed and validated offline.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for user IDs, emails, prices and profile enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
