//! Skilltrack Labs library.
//!
//! Session and profile bootstrap over a hosted identity service and record
//! store, plus the course/lab catalog and the lab session timer. The CLI
//! and the integration tests drive everything through this crate.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod lab_session;
pub mod models;
pub mod services;
pub mod state;
