//! nudge-core - Core library for Nudge
//!
//! Reminder models, the on-device store, and the sync engine that keeps the
//! store in step with a per-user remote collection. The CLI and any other
//! front end drive everything through these types.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Reminder, ReminderId};
