//! rentdesk-core - Core library for Rentdesk
//!
//! Models, the hosted backend clients and the live synchronization used by
//! the back-office surfaces. Lists are loaded once, then kept current by a
//! push change feed with a polling fallback.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod realtime;
pub mod services;
pub mod storage;
pub mod sync;
pub mod util;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
pub use models::{Collection, Record, RecordId};
