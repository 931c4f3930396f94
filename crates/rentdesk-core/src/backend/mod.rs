//! Hosted backend data API.

mod rest;

pub use rest::{RowQuery, SupabaseRestClient};
