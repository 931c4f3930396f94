pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod consultations;
pub mod fleet;
pub mod reservations;
pub mod unread;
pub mod watch;
