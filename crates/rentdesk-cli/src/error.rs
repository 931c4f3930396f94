use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] rentdesk_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Not a record ID: {0}")]
    InvalidRecordId(String),
    #[error("Invalid date '{0}': use YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),
    #[error("--from must not be later than --to")]
    InvertedRange,
    #[error("{0}")]
    InvalidStatus(String),
    #[error("Image file has no usable name: {0}")]
    InvalidImagePath(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Backend is not configured. Run `rentdesk config init --supabase-url <URL> --supabase-anon-key <KEY>`, or set RENTDESK_SUPABASE_URL and RENTDESK_SUPABASE_ANON_KEY."
    )]
    BackendNotConfigured,
    #[error("Profile '{0}' is not signed in. Run `rentdesk auth login --email <email> --password <password>`.")]
    NotSignedIn(String),
}
