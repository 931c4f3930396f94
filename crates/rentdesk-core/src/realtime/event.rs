//! Canonical change events

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::models::{Record, RecordId};

/// Delivery path that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Server-initiated change feed
    Push,
    /// Synthesized by the polling fallback
    Polling,
    /// Echo of a mutation this client just made
    Local,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "push",
            Self::Polling => "polling",
            Self::Local => "local",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown change kind '{other}'")),
        }
    }
}

/// A single insert/update/delete on one record.
///
/// Events are ephemeral: produced by the feed or the poller, applied to a
/// view, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<R> {
    Inserted {
        record: R,
        provenance: Provenance,
    },
    Updated {
        record: R,
        prior: Option<R>,
        provenance: Provenance,
    },
    /// Delete feeds often carry only the primary key of the old row, so the
    /// id is always present and the full prior row only sometimes.
    Deleted {
        id: RecordId,
        prior: Option<R>,
        provenance: Provenance,
    },
}

impl<R: Record> ChangeEvent<R> {
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Inserted { record, .. } | Self::Updated { record, .. } => record.id(),
            Self::Deleted { id, .. } => *id,
        }
    }

    #[must_use]
    pub const fn provenance(&self) -> Provenance {
        match self {
            Self::Inserted { provenance, .. }
            | Self::Updated { provenance, .. }
            | Self::Deleted { provenance, .. } => *provenance,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Inserted { .. } => ChangeKind::Insert,
            Self::Updated { .. } => ChangeKind::Update,
            Self::Deleted { .. } => ChangeKind::Delete,
        }
    }

    /// The row as it is after the change, if it still exists
    #[must_use]
    pub const fn current(&self) -> Option<&R> {
        match self {
            Self::Inserted { record, .. } | Self::Updated { record, .. } => Some(record),
            Self::Deleted { .. } => None,
        }
    }
}
