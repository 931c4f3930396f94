//! Record identity shared by every back-office collection

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary key of a backend row (UUID column `id`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new random record ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Backend tables the back office works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Consultations,
    Reservations,
    Vehicles,
    VehicleModels,
}

impl Collection {
    pub const ALL: [Self; 4] = [
        Self::Consultations,
        Self::Reservations,
        Self::Vehicles,
        Self::VehicleModels,
    ];

    /// Table name as exposed by the REST API and the change feed
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Consultations => "consultations",
            Self::Reservations => "reservations",
            Self::Vehicles => "vehicles",
            Self::VehicleModels => "vehicle_models",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|collection| collection.table() == normalized)
            .ok_or_else(|| format!("unknown collection '{}'", s.trim()))
    }
}

/// A row that can flow through the change feed and the list views.
///
/// Only identity, creation time and the unread marker matter to the sync
/// machinery; everything else is opaque business data.
pub trait Record: Clone + Send + Sync + 'static {
    /// Table the record lives in
    const COLLECTION: Collection;

    fn id(&self) -> RecordId;

    fn created_at(&self) -> DateTime<Utc>;

    /// Whether an operator has yet to acknowledge the record
    fn is_unread(&self) -> bool {
        false
    }
}

/// Inclusive creation-time window for list fetches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    #[must_use]
    pub const fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}
