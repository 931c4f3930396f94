//! Reservation model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Record, RecordId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown reservation status '{other}'")),
        }
    }
}

/// A customer's booking of a vehicle for a date span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: RecordId,
    pub customer_name: String,
    pub phone: String,
    pub vehicle_id: RecordId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Rental length in days, counting both ends
    #[must_use]
    pub fn rental_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days().max(0) + 1
    }
}

impl Record for Reservation {
    const COLLECTION: Collection = Collection::Reservations;

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_unread(&self) -> bool {
        !self.is_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_row_and_counts_days() {
        let row = r#"{
            "id": "3b0f4e0c-2d1a-4a4e-8f3a-0c5e6d7f8a9b",
            "customer_name": "Park",
            "phone": "010-9999-0000",
            "vehicle_id": "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d",
            "start_date": "2024-06-01",
            "end_date": "2024-06-03",
            "status": "confirmed",
            "is_read": true,
            "created_at": "2024-05-20T12:00:00Z"
        }"#;

        let reservation: Reservation = serde_json::from_str(row).unwrap();
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.rental_days(), 3);
        assert!(!reservation.is_unread());
        assert!(reservation.note.is_none());
    }

    #[test]
    fn status_display_matches_column_values() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Active,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            assert_eq!(status.as_str().parse::<ReservationStatus>().unwrap(), status);
        }
    }
}
