//! Fleet models: vehicle models and the individual vehicles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Record, RecordId};

/// A make/model offered for rental
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleModel {
    pub id: RecordId,
    pub brand: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub seats: Option<u8>,
    /// Object key of the catalogue image in the storage bucket
    #[serde(default)]
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VehicleModel {
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand.trim(), self.name.trim())
    }
}

impl Record for VehicleModel {
    const COLLECTION: Collection = Collection::VehicleModels;

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A physical car in the fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: RecordId,
    pub model_id: RecordId,
    pub plate_number: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default)]
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

const fn default_available() -> bool {
    true
}

impl Record for Vehicle {
    const COLLECTION: Collection = Collection::Vehicles;

    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_defaults_to_available() {
        let row = r#"{
            "id": "11111111-2222-4333-8444-555555555555",
            "model_id": "66666666-7777-4888-9999-000000000000",
            "plate_number": "12가 3456",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let vehicle: Vehicle = serde_json::from_str(row).unwrap();
        assert!(vehicle.is_available);
        assert!(!vehicle.is_unread());
        assert!(vehicle.image_path.is_none());
    }

    #[test]
    fn model_display_name_joins_brand_and_name() {
        let row = r#"{
            "id": "66666666-7777-4888-9999-000000000000",
            "brand": " Hyundai ",
            "name": "Avante",
            "seats": 5,
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let model: VehicleModel = serde_json::from_str(row).unwrap();
        assert_eq!(model.display_name(), "Hyundai Avante");
        assert_eq!(model.seats, Some(5));
    }
}
