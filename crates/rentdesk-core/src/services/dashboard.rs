//! Typed back-office operations over the REST client.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::backend::{RowQuery, SupabaseRestClient};
use crate::models::{
    Collection, Consultation, ConsultationStatus, DateRange, Record, RecordId, Reservation,
    ReservationStatus, Vehicle, VehicleModel,
};
use crate::Result;

/// Listing options shared by every collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub range: DateRange,
    pub unread_only: bool,
    pub limit: Option<usize>,
}

impl ListFilter {
    fn to_query(self) -> RowQuery {
        let mut query = RowQuery::new().in_range(self.range).newest_first();
        if self.unread_only {
            query = query.unread_only();
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }
}

/// Cheap to clone; every clone shares one HTTP client.
#[derive(Debug, Clone)]
pub struct DashboardService {
    rest: Arc<SupabaseRestClient>,
}

impl DashboardService {
    #[must_use]
    pub fn new(rest: SupabaseRestClient) -> Self {
        Self {
            rest: Arc::new(rest),
        }
    }

    /// Shared client, for live views that poll through it.
    pub fn client(&self) -> Arc<SupabaseRestClient> {
        Arc::clone(&self.rest)
    }

    pub async fn list<R>(&self, filter: ListFilter) -> Result<Vec<R>>
    where
        R: Record + DeserializeOwned,
    {
        self.rest
            .select(R::COLLECTION.table(), &filter.to_query())
            .await
    }

    pub async fn get<R>(&self, id: RecordId) -> Result<R>
    where
        R: Record + DeserializeOwned,
    {
        self.rest.fetch_one(R::COLLECTION.table(), id).await
    }

    pub async fn delete<R: Record>(&self, id: RecordId) -> Result<()> {
        self.rest.delete(R::COLLECTION.table(), id).await?;
        tracing::info!("Deleted {} {}", R::COLLECTION, id);
        Ok(())
    }

    pub async fn unread_count(&self, collection: Collection) -> Result<usize> {
        self.rest.count_unread(collection.table()).await
    }

    pub async fn mark_consultation_read(&self, id: RecordId) -> Result<Consultation> {
        self.rest
            .mark_processed(Collection::Consultations.table(), id)
            .await
    }

    pub async fn set_consultation_status(
        &self,
        id: RecordId,
        status: ConsultationStatus,
    ) -> Result<Consultation> {
        self.rest
            .update_status(Collection::Consultations.table(), id, status.as_str())
            .await
    }

    pub async fn mark_reservation_read(&self, id: RecordId) -> Result<Reservation> {
        self.rest
            .mark_processed(Collection::Reservations.table(), id)
            .await
    }

    pub async fn set_reservation_status(
        &self,
        id: RecordId,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        self.rest
            .update_status(Collection::Reservations.table(), id, status.as_str())
            .await
    }

    /// Point a vehicle at an uploaded image, or clear it with `None`.
    pub async fn set_vehicle_image(
        &self,
        id: RecordId,
        object_key: Option<&str>,
    ) -> Result<Vehicle> {
        self.rest
            .patch(
                Collection::Vehicles.table(),
                id,
                &serde_json::json!({ "image_path": object_key }),
            )
            .await
    }

    pub async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        self.list(ListFilter::default()).await
    }

    pub async fn vehicle_models(&self) -> Result<Vec<VehicleModel>> {
        self.list(ListFilter::default()).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::BackendConfig;
    use crate::test_support::{at, decoded_request_line, serve_once};

    const ID: &str = "7a1f0c2e-5b3d-4e8a-9c6f-2d1e0b9a8c7f";

    fn service_for(base_url: &str) -> DashboardService {
        let config = BackendConfig::new(base_url, "anon-key", None).unwrap();
        DashboardService::new(SupabaseRestClient::new(&config).unwrap())
    }

    #[test]
    fn list_filter_builds_unread_page_query() {
        let filter = ListFilter {
            range: DateRange::new(Some(at(0)), None),
            unread_only: true,
            limit: Some(10),
        };
        let keys: Vec<String> = filter
            .to_query()
            .to_pairs()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["select", "created_at", "is_read", "order", "limit"]);
    }

    #[tokio::test]
    async fn reservation_status_patch_targets_reservations_table() {
        let body = format!(
            r#"[{{"id":"{ID}","customer_name":"Lee","phone":"010","vehicle_id":"{ID}","start_date":"2024-06-01","end_date":"2024-06-03","status":"confirmed","is_read":true,"created_at":"2024-05-20T10:00:00Z"}}]"#
        );
        let (base_url, request) = serve_once("200 OK", "", &body).await;
        let service = service_for(&base_url);

        let reservation = service
            .set_reservation_status(ID.parse().unwrap(), ReservationStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Confirmed);

        let raw = request.await.unwrap();
        let line = decoded_request_line(&raw);
        assert!(line.starts_with(&format!("PATCH /rest/v1/reservations?id=eq.{ID}")));
        assert!(raw.contains(r#""status":"confirmed""#));
    }

    #[tokio::test]
    async fn vehicle_models_list_hits_model_table() {
        let (base_url, request) = serve_once("200 OK", "", "[]").await;
        let service = service_for(&base_url);

        assert!(service.vehicle_models().await.unwrap().is_empty());
        let raw = request.await.unwrap();
        assert!(decoded_request_line(&raw).starts_with("GET /rest/v1/vehicle_models?select=*"));
    }
}
