use std::path::Path;

use rentdesk_core::models::{RecordId, Vehicle};
use rentdesk_core::services::DashboardService;
use rentdesk_core::storage::SupabaseStorage;

use crate::cli::{ModelCommands, VehicleCommands};
use crate::commands::common::{parse_record_id, print_rows, Backend};
use crate::error::CliError;

const VEHICLE_IMAGE_PREFIX: &str = "vehicles";

pub async fn run_vehicles(command: VehicleCommands, profile: Option<&str>) -> Result<(), CliError> {
    let backend = Backend::resolve(profile).await?;
    let dashboard = backend.dashboard()?;

    match command {
        VehicleCommands::List { json } => {
            let vehicles = dashboard.vehicles().await?;
            print_rows(&vehicles, json, "No vehicles.")
        }
        VehicleCommands::Image { id, path, clear } => {
            let id = parse_record_id(&id)?;
            let storage = backend.storage()?;
            let updated = if clear {
                clear_vehicle_image(&dashboard, &storage, id).await?
            } else if let Some(path) = path {
                replace_vehicle_image(&dashboard, &storage, id, &path).await?
            } else {
                return Err(CliError::InvalidImagePath(String::new()));
            };

            match updated
                .image_path
                .as_deref()
                .and_then(|key| storage.public_object_url(key))
            {
                Some(url) => println!("{} {url}", updated.id),
                None => println!("{}", updated.id),
            }
            Ok(())
        }
    }
}

pub async fn run_models(command: ModelCommands, profile: Option<&str>) -> Result<(), CliError> {
    let dashboard = Backend::resolve(profile).await?.dashboard()?;

    match command {
        ModelCommands::List { json } => {
            let models = dashboard.vehicle_models().await?;
            print_rows(&models, json, "No vehicle models.")
        }
    }
}

/// Upload first, then repoint the row, then drop the previous object.
///
/// A failed cleanup only leaves an orphaned object behind, so it is logged
/// rather than returned.
async fn replace_vehicle_image(
    dashboard: &DashboardService,
    storage: &SupabaseStorage,
    id: RecordId,
    path: &Path,
) -> Result<Vehicle, CliError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::InvalidImagePath(path.display().to_string()))?;
    let previous: Vehicle = dashboard.get(id).await?;
    let bytes = tokio::fs::read(path).await?;

    let object_key = storage.build_image_key(VEHICLE_IMAGE_PREFIX, id, file_name)?;
    storage
        .upload(&object_key, bytes, image_content_type(file_name))
        .await?;
    let updated = dashboard.set_vehicle_image(id, Some(&object_key)).await?;
    tracing::info!("Vehicle {} image set to {}", id, object_key);

    if let Some(old_key) = previous.image_path.as_deref() {
        remove_stale_object(storage, old_key).await;
    }
    Ok(updated)
}

async fn clear_vehicle_image(
    dashboard: &DashboardService,
    storage: &SupabaseStorage,
    id: RecordId,
) -> Result<Vehicle, CliError> {
    let previous: Vehicle = dashboard.get(id).await?;
    let updated = dashboard.set_vehicle_image(id, None).await?;
    if let Some(old_key) = previous.image_path.as_deref() {
        remove_stale_object(storage, old_key).await;
    }
    Ok(updated)
}

async fn remove_stale_object(storage: &SupabaseStorage, object_key: &str) {
    if let Err(error) = storage.remove(object_key).await {
        tracing::warn!("Failed to remove old image {}: {}", object_key, error);
    }
}

/// Content type from the file extension; `None` lets storage sniff it.
pub fn image_content_type(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}
