use rentdesk_core::models::{Reservation, ReservationStatus};
use rentdesk_core::services::DashboardService;

use crate::cli::{ListArgs, ReservationCommands};
use crate::commands::common::{
    format_relative_time, parse_record_id, print_rows, resolve_list_filter, Backend,
};
use crate::error::CliError;

pub async fn run_reservations(
    command: ReservationCommands,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let dashboard = Backend::resolve(profile).await?.dashboard()?;

    match command {
        ReservationCommands::List(args) => run_list(&dashboard, &args).await,
        ReservationCommands::Show { id, json } => {
            let reservation: Reservation = dashboard.get(parse_record_id(&id)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reservation)?);
            } else {
                for line in render_reservation(&reservation) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        ReservationCommands::Read { id } => {
            let updated = dashboard
                .mark_reservation_read(parse_record_id(&id)?)
                .await?;
            println!("{}", updated.id);
            Ok(())
        }
        ReservationCommands::Status { id, status } => {
            let status = status
                .parse::<ReservationStatus>()
                .map_err(CliError::InvalidStatus)?;
            let updated = dashboard
                .set_reservation_status(parse_record_id(&id)?, status)
                .await?;
            println!("{} {}", updated.id, updated.status);
            Ok(())
        }
        ReservationCommands::Delete { id } => {
            let id = parse_record_id(&id)?;
            dashboard.delete::<Reservation>(id).await?;
            println!("{id}");
            Ok(())
        }
    }
}

pub async fn run_list(dashboard: &DashboardService, args: &ListArgs) -> Result<(), CliError> {
    let filter = resolve_list_filter(args)?;
    let reservations: Vec<Reservation> = dashboard.list(filter).await?;
    print_rows(&reservations, args.json, "No reservations.")
}

pub fn render_reservation(reservation: &Reservation) -> Vec<String> {
    let now = chrono::Utc::now();
    let mut lines = vec![
        format!("id:        {}", reservation.id),
        format!("customer:  {}", reservation.customer_name),
        format!("phone:     {}", reservation.phone),
        format!("vehicle:   {}", reservation.vehicle_id),
        format!(
            "period:    {} ~ {} ({} days)",
            reservation.start_date,
            reservation.end_date,
            reservation.rental_days()
        ),
        format!("status:    {}", reservation.status),
        format!(
            "read:      {}",
            if reservation.is_read { "yes" } else { "no" }
        ),
        format!(
            "received:  {} ({})",
            reservation.created_at.format("%Y-%m-%d %H:%M UTC"),
            format_relative_time(reservation.created_at, now)
        ),
    ];
    if let Some(note) = reservation.note.as_deref() {
        lines.push(String::new());
        lines.extend(note.lines().map(str::to_string));
    }
    lines
}
