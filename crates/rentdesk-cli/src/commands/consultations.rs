use rentdesk_core::models::{Consultation, ConsultationStatus};
use rentdesk_core::services::DashboardService;

use crate::cli::{ConsultationCommands, ListArgs};
use crate::commands::common::{
    format_relative_time, parse_record_id, print_rows, resolve_list_filter, Backend,
};
use crate::error::CliError;

pub async fn run_consultations(
    command: ConsultationCommands,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let dashboard = Backend::resolve(profile).await?.dashboard()?;

    match command {
        ConsultationCommands::List(args) => run_list(&dashboard, &args).await,
        ConsultationCommands::Show { id, json } => {
            let consultation: Consultation = dashboard.get(parse_record_id(&id)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&consultation)?);
            } else {
                for line in render_consultation(&consultation) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        ConsultationCommands::Read { id } => {
            let updated = dashboard
                .mark_consultation_read(parse_record_id(&id)?)
                .await?;
            println!("{}", updated.id);
            Ok(())
        }
        ConsultationCommands::Status { id, status } => {
            let status = status
                .parse::<ConsultationStatus>()
                .map_err(CliError::InvalidStatus)?;
            let updated = dashboard
                .set_consultation_status(parse_record_id(&id)?, status)
                .await?;
            println!("{} {}", updated.id, updated.status);
            Ok(())
        }
        ConsultationCommands::Delete { id } => {
            let id = parse_record_id(&id)?;
            dashboard.delete::<Consultation>(id).await?;
            println!("{id}");
            Ok(())
        }
    }
}

pub async fn run_list(dashboard: &DashboardService, args: &ListArgs) -> Result<(), CliError> {
    let filter = resolve_list_filter(args)?;
    let consultations: Vec<Consultation> = dashboard.list(filter).await?;
    print_rows(&consultations, args.json, "No consultations.")
}

pub fn render_consultation(consultation: &Consultation) -> Vec<String> {
    let now = chrono::Utc::now();
    let mut lines = vec![
        format!("id:        {}", consultation.id),
        format!("customer:  {}", consultation.customer_name),
        format!("phone:     {}", consultation.phone),
    ];
    if let Some(email) = consultation.email.as_deref() {
        lines.push(format!("email:     {email}"));
    }
    if let Some(vehicle_id) = consultation.vehicle_id {
        lines.push(format!("vehicle:   {vehicle_id}"));
    }
    lines.push(format!("status:    {}", consultation.status));
    lines.push(format!(
        "read:      {}",
        if consultation.is_read { "yes" } else { "no" }
    ));
    lines.push(format!(
        "received:  {} ({})",
        consultation.created_at.format("%Y-%m-%d %H:%M UTC"),
        format_relative_time(consultation.created_at, now)
    ));
    lines.push(String::new());
    lines.extend(consultation.message.lines().map(str::to_string));
    lines
}
