use rentdesk_core::Collection;
use serde::Serialize;

use crate::commands::common::Backend;
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UnreadCounts {
    pub consultations: usize,
    pub reservations: usize,
}

pub async fn run_unread(as_json: bool, profile: Option<&str>) -> Result<(), CliError> {
    let dashboard = Backend::resolve(profile).await?.dashboard()?;
    let (consultations, reservations) = tokio::try_join!(
        dashboard.unread_count(Collection::Consultations),
        dashboard.unread_count(Collection::Reservations),
    )?;
    let counts = UnreadCounts {
        consultations,
        reservations,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        for line in format_unread_lines(&counts) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_unread_lines(counts: &UnreadCounts) -> Vec<String> {
    vec![
        format!("consultations  {}", counts.consultations),
        format!("reservations   {}", counts.reservations),
    ]
}
