use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rentdesk_core::backend::SupabaseRestClient;
use rentdesk_core::config::BackendConfig;
use rentdesk_core::models::{Consultation, DateRange, RecordId, Reservation, Vehicle, VehicleModel};
use rentdesk_core::services::{DashboardService, ListFilter};
use rentdesk_core::storage::SupabaseStorage;

use crate::auth::{AuthSession, SupabaseAuthService};
use crate::cli::{ListArgs, RangeArgs};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Backend handles for one resolved profile
pub struct Backend {
    pub profile_name: String,
    pub config: BackendConfig,
    pub session: Option<AuthSession>,
}

impl Backend {
    /// Resolve the profile's backend and restore its signed-in session.
    ///
    /// Falls back to `RENTDESK_*` environment variables when the profile
    /// carries no backend settings.
    pub async fn resolve(explicit_profile: Option<&str>) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(explicit_profile);

        let from_profile = match config.profile(&profile_name) {
            Some(profile) => profile.backend_config()?,
            None => None,
        };
        let backend = match from_profile {
            Some(backend) => backend,
            None => BackendConfig::from_env()?.ok_or(CliError::BackendNotConfigured)?,
        };

        let session = SupabaseAuthService::new(&profile_name, &backend)
            .map_err(|error| CliError::Auth(error.to_string()))?
            .restore_session()
            .await
            .map_err(|error| CliError::Auth(error.to_string()))?;
        tracing::debug!(
            "Profile '{}' resolved (signed_in={})",
            profile_name,
            session.is_some()
        );

        Ok(Self {
            profile_name,
            config: backend,
            session,
        })
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    /// Back-office tables are only readable by a signed-in operator.
    pub fn require_session(&self) -> Result<(), CliError> {
        if self.session.is_some() {
            Ok(())
        } else {
            Err(CliError::NotSignedIn(self.profile_name.clone()))
        }
    }

    pub fn dashboard(&self) -> Result<DashboardService, CliError> {
        self.require_session()?;
        let rest = SupabaseRestClient::new(&self.config)?.with_access_token(self.access_token());
        Ok(DashboardService::new(rest))
    }

    pub fn storage(&self) -> Result<SupabaseStorage, CliError> {
        self.require_session()?;
        Ok(SupabaseStorage::new(&self.config)?.with_access_token(self.access_token()))
    }
}

pub fn parse_record_id(id: &str) -> Result<RecordId, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyRecordId);
    }
    trimmed
        .parse::<RecordId>()
        .map_err(|_| CliError::InvalidRecordId(trimmed.to_string()))
}

/// Accept a calendar date or a full RFC 3339 timestamp.
///
/// A bare date expands to the start of the day, or its last second when it
/// closes the range.
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, CliError> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(value.to_string()))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| CliError::InvalidDate(value.to_string()))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

pub fn resolve_range(args: &RangeArgs) -> Result<DateRange, CliError> {
    let from = args
        .from
        .as_deref()
        .map(|value| parse_date_bound(value, false))
        .transpose()?;
    let to = args
        .to
        .as_deref()
        .map(|value| parse_date_bound(value, true))
        .transpose()?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(CliError::InvertedRange);
        }
    }
    Ok(DateRange::new(from, to))
}

pub fn resolve_list_filter(args: &ListArgs) -> Result<ListFilter, CliError> {
    Ok(ListFilter {
        range: resolve_range(&args.range)?,
        unread_only: args.unread,
        limit: args.limit,
    })
}

/// One line per row in the plain-text listings.
pub trait ListLine {
    fn list_line(&self, now: DateTime<Utc>) -> String;
}

fn short_id(id: RecordId) -> String {
    id.to_string().chars().take(8).collect()
}

const fn unread_marker(unread: bool) -> char {
    if unread {
        '*'
    } else {
        ' '
    }
}

impl ListLine for Consultation {
    fn list_line(&self, now: DateTime<Utc>) -> String {
        let preview = preview(&self.message, 40);
        let name = preview_name(&self.customer_name);
        format!(
            "{} {}  {name:<16}  {:<11}  {preview:<40}  {}",
            unread_marker(!self.is_read),
            short_id(self.id),
            self.status.as_str(),
            format_relative_time(self.created_at, now)
        )
    }
}

impl ListLine for Reservation {
    fn list_line(&self, now: DateTime<Utc>) -> String {
        let name = preview_name(&self.customer_name);
        format!(
            "{} {}  {name:<16}  {:<10}  {} ~ {} ({}d)  {}",
            unread_marker(!self.is_read),
            short_id(self.id),
            self.status.as_str(),
            self.start_date,
            self.end_date,
            self.rental_days(),
            format_relative_time(self.created_at, now)
        )
    }
}

impl ListLine for Vehicle {
    fn list_line(&self, _now: DateTime<Utc>) -> String {
        let availability = if self.is_available {
            "available"
        } else {
            "rented"
        };
        let image = if self.image_path.is_some() {
            "image"
        } else {
            "-"
        };
        format!(
            "{}  {:<12}  {:<9}  {}",
            self.id, self.plate_number, availability, image
        )
    }
}

impl ListLine for VehicleModel {
    fn list_line(&self, _now: DateTime<Utc>) -> String {
        let category = self.category.as_deref().unwrap_or("-");
        format!("{}  {:<24}  {category}", self.id, self.display_name())
    }
}

pub fn format_lines<R: ListLine>(rows: &[R]) -> Vec<String> {
    let now = Utc::now();
    rows.iter().map(|row| row.list_line(now)).collect()
}

fn preview_name(name: &str) -> String {
    preview(name, 16)
}

/// First line, whitespace collapsed, cut to `max_chars` with an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - at).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn print_rows<R>(rows: &[R], as_json: bool, empty_label: &str) -> Result<(), CliError>
where
    R: ListLine + serde::Serialize,
{
    if as_json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if rows.is_empty() {
        println!("{empty_label}");
    } else {
        for line in format_lines(rows) {
            println!("{line}");
        }
    }
    Ok(())
}
