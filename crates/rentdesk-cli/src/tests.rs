use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use pretty_assertions::assert_eq;
use rentdesk_core::models::{Consultation, ConsultationStatus, Reservation, ReservationStatus};
use rentdesk_core::realtime::Provenance;
use rentdesk_core::view::{AppliedChange, ApplyOutcome, ViewListState};

use crate::cli::{
    Cli, Commands, CompletionShell, ConsultationCommands, ListArgs, RangeArgs, VehicleCommands,
    WatchTarget,
};
use crate::commands::common::{
    format_relative_time, parse_date_bound, parse_record_id, preview, resolve_list_filter,
    resolve_range, ListLine,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{merge_profile, missing_fields, render_profile, ProfileInput};
use crate::commands::consultations::render_consultation;
use crate::commands::fleet::image_content_type;
use crate::commands::reservations::render_reservation;
use crate::commands::unread::{format_unread_lines, UnreadCounts};
use crate::commands::watch::{format_change_line, initial_json_line, resolve_tuning};
use crate::config_profiles::CliProfile;
use crate::error::CliError;

const ID: &str = "0190a5f4-7c2e-7b3a-9d1e-5f6a7b8c9d0e";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
}

fn consultation() -> Consultation {
    serde_json::from_value(serde_json::json!({
        "id": ID,
        "customer_name": "Kim Minji",
        "phone": "010-1234-5678",
        "email": "minji@example.com",
        "message": "Is the   electric SUV available\nnext weekend?",
        "status": "pending",
        "is_read": false,
        "created_at": "2024-05-20T11:30:00Z",
    }))
    .unwrap()
}

fn reservation() -> Reservation {
    serde_json::from_value(serde_json::json!({
        "id": ID,
        "customer_name": "Lee Jun",
        "phone": "010-9876-5432",
        "vehicle_id": ID,
        "start_date": "2024-06-01",
        "end_date": "2024-06-03",
        "status": "confirmed",
        "note": "Child seat please",
        "is_read": true,
        "created_at": "2024-05-18T09:00:00Z",
    }))
    .unwrap()
}

#[test]
fn list_command_parses_range_and_flags() {
    let cli = Cli::try_parse_from([
        "rentdesk",
        "--profile",
        "office",
        "consultations",
        "list",
        "--from",
        "2024-05-01",
        "--unread",
        "-l",
        "20",
        "--json",
    ])
    .unwrap();

    assert_eq!(cli.profile.as_deref(), Some("office"));
    let Commands::Consultations {
        command: ConsultationCommands::List(args),
    } = cli.command
    else {
        panic!("expected consultations list");
    };
    assert_eq!(
        args,
        ListArgs {
            range: RangeArgs {
                from: Some("2024-05-01".to_string()),
                to: None,
            },
            unread: true,
            limit: Some(20),
            json: true,
        }
    );
}

#[test]
fn vehicle_image_requires_path_or_clear() {
    assert!(Cli::try_parse_from(["rentdesk", "vehicles", "image", ID]).is_err());
    assert!(
        Cli::try_parse_from(["rentdesk", "vehicles", "image", ID, "front.png", "--clear"])
            .is_err()
    );

    let cli = Cli::try_parse_from(["rentdesk", "vehicles", "image", ID, "--clear"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Vehicles {
            command: VehicleCommands::Image {
                clear: true,
                path: None,
                ..
            }
        }
    ));
}

#[test]
fn watch_command_accepts_tuning_overrides() {
    let cli = Cli::try_parse_from([
        "rentdesk",
        "watch",
        "reservations",
        "--guard-secs",
        "3",
        "--poll-secs",
        "2",
    ])
    .unwrap();
    let Commands::Watch {
        inbox,
        guard_secs,
        poll_secs,
        json,
        ..
    } = cli.command
    else {
        panic!("expected watch");
    };
    assert_eq!(inbox, WatchTarget::Reservations);
    assert_eq!(inbox.collection().table(), "reservations");
    assert_eq!((guard_secs, poll_secs, json), (Some(3), Some(2), false));
}

#[test]
fn resolve_tuning_applies_overrides_and_rejects_zero() {
    let tuning = resolve_tuning(Some(3), Some(2)).unwrap();
    assert_eq!(tuning.guard_window, Duration::from_secs(3));
    assert_eq!(tuning.poll_interval, Duration::from_secs(2));

    assert!(matches!(
        resolve_tuning(None, Some(0)),
        Err(CliError::Core(rentdesk_core::Error::Config(_)))
    ));
}

#[test]
fn parse_record_id_trims_and_validates() {
    assert_eq!(
        parse_record_id(&format!("  {ID} ")).unwrap().to_string(),
        ID
    );
    assert!(matches!(parse_record_id(" \n "), Err(CliError::EmptyRecordId)));
    assert!(matches!(
        parse_record_id("abc123"),
        Err(CliError::InvalidRecordId(value)) if value == "abc123"
    ));
}

#[test]
fn date_bounds_cover_whole_days() {
    assert_eq!(
        parse_date_bound("2024-05-01", false).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        parse_date_bound(" 2024-05-31 ", true).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap()
    );
    assert_eq!(
        parse_date_bound("2024-05-01T09:00:00+09:00", true).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    );
    assert!(matches!(
        parse_date_bound("05/01/2024", false),
        Err(CliError::InvalidDate(_))
    ));
}

#[test]
fn inverted_range_is_rejected() {
    let args = RangeArgs {
        from: Some("2024-06-01".to_string()),
        to: Some("2024-05-01".to_string()),
    };
    assert!(matches!(resolve_range(&args), Err(CliError::InvertedRange)));

    let same_day = RangeArgs {
        from: Some("2024-05-01".to_string()),
        to: Some("2024-05-01".to_string()),
    };
    let range = resolve_range(&same_day).unwrap();
    assert!(range.contains(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()));
}

#[test]
fn list_filter_carries_unread_and_limit() {
    let filter = resolve_list_filter(&ListArgs {
        unread: true,
        limit: Some(5),
        ..ListArgs::default()
    })
    .unwrap();
    assert!(filter.unread_only);
    assert_eq!(filter.limit, Some(5));
    assert!(filter.range.is_unbounded());
}

#[test]
fn format_relative_time_units() {
    let now = now();
    assert_eq!(
        format_relative_time(now - chrono::Duration::seconds(30), now),
        "just now"
    );
    assert_eq!(
        format_relative_time(now - chrono::Duration::minutes(2), now),
        "2m ago"
    );
    assert_eq!(
        format_relative_time(now - chrono::Duration::hours(2), now),
        "2h ago"
    );
    assert_eq!(
        format_relative_time(now - chrono::Duration::days(15), now),
        "2w ago"
    );
    assert_eq!(
        format_relative_time(now + chrono::Duration::minutes(5), now),
        "just now"
    );
}

#[test]
fn preview_collapses_whitespace_and_truncates() {
    assert_eq!(preview("  Hello   there \nsecond line", 40), "Hello there");
    assert_eq!(
        preview("This is a very long sentence that should be shortened", 20),
        "This is a very lo..."
    );
}

#[test]
fn consultation_line_marks_unread_and_status() {
    let line = consultation().list_line(now());
    assert!(line.starts_with("* 0190a5f4  Kim Minji"));
    assert!(line.contains("pending"));
    assert!(line.contains("Is the electric SUV available"));
    assert!(line.ends_with("30m ago"));
}

#[test]
fn reservation_line_shows_period() {
    let line = reservation().list_line(now());
    assert!(line.starts_with("  0190a5f4  Lee Jun"));
    assert!(line.contains("confirmed"));
    assert!(line.contains("2024-06-01 ~ 2024-06-03 (3d)"));
    assert!(line.ends_with("2d ago"));
}

#[test]
fn detail_views_include_message_and_note() {
    let consultation = render_consultation(&consultation());
    assert!(consultation.contains(&"email:     minji@example.com".to_string()));
    assert_eq!(consultation.last().map(String::as_str), Some("next weekend?"));

    let reservation = render_reservation(&reservation());
    assert!(reservation.contains(&"period:    2024-06-01 ~ 2024-06-03 (3 days)".to_string()));
    assert_eq!(reservation.last().map(String::as_str), Some("Child seat please"));
}

#[test]
fn status_arguments_parse_to_column_values() {
    assert_eq!(
        "in-progress".parse::<ConsultationStatus>().unwrap(),
        ConsultationStatus::InProgress
    );
    assert_eq!(
        "Confirmed".parse::<ReservationStatus>().unwrap(),
        ReservationStatus::Confirmed
    );
    assert!("archived".parse::<ReservationStatus>().is_err());
}

#[test]
fn change_lines_label_outcome() {
    let change = AppliedChange {
        id: ID.parse().unwrap(),
        provenance: Provenance::Polling,
        outcome: ApplyOutcome::Inserted,
    };
    let record = consultation();
    let line = format_change_line(change, Some(&record));
    assert!(line.starts_with("[new    ] * 0190a5f4  Kim Minji"));

    let removed = AppliedChange {
        outcome: ApplyOutcome::Removed,
        ..change
    };
    assert_eq!(
        format_change_line::<Consultation>(removed, None),
        format!("[removed] {ID}")
    );
}

#[test]
fn watch_json_starts_with_loaded_list() {
    let state = ViewListState::from_records(vec![consultation()], 5);
    let line = initial_json_line(&state).unwrap();
    assert!(!line.contains('\n'));

    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["collection"], "consultations");
    assert_eq!(value["unread_count"], 1);
    assert_eq!(value["records"][0]["id"], ID);
}

#[test]
fn applied_change_serializes_flat() {
    let change = AppliedChange {
        id: ID.parse().unwrap(),
        provenance: Provenance::Push,
        outcome: ApplyOutcome::Updated,
    };
    assert_eq!(
        serde_json::to_value(change).unwrap(),
        serde_json::json!({"id": ID, "provenance": "push", "outcome": "updated"})
    );
}

#[test]
fn merge_profile_prefers_flags_then_env_then_stored() {
    let existing = CliProfile {
        supabase_url: Some("https://stored.supabase.co".to_string()),
        supabase_anon_key: Some("stored-key".to_string()),
        storage_bucket: Some("stored-bucket".to_string()),
    };
    let merged = merge_profile(
        ProfileInput {
            supabase_url: Some(" https://flag.supabase.co/ ".to_string()),
            ..ProfileInput::default()
        },
        &existing,
        |key| (key == "RENTDESK_SUPABASE_ANON_KEY").then(|| "env-key".to_string()),
    );

    assert_eq!(
        merged,
        CliProfile {
            supabase_url: Some("https://flag.supabase.co".to_string()),
            supabase_anon_key: Some("env-key".to_string()),
            storage_bucket: Some("stored-bucket".to_string()),
        }
    );
    assert!(missing_fields(&merged).is_empty());
    assert_eq!(
        missing_fields(&CliProfile::default()),
        vec!["supabase_url", "supabase_anon_key"]
    );
}

#[test]
fn render_profile_shows_only_key_tail() {
    let profile = CliProfile {
        supabase_url: Some("https://demo.supabase.co".to_string()),
        supabase_anon_key: Some("eyJhbGciOiJIUzI1NiJ9.secret-part.abc123".to_string()),
        storage_bucket: None,
    };
    let rendered = render_profile("office", &profile).join("\n");
    assert!(rendered.contains("anon_key:        ...abc123"));
    assert!(!rendered.contains("secret-part"));
    assert!(rendered.contains("storage_bucket:  (default)"));
}

#[test]
fn image_content_type_follows_extension() {
    assert_eq!(image_content_type("front.JPG"), Some("image/jpeg"));
    assert_eq!(image_content_type("side.webp"), Some("image/webp"));
    assert_eq!(image_content_type("notes.txt"), None);
    assert_eq!(image_content_type("no-extension"), None);
}

#[test]
fn unread_lines_list_both_inboxes() {
    let lines = format_unread_lines(&UnreadCounts {
        consultations: 3,
        reservations: 0,
    });
    assert_eq!(lines, vec!["consultations  3", "reservations   0"]);
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("rentdesk"));
    assert!(script.contains("consultations"));
}
