use std::time::Duration;

use rentdesk_core::config::SyncTuning;
use rentdesk_core::models::{Consultation, DateRange, Record, Reservation};
use rentdesk_core::realtime::DisabledFeed;
use rentdesk_core::services::DashboardService;
use rentdesk_core::view::{AppliedChange, ApplyOutcome, LiveListView, ViewListState};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cli::{RangeArgs, WatchTarget};
use crate::commands::common::{format_lines, resolve_range, Backend, ListLine};
use crate::error::CliError;

/// The CLI has no websocket transport, so every watch runs on the poller.
const NO_PUSH_REASON: &str = "push channel is not available from the CLI";

#[derive(Debug, Serialize)]
struct WatchItem<'a, R> {
    #[serde(flatten)]
    change: AppliedChange,
    record: Option<&'a R>,
    unread_count: usize,
}

/// First JSON line of a watch: the list as loaded.
#[derive(Debug, Serialize)]
struct WatchSnapshot<'a, R> {
    collection: &'static str,
    records: &'a [R],
    unread_count: usize,
}

pub async fn run_watch(
    target: WatchTarget,
    range: &RangeArgs,
    guard_secs: Option<u64>,
    poll_secs: Option<u64>,
    as_json: bool,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let dashboard = Backend::resolve(profile).await?.dashboard()?;
    let range = resolve_range(range)?;
    let tuning = resolve_tuning(guard_secs, poll_secs)?;

    match target {
        WatchTarget::Consultations => {
            watch_collection::<Consultation>(&dashboard, range, tuning, as_json).await
        }
        WatchTarget::Reservations => {
            watch_collection::<Reservation>(&dashboard, range, tuning, as_json).await
        }
    }
}

/// Environment tuning with command-line overrides on top.
pub fn resolve_tuning(
    guard_secs: Option<u64>,
    poll_secs: Option<u64>,
) -> Result<SyncTuning, CliError> {
    let mut tuning = SyncTuning::from_env()?;
    if let Some(secs) = guard_secs {
        tuning = tuning.with_guard_window(Duration::from_secs(secs));
    }
    if let Some(secs) = poll_secs {
        tuning = tuning.with_poll_interval(Duration::from_secs(secs));
    }
    tuning.validate()?;
    Ok(tuning)
}

async fn watch_collection<R>(
    dashboard: &DashboardService,
    range: DateRange,
    tuning: SyncTuning,
    as_json: bool,
) -> Result<(), CliError>
where
    R: Record + DeserializeOwned + Serialize + ListLine,
{
    let feed = DisabledFeed::new(NO_PUSH_REASON);
    let mut view = LiveListView::<R>::start(&feed, dashboard.client(), range, tuning).await?;

    if as_json {
        println!("{}", initial_json_line(view.state())?);
    } else {
        for line in format_lines(view.state().records()) {
            println!("{line}");
        }
        println!(
            "-- watching {} ({} unread), Ctrl-C to stop",
            R::COLLECTION,
            view.state().unread_count()
        );
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            change = view.next_change() => {
                let Some(change) = change else {
                    break;
                };
                if !change.outcome.changed() {
                    continue;
                }
                let record = view.state().get(change.id);
                if as_json {
                    let item = WatchItem {
                        change,
                        record,
                        unread_count: view.state().unread_count(),
                    };
                    println!("{}", serde_json::to_string(&item)?);
                } else {
                    println!("{}", format_change_line(change, record));
                }
            }
        }
    }

    view.join().await;
    tracing::debug!("Stopped watching {}", R::COLLECTION);
    Ok(())
}

pub fn initial_json_line<R: Record + Serialize>(
    state: &ViewListState<R>,
) -> Result<String, CliError> {
    let snapshot = WatchSnapshot {
        collection: R::COLLECTION.table(),
        records: state.records(),
        unread_count: state.unread_count(),
    };
    Ok(serde_json::to_string(&snapshot)?)
}

pub fn format_change_line<R: ListLine>(change: AppliedChange, record: Option<&R>) -> String {
    let label = match change.outcome {
        ApplyOutcome::Inserted => "new",
        ApplyOutcome::Updated => "changed",
        ApplyOutcome::Removed => "removed",
        ApplyOutcome::Ignored => "ignored",
    };
    match record {
        Some(record) => format!(
            "[{label:<7}] {}",
            record.list_line(chrono::Utc::now()).trim_start()
        ),
        None => format!("[{label:<7}] {}", change.id),
    }
}
