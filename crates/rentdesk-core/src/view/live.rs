use std::future::Future;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::list::{ApplyOutcome, ViewListState};
use crate::config::SyncTuning;
use crate::models::{DateRange, Record, RecordId};
use crate::realtime::{ChangeEvent, ChangeFeed, Provenance};
use crate::sync::{LiveSync, LiveSyncOptions, PollSource, SyncSnapshot};
use crate::Result;

const EMPTY_LIST_CLOCK_SKEW_SECS: i64 = 300;

/// Backend query used to populate a list on load
pub trait SnapshotSource<R>: Send + Sync + 'static {
    /// Every row of `collection` created within `range`, newest first.
    fn fetch_all(
        &self,
        collection: &str,
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<R>>> + Send;
}

/// One event after it went through the reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedChange {
    pub id: RecordId,
    pub provenance: Provenance,
    pub outcome: ApplyOutcome,
}

/// A list screen's state kept current by a [`LiveSync`].
pub struct LiveListView<R> {
    state: ViewListState<R>,
    sync: LiveSync<R>,
}

impl<R> LiveListView<R>
where
    R: Record + DeserializeOwned,
{
    /// Load the list, then follow changes.
    ///
    /// A failed initial fetch is returned to the caller; nothing is
    /// subscribed in that case.
    pub async fn start<F, S>(
        feed: &F,
        source: Arc<S>,
        range: DateRange,
        tuning: SyncTuning,
    ) -> Result<Self>
    where
        F: ChangeFeed + ?Sized,
        S: SnapshotSource<R> + PollSource<R>,
    {
        tuning.validate()?;
        let collection = R::COLLECTION.table();
        let records = source.fetch_all(collection, range).await?;
        let state = ViewListState::from_records(records, tuning.latest_unread_capacity)
            .with_range(range);
        tracing::debug!("Loaded {} {} rows", state.len(), collection);

        // An empty list has no server timestamp to start from. Back the local
        // clock off so a client running ahead of the server still polls rows
        // created inside that skew; the reducer drops anything already held.
        let watermark = state
            .newest_created_at()
            .unwrap_or_else(|| Utc::now() - TimeDelta::seconds(EMPTY_LIST_CLOCK_SKEW_SECS));
        let sync = LiveSync::start(
            feed,
            source,
            LiveSyncOptions::new(collection)
                .tuning(tuning)
                .watermark(watermark),
        )?;
        Ok(Self { state, sync })
    }

    /// Wait for the next change and apply it. `None` once stopped.
    pub async fn next_change(&mut self) -> Option<AppliedChange> {
        let event = self.sync.recv().await?;
        Some(self.apply(event))
    }

    /// Apply the row a successful mutation returned.
    pub fn apply_local(&mut self, record: R) -> AppliedChange {
        self.apply(ChangeEvent::Updated {
            record,
            prior: None,
            provenance: Provenance::Local,
        })
    }

    /// Drop a row this client just deleted.
    pub fn remove_local(&mut self, id: RecordId) -> AppliedChange {
        self.apply(ChangeEvent::Deleted {
            id,
            prior: None,
            provenance: Provenance::Local,
        })
    }

    fn apply(&mut self, event: ChangeEvent<R>) -> AppliedChange {
        let id = event.record_id();
        let provenance = event.provenance();
        let kind = event.kind();
        let outcome = self.state.apply(event);
        tracing::debug!("{:?} {} via {}: {:?}", kind, id, provenance, outcome);
        AppliedChange {
            id,
            provenance,
            outcome,
        }
    }
}

impl<R> LiveListView<R> {
    pub const fn state(&self) -> &ViewListState<R> {
        &self.state
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.sync.snapshot()
    }

    pub fn stop(&mut self) {
        self.sync.stop();
    }

    /// Stop and wait for the subscription to be released.
    pub async fn join(&mut self) {
        self.sync.join().await;
    }
}
