//! Live synchronization of one collection.
//!
//! [`LiveSync`] owns a background task that drives the change feed
//! subscription, the guard timer, the fallback arbiter and the polling
//! fallback. Whatever path delivers a change, the consumer receives it as a
//! [`ChangeEvent`] through a single channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::arbiter::{ArbiterAction, ArbiterState, FallbackArbiter, SyncChannelState};
use super::poller::{PollSource, PollingFallback};
use super::watermark::WatermarkCursor;
use crate::config::SyncTuning;
use crate::models::Record;
use crate::realtime::{
    normalize_change, ChangeEvent, ChangeFeed, FeedSignal, FeedSubscription, Provenance,
    SubscriptionStatus,
};
use crate::Result;

/// Settings for one [`LiveSync`] run.
#[derive(Debug, Clone)]
pub struct LiveSyncOptions {
    collection: String,
    tuning: SyncTuning,
    watermark: Option<DateTime<Utc>>,
}

impl LiveSyncOptions {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            tuning: SyncTuning::default(),
            watermark: None,
        }
    }

    #[must_use]
    pub const fn tuning(mut self, tuning: SyncTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Creation time the poller starts from. Defaults to the start time.
    #[must_use]
    pub const fn watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = Some(watermark);
        self
    }
}

/// Point-in-time view of the synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub channel: SyncChannelState,
    pub arbiter: ArbiterState,
    pub polling: bool,
    pub watermark: DateTime<Utc>,
}

/// Handle on a running synchronization. Dropping it stops the run.
pub struct LiveSync<R> {
    collection: String,
    events: mpsc::Receiver<ChangeEvent<R>>,
    status: watch::Receiver<SyncSnapshot>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl<R> LiveSync<R>
where
    R: Record + DeserializeOwned,
{
    /// Subscribe to `feed` and spawn the driver task.
    ///
    /// Invalid tuning is rejected before anything is subscribed. Must be
    /// called from within a tokio runtime.
    pub fn start<F, S>(feed: &F, source: Arc<S>, options: LiveSyncOptions) -> Result<Self>
    where
        F: ChangeFeed + ?Sized,
        S: PollSource<R>,
    {
        let LiveSyncOptions {
            collection,
            tuning,
            watermark,
        } = options;
        tuning.validate()?;
        let cursor = WatermarkCursor::new(watermark.unwrap_or_else(Utc::now));

        let poller = PollingFallback::new(
            collection.clone(),
            source,
            cursor,
            tuning.poll_interval,
        )?;
        let subscription = feed.subscribe(&collection);
        let arbiter = FallbackArbiter::new();

        let (event_tx, event_rx) = mpsc::channel(tuning.event_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(SyncSnapshot {
            channel: arbiter.channel_state(),
            arbiter: arbiter.state(),
            polling: false,
            watermark: cursor.at(),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tracing::info!(
            "Starting live sync for {} (guard {:?}, poll every {:?})",
            collection,
            tuning.guard_window,
            tuning.poll_interval
        );

        let driver = Driver {
            collection: collection.clone(),
            subscription,
            arbiter,
            poller,
            guard_window: tuning.guard_window,
            events: event_tx,
            status: status_tx,
        };
        let task = tokio::spawn(driver.run(shutdown_rx));

        Ok(Self {
            collection,
            events: event_rx,
            status: status_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            stopped: false,
        })
    }
}

impl<R> LiveSync<R> {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next change from either delivery path. `None` after [`Self::stop`].
    pub async fn recv(&mut self) -> Option<ChangeEvent<R>> {
        if self.stopped {
            return None;
        }
        self.events.recv().await
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        *self.status.borrow()
    }

    /// Receiver that is notified whenever the snapshot changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncSnapshot> {
        self.status.clone()
    }

    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the run. Idempotent; no event is returned by [`Self::recv`]
    /// afterwards, even one that was already buffered.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.events.close();
        while self.events.try_recv().is_ok() {}
        tracing::info!("Stopping live sync for {}", self.collection);
    }

    /// Stop and wait until the driver has released its subscription.
    pub async fn join(&mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                if !error.is_cancelled() {
                    tracing::warn!("Live sync task for {} failed: {}", self.collection, error);
                }
            }
        }
    }
}

impl<R> Drop for LiveSync<R> {
    fn drop(&mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Driver<R, S> {
    collection: String,
    subscription: FeedSubscription,
    arbiter: FallbackArbiter,
    poller: PollingFallback<R, S>,
    guard_window: Duration,
    events: mpsc::Sender<ChangeEvent<R>>,
    status: watch::Sender<SyncSnapshot>,
}

impl<R, S> Driver<R, S>
where
    R: Record + DeserializeOwned,
    S: PollSource<R>,
{
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let guard = tokio::time::sleep(self.guard_window);
        tokio::pin!(guard);
        let mut feed_open = true;

        loop {
            let keep_going = tokio::select! {
                _ = &mut shutdown => false,
                signal = self.subscription.next_signal(), if feed_open => match signal {
                    Some(FeedSignal::Status(status)) => {
                        self.on_status(&status);
                        true
                    }
                    Some(FeedSignal::Change(raw)) => self.on_change(&raw).await,
                    None => {
                        feed_open = false;
                        self.on_status(&SubscriptionStatus::Closed);
                        true
                    }
                },
                () = &mut guard, if self.arbiter.guard_armed() => {
                    tracing::warn!(
                        "No confirmation from {} change feed within {:?}, falling back to polling",
                        self.collection,
                        self.guard_window
                    );
                    let action = self.arbiter.on_guard_elapsed();
                    self.apply(action);
                    true
                }
                batch = self.poller.next_batch() => self.deliver_all(batch).await,
            };
            self.publish_status();
            if !keep_going {
                break;
            }
        }

        let action = self.arbiter.stop();
        self.apply(action);
        self.publish_status();
        tracing::info!("Live sync for {} stopped", self.collection);
    }

    fn on_status(&mut self, status: &SubscriptionStatus) {
        let action = if status.is_live() {
            tracing::info!("Change feed for {} is live", self.collection);
            self.arbiter.on_live()
        } else {
            tracing::warn!("Change feed for {} degraded: {}", self.collection, status);
            self.arbiter.on_degraded()
        };
        self.apply(action);
    }

    async fn on_change(&mut self, raw: &Value) -> bool {
        match normalize_change::<R>(raw, Provenance::Push) {
            Ok(event) => {
                let action = self.arbiter.on_push_event();
                self.apply(action);
                self.deliver(event).await
            }
            Err(error) => {
                tracing::warn!(
                    "Skipping malformed {} change payload: {}",
                    self.collection,
                    error
                );
                true
            }
        }
    }

    fn apply(&mut self, action: ArbiterAction) {
        match action {
            ArbiterAction::StartPolling => self.poller.start(),
            ArbiterAction::StopPolling | ArbiterAction::Shutdown => self.poller.stop(),
            ArbiterAction::None => {}
        }
        if action == ArbiterAction::Shutdown {
            self.subscription.stop();
        }
    }

    async fn deliver_all(&mut self, batch: Vec<ChangeEvent<R>>) -> bool {
        for event in batch {
            if !self.deliver(event).await {
                return false;
            }
        }
        true
    }

    /// Returns false once the consumer is gone.
    async fn deliver(&mut self, event: ChangeEvent<R>) -> bool {
        self.events.send(event).await.is_ok()
    }

    fn publish_status(&self) {
        let snapshot = SyncSnapshot {
            channel: self.arbiter.channel_state(),
            arbiter: self.arbiter.state(),
            polling: self.poller.is_active(),
            watermark: self.poller.cursor().at(),
        };
        self.status.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::realtime::{DisabledFeed, MemoryFeed};
    use crate::test_support::{at, row, FakeTable, Row};
    use crate::Error;

    const COLLECTION: &str = "consultations";

    fn tuning() -> SyncTuning {
        SyncTuning::default()
            .with_guard_window(Duration::from_secs(10))
            .with_poll_interval(Duration::from_secs(5))
    }

    fn start(feed: &MemoryFeed, table: &Arc<FakeTable>) -> LiveSync<Row> {
        LiveSync::start(
            feed,
            Arc::clone(table),
            LiveSyncOptions::new(COLLECTION)
                .tuning(tuning())
                .watermark(at(0)),
        )
        .unwrap()
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    fn insert_payload(row: &Row) -> Value {
        serde_json::json!({ "eventType": "INSERT", "new": row.to_json(), "old": {} })
    }

    #[tokio::test(start_paused = true)]
    async fn silent_feed_starts_polling_after_guard_window() {
        let feed = MemoryFeed::new();
        let table = Arc::new(FakeTable::default());
        let mut sync = start(&feed, &table);

        sleep_secs(9).await;
        assert!(!sync.snapshot().polling);
        assert_eq!(sync.snapshot().arbiter, ArbiterState::AwaitingPush);

        sleep_secs(2).await;
        let snapshot = sync.snapshot();
        assert!(snapshot.polling);
        assert_eq!(snapshot.arbiter, ArbiterState::PollingActive);
        assert_eq!(snapshot.channel, SyncChannelState::Degraded);

        let fresh = row(30);
        table.insert(fresh.clone());
        let event = sync.recv().await.unwrap();
        assert_eq!(event.record_id(), fresh.id);
        assert_eq!(event.provenance(), Provenance::Polling);
        assert_eq!(sync.snapshot().watermark, at(30));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_handshake_suppresses_polling() {
        let feed = MemoryFeed::new();
        let table = Arc::new(FakeTable::default());
        let sync = start(&feed, &table);

        sleep_secs(1).await;
        feed.set_status(COLLECTION, &SubscriptionStatus::Subscribed);
        sleep_secs(30).await;

        let snapshot = sync.snapshot();
        assert!(!snapshot.polling);
        assert_eq!(snapshot.arbiter, ArbiterState::PushConfirmed);
        assert_eq!(snapshot.channel, SyncChannelState::Live);
        assert!(table.queries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn push_events_are_delivered_with_push_provenance() {
        let feed = MemoryFeed::auto_confirm();
        let table = Arc::new(FakeTable::default());
        let mut sync = start(&feed, &table);

        let fresh = row(5);
        sleep_secs(1).await;
        feed.publish(COLLECTION, insert_payload(&fresh));

        let event = sync.recv().await.unwrap();
        assert_eq!(event.provenance(), Provenance::Push);
        assert_eq!(event.current(), Some(&fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn channel_error_polls_until_a_push_event_arrives() {
        let feed = MemoryFeed::new();
        let table = Arc::new(FakeTable::default());
        let mut sync = start(&feed, &table);

        sleep_secs(1).await;
        feed.set_status(
            COLLECTION,
            &SubscriptionStatus::ChannelError("socket closed".to_string()),
        );
        sleep_secs(1).await;
        assert!(sync.snapshot().polling);

        feed.set_status(COLLECTION, &SubscriptionStatus::Subscribed);
        sleep_secs(1).await;
        assert_eq!(sync.snapshot().arbiter, ArbiterState::PollingWithPush);
        assert!(sync.snapshot().polling);

        feed.publish(COLLECTION, insert_payload(&row(40)));
        let event = sync.recv().await.unwrap();
        assert_eq!(event.provenance(), Provenance::Push);

        sleep_secs(1).await;
        let snapshot = sync.snapshot();
        assert!(!snapshot.polling);
        assert_eq!(snapshot.arbiter, ArbiterState::PushConfirmed);

        let queries = table.queries().len();
        sleep_secs(60).await;
        assert_eq!(table.queries().len(), queries);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_feed_counts_as_degraded() {
        let feed = MemoryFeed::auto_confirm();
        let table = Arc::new(FakeTable::default());
        let sync = start(&feed, &table);

        sleep_secs(1).await;
        assert_eq!(sync.snapshot().arbiter, ArbiterState::PushConfirmed);

        feed.disconnect_all(COLLECTION);
        sleep_secs(1).await;
        assert!(sync.snapshot().polling);
        assert_eq!(sync.snapshot().channel, SyncChannelState::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payloads_are_skipped() {
        let feed = MemoryFeed::auto_confirm();
        let table = Arc::new(FakeTable::default());
        let mut sync = start(&feed, &table);
        sleep_secs(1).await;

        feed.publish(COLLECTION, serde_json::json!({ "eventType": "TRUNCATE" }));
        let fresh = row(3);
        feed.publish(COLLECTION, insert_payload(&fresh));

        let event = sync.recv().await.unwrap();
        assert_eq!(event.record_id(), fresh.id);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_silences_both_paths() {
        let feed = MemoryFeed::new();
        let table = Arc::new(FakeTable::default());
        let mut sync = start(&feed, &table);

        sleep_secs(11).await;
        assert!(sync.snapshot().polling);

        sync.stop();
        sync.stop();
        sync.join().await;
        assert!(sync.is_stopped());
        assert_eq!(sync.snapshot().arbiter, ArbiterState::Stopped);
        assert!(!sync.snapshot().polling);
        assert_eq!(feed.subscriber_count(COLLECTION), 0);

        let queries = table.queries().len();
        table.insert(row(50));
        assert_eq!(feed.publish(COLLECTION, insert_payload(&row(51))), 0);
        sleep_secs(60).await;

        assert_eq!(sync.recv().await, None);
        assert_eq!(table.queries().len(), queries);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_any_verdict_is_safe() {
        let feed = MemoryFeed::new();
        let table = Arc::new(FakeTable::default());
        let mut sync = start(&feed, &table);

        sync.join().await;
        sync.join().await;
        sleep_secs(30).await;
        assert!(table.queries().is_empty());
        assert_eq!(feed.subscriber_count(COLLECTION), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_is_rejected_before_subscribing() {
        let feed = MemoryFeed::new();
        let table = Arc::new(FakeTable::default());
        let zero = tuning().with_poll_interval(Duration::ZERO);

        let result = LiveSync::<Row>::start(
            &feed,
            Arc::clone(&table),
            LiveSyncOptions::new(COLLECTION).tuning(zero),
        );
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(feed.subscriber_count(COLLECTION), 0);

        let disabled = DisabledFeed::default();
        let result = LiveSync::<Row>::start(
            &disabled,
            table,
            LiveSyncOptions::new(COLLECTION).tuning(SyncTuning {
                guard_window: Duration::ZERO,
                ..tuning()
            }),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn status_receiver_sees_fallback_to_polling() {
        let feed = DisabledFeed::default();
        let table = Arc::new(FakeTable::default());
        let sync = LiveSync::<Row>::start(
            &feed,
            Arc::clone(&table),
            LiveSyncOptions::new(COLLECTION)
                .tuning(tuning())
                .watermark(at(0)),
        )
        .unwrap();
        let mut status = sync.subscribe_status();

        status
            .wait_for(|snapshot| snapshot.polling)
            .await
            .unwrap();
        assert_eq!(status.borrow().channel, SyncChannelState::Degraded);
    }
}
