//! Time-windowed polling used while the push channel is degraded.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::watermark::WatermarkCursor;
use crate::models::Record;
use crate::realtime::{ChangeEvent, Provenance};
use crate::{Error, Result};

/// Backend query used by the poller
pub trait PollSource<R>: Send + Sync + 'static {
    /// Rows of `collection` created strictly after `after`, newest first.
    fn created_after(
        &self,
        collection: &str,
        after: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<R>>> + Send;
}

type TickResult<R> = (u64, Result<Vec<R>>);

/// Periodic `created_at > watermark` query that synthesizes inserts.
///
/// Each tick runs its query as a separate task so a slow query never delays
/// the next tick; overlapping ticks may return the same rows, which the view
/// reducer absorbs.
pub struct PollingFallback<R, S> {
    collection: String,
    source: Arc<S>,
    cursor: WatermarkCursor,
    period: Duration,
    ticker: Option<Interval>,
    in_flight: JoinSet<TickResult<R>>,
    ticks: u64,
    _record: PhantomData<fn() -> R>,
}

impl<R, S> PollingFallback<R, S>
where
    R: Record,
    S: PollSource<R>,
{
    /// Fails on a zero `period`, which the interval timer cannot run.
    pub fn new(
        collection: impl Into<String>,
        source: Arc<S>,
        cursor: WatermarkCursor,
        period: Duration,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }
        Ok(Self {
            collection: collection.into(),
            source,
            cursor,
            period,
            ticker: None,
            in_flight: JoinSet::new(),
            ticks: 0,
            _record: PhantomData,
        })
    }

    pub const fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    pub const fn cursor(&self) -> WatermarkCursor {
        self.cursor
    }

    /// Number of ticks launched so far
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Arm the interval. The first tick fires one period from now.
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        tracing::info!(
            "Polling {} every {:?} for rows after {}",
            self.collection,
            self.period,
            self.cursor.at()
        );
    }

    /// Cancel the interval and abort in-flight queries. Safe when idle.
    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            tracing::info!("Stopped polling {}", self.collection);
        }
        self.in_flight.abort_all();
    }

    /// Wait for the next tick that yields at least one row.
    ///
    /// Pending forever while inactive. Cancel-safe: a tick and its launch, or
    /// a result and its absorption, always happen within the same poll.
    pub async fn next_batch(&mut self) -> Vec<ChangeEvent<R>> {
        loop {
            tokio::select! {
                () = next_tick(&mut self.ticker) => self.launch_tick(),
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    match joined {
                        Ok((tick, result)) => {
                            let events = self.absorb(tick, result);
                            if !events.is_empty() {
                                return events;
                            }
                        }
                        Err(error) if error.is_cancelled() => {}
                        Err(error) => {
                            tracing::warn!("Poll task for {} failed: {}", self.collection, error);
                        }
                    }
                }
            }
        }
    }

    fn launch_tick(&mut self) {
        self.ticks += 1;
        let tick = self.ticks;
        let after = self.cursor.at();
        let source = Arc::clone(&self.source);
        let collection = self.collection.clone();
        tracing::trace!("Poll tick {} for {} after {}", tick, collection, after);
        self.in_flight.spawn(async move {
            let result = source.created_after(&collection, after).await;
            (tick, result)
        });
    }

    /// Turn one tick's rows into inserts and move the watermark.
    ///
    /// A failed query is logged and produces nothing; the next tick retries
    /// from the same watermark.
    pub fn absorb(&mut self, tick: u64, result: Result<Vec<R>>) -> Vec<ChangeEvent<R>> {
        let rows = match result {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(
                    "Poll tick {} for {} failed, will retry: {}",
                    tick,
                    self.collection,
                    error
                );
                return Vec::new();
            }
        };

        if let Some(newest) = rows.iter().map(Record::created_at).max() {
            self.cursor.advance(newest);
        }
        if !rows.is_empty() {
            tracing::debug!(
                "Poll tick {} for {} returned {} rows, watermark now {}",
                tick,
                self.collection,
                rows.len(),
                self.cursor.at()
            );
        }

        rows.into_iter()
            .map(|record| ChangeEvent::Inserted {
                record,
                provenance: Provenance::Polling,
            })
            .collect()
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
