//! Change feed subscriptions.
//!
//! A [`ChangeFeed`] opens one subscription per collection. The subscription
//! reports its handshake status and forwards raw change payloads; decoding is
//! left to [`super::normalize_change`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

/// Handshake and lifecycle status reported by a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Subscribed,
    ChannelError(String),
    TimedOut,
    Closed,
}

impl SubscriptionStatus {
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribed => f.write_str("subscribed"),
            Self::ChannelError(reason) => write!(f, "channel error: {reason}"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    Status(SubscriptionStatus),
    Change(Value),
}

/// Source of push notifications for a collection
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription. The handshake completes asynchronously and is
    /// reported through [`FeedSignal::Status`].
    fn subscribe(&self, collection: &str) -> FeedSubscription;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Live handle on one subscription. Dropping it releases the channel.
pub struct FeedSubscription {
    collection: String,
    signals: mpsc::UnboundedReceiver<FeedSignal>,
    release: Option<ReleaseFn>,
    stopped: bool,
}

impl FeedSubscription {
    pub fn new(
        collection: impl Into<String>,
        signals: mpsc::UnboundedReceiver<FeedSignal>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            collection: collection.into(),
            signals,
            release: Some(Box::new(release)),
            stopped: false,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next status or change. `None` once the feed side went away or the
    /// subscription was stopped.
    pub async fn next_signal(&mut self) -> Option<FeedSignal> {
        if self.stopped {
            return None;
        }
        self.signals.recv().await
    }

    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Release the channel. Safe to call any number of times.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.signals.close();
        if let Some(release) = self.release.take() {
            release();
        }
        tracing::debug!("Released {} change subscription", self.collection);
    }
}

impl fmt::Debug for FeedSubscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FeedSubscription")
            .field("collection", &self.collection)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

type Subscribers = HashMap<String, Vec<(u64, mpsc::UnboundedSender<FeedSignal>)>>;

/// In-process change feed.
///
/// Payloads and statuses are published by hand, which makes it a stand-in for
/// the hosted feed in local runs and tests.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
    auto_confirm: bool,
}

impl MemoryFeed {
    /// A feed whose handshakes stay pending until [`Self::set_status`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A feed that confirms every subscription immediately.
    #[must_use]
    pub fn auto_confirm() -> Self {
        Self {
            auto_confirm: true,
            ..Self::default()
        }
    }

    /// Broadcast a status to every subscriber of `collection`.
    pub fn set_status(&self, collection: &str, status: &SubscriptionStatus) -> usize {
        self.broadcast(collection, &FeedSignal::Status(status.clone()))
    }

    /// Broadcast a raw change payload; returns how many subscribers got it.
    pub fn publish(&self, collection: &str, raw: Value) -> usize {
        self.broadcast(collection, &FeedSignal::Change(raw))
    }

    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.lock()
            .get(collection)
            .map_or(0, |senders| senders.iter().filter(|(_, tx)| !tx.is_closed()).count())
    }

    /// Drop every subscriber's sender, as a server-side disconnect would.
    pub fn disconnect_all(&self, collection: &str) {
        self.lock().remove(collection);
    }

    fn broadcast(&self, collection: &str, signal: &FeedSignal) -> usize {
        let mut subscribers = self.lock();
        let Some(senders) = subscribers.get_mut(collection) else {
            return 0;
        };
        senders.retain(|(_, tx)| tx.send(signal.clone()).is_ok());
        senders.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ChangeFeed for MemoryFeed {
    fn subscribe(&self, collection: &str) -> FeedSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.auto_confirm {
            let _ = tx.send(FeedSignal::Status(SubscriptionStatus::Subscribed));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .push((id, tx));

        let subscribers = Arc::clone(&self.subscribers);
        let key = collection.to_string();
        FeedSubscription::new(collection, rx, move || {
            let mut subscribers = subscribers
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(senders) = subscribers.get_mut(&key) {
                senders.retain(|(candidate, _)| *candidate != id);
            }
        })
    }
}

/// Feed used when no realtime transport is configured.
///
/// Every subscription fails its handshake at once, so callers go straight to
/// the polling fallback.
#[derive(Debug, Clone, Default)]
pub struct DisabledFeed {
    reason: Option<String>,
}

impl DisabledFeed {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

impl ChangeFeed for DisabledFeed {
    fn subscribe(&self, collection: &str) -> FeedSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let reason = self
            .reason
            .clone()
            .unwrap_or_else(|| "realtime transport is not configured".to_string());
        let _ = tx.send(FeedSignal::Status(SubscriptionStatus::ChannelError(reason)));
        FeedSubscription::new(collection, rx, || {})
    }
}
