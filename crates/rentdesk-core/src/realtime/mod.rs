//! Push channel: change feed subscriptions and the canonical event type.

mod event;
mod feed;
mod payload;

pub use event::{ChangeEvent, ChangeKind, Provenance};
pub use feed::{
    ChangeFeed, DisabledFeed, FeedSignal, FeedSubscription, MemoryFeed, SubscriptionStatus,
};
pub use payload::normalize_change;
