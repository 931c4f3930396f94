//! Dual-channel synchronization: push feed with a polling fallback.

mod arbiter;
mod live;
mod poller;
mod watermark;

pub use arbiter::{ArbiterAction, ArbiterState, FallbackArbiter, SyncChannelState};
pub use live::{LiveSync, LiveSyncOptions, SyncSnapshot};
pub use poller::{PollSource, PollingFallback};
pub use watermark::WatermarkCursor;
