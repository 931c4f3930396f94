//! Local list state fed by live changes.

mod list;
mod live;

pub use list::{ApplyOutcome, ViewListState};
pub use live::{AppliedChange, LiveListView, SnapshotSource};
