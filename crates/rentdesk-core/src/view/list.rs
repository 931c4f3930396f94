//! Reducer for list screens.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{DateRange, Record, RecordId};
use crate::realtime::ChangeEvent;

/// Effect of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Inserted,
    Updated,
    Removed,
    /// Duplicate insert, unknown id or a row outside the date range
    Ignored,
}

impl ApplyOutcome {
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Records of one collection, newest first, plus unread bookkeeping.
///
/// Events are applied by id, so the same change arriving twice, or from
/// both the push feed and the poller, lands once. The list never holds two
/// records with the same id.
#[derive(Debug, Clone)]
pub struct ViewListState<R> {
    records: Vec<R>,
    unread_count: usize,
    latest_capacity: usize,
    range: DateRange,
}

impl<R: Record> ViewListState<R> {
    #[must_use]
    pub const fn new(latest_capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            unread_count: 0,
            latest_capacity,
            range: DateRange::new(None, None),
        }
    }

    /// Build from a full fetch. Duplicates keep their first occurrence.
    #[must_use]
    pub fn from_records(records: Vec<R>, latest_capacity: usize) -> Self {
        let mut state = Self::new(latest_capacity);
        let mut records = records;
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        for record in records {
            if !state.contains(record.id()) {
                state.records.push(record);
            }
        }
        state.unread_count = state.records.iter().filter(|r| r.is_unread()).count();
        state
    }

    /// Ignore inserts created outside `range` from now on.
    #[must_use]
    pub const fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&R> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.position(id).is_some()
    }

    pub const fn unread_count(&self) -> usize {
        self.unread_count
    }

    /// Replace the counter with an authoritative server count.
    pub fn set_unread_count(&mut self, count: usize) {
        self.unread_count = count;
    }

    /// Newest unread records, at most the configured capacity.
    pub fn latest_unread(&self) -> Vec<&R> {
        self.records
            .iter()
            .filter(|record| record.is_unread())
            .take(self.latest_capacity)
            .collect()
    }

    pub fn newest_created_at(&self) -> Option<DateTime<Utc>> {
        self.records.first().map(Record::created_at)
    }

    pub const fn range(&self) -> DateRange {
        self.range
    }

    /// Apply one change regardless of where it came from.
    pub fn apply(&mut self, event: ChangeEvent<R>) -> ApplyOutcome {
        match event {
            ChangeEvent::Inserted { record, .. } => self.insert(record),
            ChangeEvent::Updated { record, .. } => self.update(record),
            ChangeEvent::Deleted { id, .. } => self.remove(id),
        }
    }

    fn insert(&mut self, record: R) -> ApplyOutcome {
        if self.contains(record.id()) || !self.range.contains(record.created_at()) {
            return ApplyOutcome::Ignored;
        }
        let created_at = record.created_at();
        let index = self
            .records
            .partition_point(|existing| existing.created_at() > created_at);
        if record.is_unread() {
            self.unread_count += 1;
        }
        self.records.insert(index, record);
        ApplyOutcome::Inserted
    }

    fn update(&mut self, record: R) -> ApplyOutcome {
        let Some(index) = self.position(record.id()) else {
            return ApplyOutcome::Ignored;
        };
        let was_unread = self.records[index].is_unread();
        match (was_unread, record.is_unread()) {
            (true, false) => self.unread_count = self.unread_count.saturating_sub(1),
            (false, true) => self.unread_count += 1,
            _ => {}
        }
        self.records[index] = record;
        ApplyOutcome::Updated
    }

    fn remove(&mut self, id: RecordId) -> ApplyOutcome {
        let Some(index) = self.position(id) else {
            return ApplyOutcome::Ignored;
        };
        let removed = self.records.remove(index);
        if removed.is_unread() {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        ApplyOutcome::Removed
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }
}
