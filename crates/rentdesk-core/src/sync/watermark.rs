//! Polling watermark

use chrono::{DateTime, Utc};

/// Creation time of the newest record the poller has seen.
///
/// Only ever moves forward; the next poll asks for rows strictly newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkCursor {
    at: DateTime<Utc>,
}

impl WatermarkCursor {
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Move to `candidate` if it is newer. Returns whether the cursor moved.
    pub fn advance(&mut self, candidate: DateTime<Utc>) -> bool {
        if candidate > self.at {
            self.at = candidate;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn advance_never_moves_backwards() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut cursor = WatermarkCursor::new(start);

        assert!(!cursor.advance(start));
        assert!(!cursor.advance(start - chrono::Duration::minutes(5)));
        assert_eq!(cursor.at(), start);

        let later = start + chrono::Duration::seconds(1);
        assert!(cursor.advance(later));
        assert_eq!(cursor.at(), later);
    }
}
