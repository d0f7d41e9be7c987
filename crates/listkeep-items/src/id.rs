//! Item ID generation.
//!
//! IDs are millisecond Unix timestamps rendered as decimal strings. Within
//! one generator they strictly increase: an ID that would repeat or go
//! backwards is bumped to one past the previous. Two writers in different
//! processes or devices can still produce the same ID in the same
//! millisecond; the later write then replaces the earlier item.

use chrono::Utc;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct ItemIdGenerator {
    last: Mutex<i64>,
}

impl ItemIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&self, now_ms: i64) -> String {
        let mut last = self.last.lock();
        let id = if now_ms > *last { now_ms } else { *last + 1 };
        *last = id;
        id.to_string()
    }
}
