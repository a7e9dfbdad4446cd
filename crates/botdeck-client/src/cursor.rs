use std::collections::HashMap;

use botdeck_protocol::{LogEntry, Status};

/// Entries older than the newest timestamp by more than this are assumed
/// already delivered.
pub const LOG_WINDOW_SECS: i64 = 60;

type EntryKey = (i64, String, Status);

/// Deduplicates overlapping `GET /logs?since=` responses.
///
/// The backend filters with `timestamp >= since` and stamps an entry with the
/// time its request started, so the same entry comes back on every poll
/// inside the window and late entries may carry an older timestamp. The
/// cursor counts how often each `(timestamp, text, status)` was delivered and
/// only admits occurrences beyond that count.
#[derive(Debug, Default)]
pub struct LogCursor {
    newest: i64,
    delivered: HashMap<EntryKey, usize>,
}

impl LogCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value to pass as `since`; 0 asks for the full history.
    pub fn since(&self) -> i64 {
        if self.newest == 0 {
            0
        } else {
            (self.newest - LOG_WINDOW_SECS).max(1)
        }
    }

    pub fn newest(&self) -> i64 {
        self.newest
    }

    /// Return the entries of `batch` that have not been delivered before.
    pub fn admit(&mut self, batch: impl IntoIterator<Item = LogEntry>) -> Vec<LogEntry> {
        let mut batch_counts: HashMap<EntryKey, usize> = HashMap::new();
        let mut fresh = Vec::new();

        for entry in batch {
            if self.newest > 0 && entry.timestamp < self.newest - LOG_WINDOW_SECS {
                continue;
            }
            self.newest = self.newest.max(entry.timestamp);

            let key = (entry.timestamp, entry.text.clone(), entry.status);
            let seen_in_batch = batch_counts.entry(key.clone()).or_insert(0);
            *seen_in_batch += 1;
            let delivered = self.delivered.entry(key).or_insert(0);
            if *seen_in_batch > *delivered {
                *delivered = *seen_in_batch;
                fresh.push(entry);
            }
        }

        let horizon = self.newest - LOG_WINDOW_SECS;
        self.delivered.retain(|(ts, _, _), _| *ts >= horizon);
        fresh
    }

    /// Number of tracked keys (for tests and debug output).
    pub fn tracked(&self) -> usize {
        self.delivered.len()
    }
}
