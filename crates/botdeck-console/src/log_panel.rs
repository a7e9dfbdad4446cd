//! Scrolling log view with bounded retention.

use std::collections::VecDeque;

use botdeck_protocol::{LogEntry, Status};
use chrono::Utc;

pub const DEFAULT_CAPACITY: usize = 500;
const DEFAULT_VIEWPORT: usize = 10;

/// One line to show, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// Runtime entry reported by the backend's log endpoint.
    Runtime(LogEntry),
    /// Message received on a push namespace.
    Channel {
        namespace: String,
        event: String,
        status: Status,
        message: String,
    },
}

impl LogRecord {
    /// Runtime-style record stamped with the current time.
    pub fn local(status: Status, text: impl Into<String>) -> Self {
        LogRecord::Runtime(LogEntry {
            text: text.into(),
            status,
            timestamp: Utc::now().timestamp(),
        })
    }

    pub fn status(&self) -> Status {
        match self {
            LogRecord::Runtime(entry) => entry.status,
            LogRecord::Channel { status, .. } => *status,
        }
    }

    pub fn format(&self) -> String {
        match self {
            LogRecord::Runtime(entry) => {
                let ts = entry
                    .time()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| entry.timestamp.to_string());
                format!(
                    "[{ts}] {}: {}",
                    entry.status.as_str().to_uppercase(),
                    entry.text
                )
            }
            LogRecord::Channel {
                namespace,
                event,
                status,
                message,
            } => format!(
                "[{namespace}/{event}] Status: {}, Message: {message}",
                status.as_str().to_uppercase()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    /// Drives the line colour.
    pub status: Status,
}

/// Ring buffer of formatted lines plus a scroll offset (index of the first
/// visible line).
#[derive(Debug)]
pub struct LogPanel {
    lines: VecDeque<LogLine>,
    capacity: usize,
    offset: usize,
    viewport: usize,
}

impl Default for LogPanel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogPanel {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            offset: 0,
            viewport: DEFAULT_VIEWPORT,
        }
    }

    /// Format and append one record. A view sitting at the bottom before the
    /// append follows the new line; a scrolled-back view keeps showing the
    /// same lines.
    pub fn append(&mut self, record: &LogRecord) {
        let follow = self.is_at_bottom();
        self.lines.push_back(LogLine {
            text: record.format(),
            status: record.status(),
        });
        if self.lines.len() > self.capacity {
            self.lines.pop_front();
            if !follow {
                self.offset = self.offset.saturating_sub(1);
            }
        }
        if follow {
            self.scroll_to_bottom();
        }
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a LogRecord>) {
        for record in records {
            self.append(record);
        }
    }

    pub fn is_at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    /// Number of lines the frontend can show. Keeps a following view pinned.
    pub fn set_viewport(&mut self, height: usize) {
        let follow = self.is_at_bottom();
        self.viewport = height.max(1);
        if follow {
            self.scroll_to_bottom();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = (self.offset + lines).min(self.max_offset());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn visible(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter().skip(self.offset).take(self.viewport)
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.viewport)
    }
}
