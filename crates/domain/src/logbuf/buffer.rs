use std::collections::VecDeque;

use super::MAX_LOG_LEN;
use super::entity::LogRecord;

/// Bounded FIFO of decision records. Oldest records fall off the front
/// once the buffer holds [`MAX_LOG_LEN`] entries.
#[derive(Debug, Default)]
pub struct LogBuffer {
    records: VecDeque<LogRecord>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
        }
    }

    pub fn append(&mut self, record: LogRecord) {
        self.records.push_back(record);
        while self.records.len() > MAX_LOG_LEN {
            self.records.pop_front();
        }
    }

    /// The newest `min(n, len)` records in insertion order; `n = 0` means
    /// all of them.
    pub fn snapshot(&self, n: usize) -> Vec<LogRecord> {
        let take = if n == 0 {
            self.records.len()
        } else {
            n.min(self.records.len())
        };
        let skip = self.records.len() - take;
        self.records.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
