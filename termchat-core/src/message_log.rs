use std::collections::VecDeque;

use termchat_protocol::{Message, Timestamp};

pub const DEFAULT_LOG_CAPACITY: usize = 20;

/// Bounded, append-only, chronologically ordered message store.
///
/// Once full, every append evicts the oldest entry first.
pub struct MessageLog {
    entries: VecDeque<Message>,
    capacity: usize,
}

impl MessageLog {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `message`, returning the entry evicted to make room, if any.
    pub fn append(&mut self, message: Message) -> Option<Message> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(message);
        evicted
    }

    /// Stamps and appends a new message.
    ///
    /// Timestamps in the log are kept strictly increasing: if `now` does not come after
    /// the newest entry it is moved one microsecond past it. An update cursor compared
    /// with `>` therefore never skips an entry.
    pub fn post(&mut self, sender: &str, content: &str, now: Timestamp) -> (Message, Option<Message>) {
        let timestamp = match self.newest_timestamp() {
            Some(newest) if now <= newest => newest.succ(),
            _ => now,
        };
        let message = Message::new(sender, timestamp, content);
        let evicted = self.append(message.clone());
        (message, evicted)
    }

    pub fn first_after(&self, timestamp: Timestamp) -> Option<&Message> {
        self.position_after(timestamp).map(|(_, message)| message)
    }

    /// Like [`first_after`](Self::first_after), also reporting the entry's index.
    pub fn position_after(&self, timestamp: Timestamp) -> Option<(usize, &Message)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, message)| message.timestamp() > timestamp)
    }

    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        self.entries.back().map(|m| m.timestamp())
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.entries.front().map(|m| m.timestamp())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
