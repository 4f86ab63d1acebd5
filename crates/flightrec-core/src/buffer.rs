//! Per-channel sliding buffer of timestamped messages.
//!
//! A [`ChannelBuffer`] is an oldest-first sequence of [`BufferedMessage`]s.
//! It only ever grows at the tail and shrinks at the head (retention
//! trimming) or all at once (after an export).

use std::collections::vec_deque;
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point in time attached to every buffered message.
pub type Timestamp = DateTime<Utc>;

/// Opaque message body plus the type tag reported by the transport.
///
/// The recorder never looks inside `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub type_tag: String,
    pub data: Vec<u8>,
}

impl Payload {
    pub fn new(type_tag: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            type_tag: type_tag.into(),
            data: data.into(),
        }
    }
}

/// A single message held in a channel buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedMessage {
    pub stamp: Timestamp,
    pub payload: Payload,
}

/// Oldest-first buffer for one channel.
#[derive(Debug, Default)]
pub struct ChannelBuffer {
    messages: VecDeque<BufferedMessage>,
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail.
    ///
    /// Out-of-order stamps are accepted as-is; they only affect later
    /// [`duration`](Self::duration) computations.
    pub fn append(&mut self, stamp: Timestamp, payload: Payload) {
        self.messages.push_back(BufferedMessage { stamp, payload });
    }

    /// Pop oldest entries until the buffered span fits in `max_duration`.
    ///
    /// The newest entry is never popped. Returns the number of entries removed.
    pub fn trim_to(&mut self, max_duration: Duration) -> usize {
        let mut popped = 0;
        while self.messages.len() > 1 && self.duration() > max_duration {
            self.messages.pop_front();
            popped += 1;
        }
        popped
    }

    /// Span between the newest and the oldest entry.
    ///
    /// Zero for fewer than two entries, and zero when out-of-order arrival
    /// left the newest entry older than the oldest one.
    pub fn duration(&self) -> Duration {
        match (self.messages.front(), self.messages.back()) {
            (Some(oldest), Some(newest)) => (newest.stamp - oldest.stamp)
                .to_std()
                .unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Entries `[offset, len)`, oldest first. `offset` past the end yields nothing.
    pub fn slice_from_offset(&self, offset: usize) -> vec_deque::Iter<'_, BufferedMessage> {
        let start = offset.min(self.messages.len());
        self.messages.range(start..)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn oldest(&self) -> Option<&BufferedMessage> {
        self.messages.front()
    }

    pub fn newest(&self) -> Option<&BufferedMessage> {
        self.messages.back()
    }
}
