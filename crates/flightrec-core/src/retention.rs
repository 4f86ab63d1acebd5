//! Retention windows and post-ingest trimming.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::ChannelBuffer;

/// Ingest count between periodic buffer diagnostics.
const DIAGNOSTIC_EVERY: u64 = 100;

/// Maximum trailing span kept for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionWindow(Duration);

impl RetentionWindow {
    pub fn new(window: Duration) -> Self {
        Self(window)
    }

    /// Resolve a configured per-channel value in seconds.
    ///
    /// `None`, `0` and values that do not fit a [`Duration`] fall back to
    /// `default`; config validation rejects the latter before this runs.
    pub fn resolve(configured_secs: Option<f64>, default: RetentionWindow) -> Self {
        match configured_secs {
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
                .map(Self)
                .unwrap_or(default),
            _ => default,
        }
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Trim `buffer` to this window and return how many entries were evicted.
    ///
    /// `ingest_count` drives the periodic debug line; pass the running
    /// process-wide ingest counter.
    pub fn enforce(&self, channel: &str, buffer: &mut ChannelBuffer, ingest_count: u64) -> usize {
        let evicted = buffer.trim_to(self.0);
        if ingest_count % DIAGNOSTIC_EVERY == 0 {
            debug!(
                channel = %channel,
                buffered = buffer.len(),
                span_secs = buffer.duration().as_secs_f64(),
                window_secs = self.as_secs_f64(),
                "retention check"
            );
        }
        evicted
    }
}
