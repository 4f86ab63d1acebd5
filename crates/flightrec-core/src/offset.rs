//! Maps a requested trailing duration to a buffer offset.
//!
//! The offset is interpolated over message *count*, not time: it assumes
//! roughly uniform spacing and avoids a search over timestamps.

use std::time::Duration;

use crate::buffer::ChannelBuffer;

/// Outcome of resolving a trailing duration against one buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetResolution {
    /// First index of the slice to export.
    pub offset: usize,
    /// Span actually held by the buffer.
    pub available: Duration,
    /// Span the caller asked for.
    pub requested: Duration,
    /// True when the buffer held no more than the requested span, so
    /// everything was selected.
    pub partial: bool,
}

/// Resolve the export offset for the last `requested` of `buffer`.
///
/// `requested` must be non-zero; "export everything" is handled by the caller.
pub fn resolve_offset(buffer: &ChannelBuffer, requested: Duration) -> OffsetResolution {
    let available = buffer.duration();
    let ratio = if available.is_zero() {
        1.0
    } else {
        requested.as_secs_f64() / available.as_secs_f64()
    };
    let fraction_to_drop = 1.0 - ratio.min(1.0);
    let offset = (buffer.len() as f64 * fraction_to_drop).floor() as usize;

    OffsetResolution {
        offset,
        available,
        requested,
        partial: requested >= available,
    }
}
