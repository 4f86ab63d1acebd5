//! Structured observability hooks for the recorder.
//!
//! This module provides:
//! - Dump-scoped tracing spans via the `DumpSpan` RAII guard
//! - Emission functions for subscription and dump lifecycle events
//!
//! Events carry an `event` field (`dump.started`, `channel.subscribed`, ...)
//! so they can be filtered in JSON log pipelines.

use tracing::info;

/// RAII guard that enters a dump-scoped span for the duration of a dump.
pub struct DumpSpan {
    _span: tracing::span::EnteredSpan,
}

impl DumpSpan {
    /// Create and enter a span tagged with the dump id.
    pub fn enter(dump_id: &str) -> Self {
        let span = tracing::info_span!("flightrec.dump", dump_id = %dump_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a channel went from pending to active.
pub fn emit_channel_subscribed(channel: &str, message_type: &str) {
    info!(event = "channel.subscribed", channel = %channel, message_type = %message_type);
}

/// Emit event: dump started. `window_secs` is `None` when exporting everything.
pub fn emit_dump_started(export_name: &str, window_secs: Option<f64>) {
    info!(
        event = "dump.started",
        export_name = %export_name,
        window_secs = ?window_secs,
    );
}

/// Emit event: one channel's slice was written.
pub fn emit_channel_exported(channel: &str, exported: u64, offset: usize) {
    info!(
        event = "dump.channel_exported",
        channel = %channel,
        exported = exported,
        offset = offset,
    );
}

/// Emit event: dump finished and the log was published.
pub fn emit_dump_finished(path: &str, total_exported: u64, duration_ms: u64) {
    info!(
        event = "dump.finished",
        path = %path,
        total_exported = total_exported,
        duration_ms = duration_ms,
    );
}

/// Emit event: dump aborted (warning level).
pub fn emit_dump_failed(export_name: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "dump.failed", export_name = %export_name, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_span_create() {
        let _span = DumpSpan::enter("test-dump-id");
    }
}
