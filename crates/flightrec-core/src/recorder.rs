//! Snapshot coordinator: owns the channel buffers and runs dumps.
//!
//! Ingest path: gate check -> append -> retention trim.
//! Dump path: serialize on the dump lock, close the gate, write every active
//! channel's selected slice to a sink, publish the sink, clear the exported
//! buffers, reopen the gate.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::buffer::{ChannelBuffer, Payload, Timestamp};
use crate::config::{ChannelConfig, RecorderConfig};
use crate::error::{RecorderError, Result};
use crate::gate::{IngestionGate, RecorderMode};
use crate::metrics::METRICS;
use crate::obs::{self, DumpSpan};
use crate::offset::resolve_offset;
use crate::retention::RetentionWindow;
use crate::sink::{export_path, SinkFactory};

/// Messages written between progress lines during an export.
const EXPORT_PROGRESS_EVERY: usize = 100;

/// Format of generated export names (local time).
pub const EXPORT_NAME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Pending => f.write_str("pending"),
            SubscriptionStatus::Active => f.write_str("active"),
        }
    }
}

/// One configured channel and its buffer.
#[derive(Debug)]
pub struct Channel {
    name: String,
    retention: RetentionWindow,
    message_type: OnceLock<String>,
    buffer: Mutex<ChannelBuffer>,
}

impl Channel {
    fn new(config: ChannelConfig) -> Self {
        Self {
            name: config.name,
            retention: config.retention,
            message_type: OnceLock::new(),
            buffer: Mutex::new(ChannelBuffer::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retention(&self) -> RetentionWindow {
        self.retention
    }

    /// Type tag recorded at activation.
    pub fn message_type(&self) -> Option<&str> {
        self.message_type.get().map(String::as_str)
    }

    pub fn status(&self) -> SubscriptionStatus {
        if self.message_type.get().is_some() {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Pending
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == SubscriptionStatus::Active
    }

    fn activate(&self, message_type: &str) -> bool {
        self.message_type.set(message_type.to_string()).is_ok()
    }

    fn lock_buffer(&self) -> MutexGuard<'_, ChannelBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A message as handed over by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub payload: Payload,
    /// Stamp embedded in the message itself, if it carries one.
    pub header_stamp: Option<Timestamp>,
    /// Arrival time supplied by the transport.
    pub received_at: Timestamp,
}

impl IncomingMessage {
    pub fn effective_stamp(&self) -> Timestamp {
        self.header_stamp.unwrap_or(self.received_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Appended; `evicted` older entries were trimmed.
    Buffered { evicted: usize },
    /// Dropped because a dump is running.
    GateClosed,
    /// Dropped because the channel is not subscribed yet.
    Pending,
    UnknownChannel,
}

/// A dump request as received over the control boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpRequest {
    /// Export name, optionally under a relative subdirectory (`runs/snap1`).
    /// An empty or absent file name is generated from local time.
    #[serde(default)]
    pub name: Option<String>,
    /// Trailing seconds to export; `0` or absent exports everything.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Channels to export; absent or empty exports every active channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
}

/// How much of each buffer a dump selects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportWindow {
    All,
    Trailing(Duration),
}

impl DumpRequest {
    pub fn new(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: Some(name.into()),
            duration: Some(duration),
            channels: None,
        }
    }

    /// Restrict the dump to `channels`.
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `channel` is part of this request's selection.
    pub fn selects(&self, channel: &str) -> bool {
        match &self.channels {
            Some(selected) if !selected.is_empty() => selected.iter().any(|c| c == channel),
            _ => true,
        }
    }

    pub fn window(&self) -> Result<ExportWindow> {
        match self.duration {
            None => Ok(ExportWindow::All),
            Some(d) if !d.is_finite() || d < 0.0 => Err(RecorderError::InvalidDuration(d)),
            Some(d) if d == 0.0 => Ok(ExportWindow::All),
            Some(d) => Duration::try_from_secs_f64(d)
                .map(ExportWindow::Trailing)
                .map_err(|_| RecorderError::InvalidDuration(d)),
        }
    }

    /// Validated export name relative to the output directory.
    ///
    /// `dir/name` keeps the subdirectory; a missing file name (`""` or
    /// `dir/`) is generated from `now`. Absolute paths, `..` components,
    /// backslashes and NUL are rejected.
    pub fn export_name(&self, now: DateTime<Local>) -> Result<String> {
        let raw = self.name.as_deref().map(str::trim).unwrap_or_default();
        let invalid = || RecorderError::InvalidExportName(raw.to_string());
        if raw.contains(['\\', '\0']) || Path::new(raw).is_absolute() {
            return Err(invalid());
        }

        let (dir, file) = raw.rsplit_once('/').unwrap_or(("", raw));
        let file = if file.is_empty() {
            now.format(EXPORT_NAME_FORMAT).to_string()
        } else {
            file.to_string()
        };
        let name = if dir.is_empty() {
            file
        } else {
            format!("{dir}/{file}")
        };

        let path = Path::new(&name);
        let relative = path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !relative || path.file_name().is_none() {
            return Err(invalid());
        }
        Ok(name)
    }
}

/// Per-channel note describing how much history was exported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportNote {
    All,
    Complete {
        requested_secs: f64,
    },
    Partial {
        requested_secs: f64,
        available_secs: f64,
    },
}

impl fmt::Display for ExportNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportNote::All => f.write_str("all messages exported"),
            ExportNote::Complete { requested_secs } => {
                write!(f, "the requested {requested_secs} seconds were exported")
            }
            ExportNote::Partial {
                requested_secs,
                available_secs,
            } => write!(
                f,
                "only {available_secs:.3} of the requested {requested_secs} seconds were available, all messages exported"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelExport {
    pub channel: String,
    pub exported: u64,
    pub note: ExportNote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpReport {
    pub dump_id: Uuid,
    pub export_name: String,
    pub path: PathBuf,
    pub digest: Option<String>,
    /// Exported channels, in configuration order.
    pub channels: Vec<ChannelExport>,
    /// Selected channels skipped because they never subscribed.
    pub pending_count: usize,
    pub total_exported: u64,
}

impl DumpReport {
    pub fn exported_for(&self, channel: &str) -> Option<&ChannelExport> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    /// Human-readable summary returned over the control boundary.
    pub fn status_text(&self) -> String {
        let mut out = format!(
            "Exported {} messages to {}",
            self.total_exported,
            self.path.display()
        );
        for c in &self.channels {
            let _ = write!(
                out,
                "\n  {} [{}] {} messages: {}",
                c.channel,
                SubscriptionStatus::Active,
                c.exported,
                c.note
            );
        }
        if self.pending_count > 0 {
            let _ = write!(
                out,
                "\n  {} channel(s) still pending subscription, skipped",
                self.pending_count
            );
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel: String,
    pub status: SubscriptionStatus,
    pub message_type: Option<String>,
    pub buffered: usize,
    pub buffered_secs: f64,
    pub retention_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderStatus {
    pub mode: RecorderMode,
    pub channels: Vec<ChannelStatus>,
}

impl RecorderStatus {
    pub fn total_buffered(&self) -> usize {
        self.channels.iter().map(|c| c.buffered).sum()
    }

    pub fn status_text(&self) -> String {
        let mut out = format!(
            "Mode: {:?}, {} messages buffered",
            self.mode,
            self.total_buffered()
        );
        for c in &self.channels {
            let _ = write!(
                out,
                "\n  {} [{}] {} messages, {:.3}s of {:.3}s window",
                c.channel, c.status, c.buffered, c.buffered_secs, c.retention_secs
            );
        }
        out
    }
}

pub struct Recorder {
    channels: Vec<Channel>,
    index: HashMap<String, usize>,
    gate: IngestionGate,
    dump_lock: Mutex<()>,
    sinks: Arc<dyn SinkFactory>,
    output_dir: PathBuf,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("channels", &self.channels.len())
            .field("mode", &self.gate.mode())
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl Recorder {
    /// Build a recorder for `channels` (configuration order is kept).
    ///
    /// Duplicate names keep their first entry.
    pub fn new(
        channels: Vec<ChannelConfig>,
        output_dir: impl Into<PathBuf>,
        sinks: Arc<dyn SinkFactory>,
    ) -> Self {
        let mut index = HashMap::new();
        let mut slots = Vec::with_capacity(channels.len());
        for config in channels {
            if index.contains_key(&config.name) {
                continue;
            }
            index.insert(config.name.clone(), slots.len());
            slots.push(Channel::new(config));
        }

        Self {
            channels: slots,
            index,
            gate: IngestionGate::new(),
            dump_lock: Mutex::new(()),
            sinks,
            output_dir: output_dir.into(),
        }
    }

    /// Validate `config`, prepare its output directory and build a recorder.
    pub fn from_config(config: &RecorderConfig, sinks: Arc<dyn SinkFactory>) -> Result<Self> {
        config.validate()?;
        let output_dir = config.ensure_output_dir()?;
        let recorder = Self::new(config.resolved_channels(), output_dir, sinks);
        for c in &recorder.channels {
            info!(
                channel = %c.name,
                retention_secs = c.retention.as_secs_f64(),
                "channel configured"
            );
        }
        Ok(recorder)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.index.get(name).map(|&i| &self.channels[i])
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    pub fn mode(&self) -> RecorderMode {
        self.gate.mode()
    }

    pub fn pending_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|c| !c.is_active())
            .map(Channel::name)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_active()).count()
    }

    /// Mark `channel` active with the given message type.
    ///
    /// Returns `true` only on the pending -> active transition; later calls
    /// and unknown channels return `false`.
    pub fn activate(&self, channel: &str, message_type: &str) -> bool {
        let Some(slot) = self.channel(channel) else {
            return false;
        };
        let activated = slot.activate(message_type);
        if activated {
            obs::emit_channel_subscribed(channel, message_type);
        }
        activated
    }

    /// Buffer one message for `channel`, then trim to its retention window.
    pub fn ingest(&self, channel: &str, message: IncomingMessage) -> IngestOutcome {
        let Some(slot) = self.channel(channel) else {
            trace!(channel = %channel, "message for unconfigured channel dropped");
            return IngestOutcome::UnknownChannel;
        };
        if !slot.is_active() {
            METRICS.inc_messages_dropped();
            return IngestOutcome::Pending;
        }

        let admitted = self.gate.admit(|| {
            let seen = METRICS.inc_messages_ingested();
            let stamp = message.effective_stamp();
            let mut buffer = slot.lock_buffer();
            buffer.append(stamp, message.payload);
            slot.retention.enforce(&slot.name, &mut buffer, seen)
        });

        match admitted {
            Some(evicted) => IngestOutcome::Buffered { evicted },
            None => {
                METRICS.inc_messages_dropped();
                trace!(channel = %channel, "message dropped while dumping");
                IngestOutcome::GateClosed
            }
        }
    }

    /// Export the requested window of every active channel and clear them.
    ///
    /// Concurrent callers are serialized. The gate is reopened on every
    /// path. On error no buffer is cleared and no log is published.
    pub fn dump(&self, request: &DumpRequest) -> Result<DumpReport> {
        let window = request.window()?;
        let export_name = request.export_name(Local::now())?;

        let _serial = self
            .dump_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let dump_id = Uuid::new_v4();
        let _span = DumpSpan::enter(&dump_id.to_string());
        let _gate = self.gate.close()?;

        let started = Instant::now();
        obs::emit_dump_started(&export_name, window_secs(window));

        let result = self.export(dump_id, &export_name, window, request);
        match &result {
            Ok(report) => {
                METRICS.inc_dumps_completed();
                METRICS.add_messages_exported(report.total_exported);
                obs::emit_dump_finished(
                    &report.path.display().to_string(),
                    report.total_exported,
                    started.elapsed().as_millis() as u64,
                );
            }
            Err(err) => {
                METRICS.inc_dumps_failed();
                obs::emit_dump_failed(&export_name, err);
            }
        }
        METRICS.flush();
        result
    }

    fn export(
        &self,
        dump_id: Uuid,
        export_name: &str,
        window: ExportWindow,
        request: &DumpRequest,
    ) -> Result<DumpReport> {
        for name in request.channels.iter().flatten() {
            if self.channel(name).is_none() {
                warn!(channel = %name, "selected channel is not configured");
            }
        }
        let selected: Vec<&Channel> = self
            .channels
            .iter()
            .filter(|c| request.selects(&c.name))
            .collect();
        let exporting: Vec<&Channel> = selected.iter().copied().filter(|c| c.is_active()).collect();

        let path = export_path(&self.output_dir, export_name, self.sinks.extension());
        info!(path = %path.display(), "opening export log");
        let mut sink = self.sinks.open(&path)?;

        let mut exports = Vec::new();
        let mut total_exported = 0u64;
        for channel in &exporting {
            let buffer = channel.lock_buffer();
            let (offset, note) = match window {
                ExportWindow::All => (0, ExportNote::All),
                ExportWindow::Trailing(requested) => {
                    let r = resolve_offset(&buffer, requested);
                    let note = if r.partial {
                        ExportNote::Partial {
                            requested_secs: requested.as_secs_f64(),
                            available_secs: r.available.as_secs_f64(),
                        }
                    } else {
                        ExportNote::Complete {
                            requested_secs: requested.as_secs_f64(),
                        }
                    };
                    (r.offset, note)
                }
            };

            let mut exported = 0usize;
            for message in buffer.slice_from_offset(offset) {
                sink.write(&channel.name, message)?;
                exported += 1;
                if exported % EXPORT_PROGRESS_EVERY == 0 {
                    debug!(channel = %channel.name, exported, "export progress");
                }
            }
            obs::emit_channel_exported(&channel.name, exported as u64, offset);

            total_exported += exported as u64;
            exports.push(ChannelExport {
                channel: channel.name.clone(),
                exported: exported as u64,
                note,
            });
        }

        let receipt = sink.close()?;

        for channel in &exporting {
            channel.lock_buffer().clear();
        }

        Ok(DumpReport {
            dump_id,
            export_name: export_name.to_string(),
            path: receipt.path,
            digest: receipt.digest,
            channels: exports,
            pending_count: selected.len() - exporting.len(),
            total_exported,
        })
    }

    /// Snapshot of every channel without exporting anything.
    pub fn status(&self) -> RecorderStatus {
        let channels = self
            .channels
            .iter()
            .map(|c| {
                let buffer = c.lock_buffer();
                ChannelStatus {
                    channel: c.name.clone(),
                    status: c.status(),
                    message_type: c.message_type().map(str::to_string),
                    buffered: buffer.len(),
                    buffered_secs: buffer.duration().as_secs_f64(),
                    retention_secs: c.retention.as_secs_f64(),
                }
            })
            .collect();
        RecorderStatus {
            mode: self.gate.mode(),
            channels,
        }
    }
}

fn window_secs(window: ExportWindow) -> Option<f64> {
    match window {
        ExportWindow::All => None,
        ExportWindow::Trailing(d) => Some(d.as_secs_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemorySinkFactory;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(secs: i64) -> IncomingMessage {
        IncomingMessage {
            payload: Payload::new("test/Tick", secs.to_le_bytes().to_vec()),
            header_stamp: Some(at(secs)),
            received_at: at(0),
        }
    }

    fn recorder(sinks: Arc<MemorySinkFactory>) -> Recorder {
        Recorder::new(
            vec![
                ChannelConfig {
                    name: "/a".to_string(),
                    retention: RetentionWindow::new(Duration::from_secs(10)),
                },
                ChannelConfig {
                    name: "/b".to_string(),
                    retention: RetentionWindow::new(Duration::from_secs(5)),
                },
            ],
            "/tmp/flightrec-test",
            sinks,
        )
    }

    #[test]
    fn effective_stamp_prefers_header() {
        let mut m = msg(5);
        assert_eq!(m.effective_stamp(), at(5));
        m.header_stamp = None;
        assert_eq!(m.effective_stamp(), at(0));
    }

    #[test]
    fn ingest_requires_active_known_channel() {
        let rec = recorder(Arc::new(MemorySinkFactory::new()));
        assert_eq!(rec.ingest("/zzz", msg(1)), IngestOutcome::UnknownChannel);
        assert_eq!(rec.ingest("/a", msg(1)), IngestOutcome::Pending);

        assert!(rec.activate("/a", "test/Tick"));
        assert!(!rec.activate("/a", "other/Type"));
        assert_eq!(rec.channel("/a").unwrap().message_type(), Some("test/Tick"));
        assert_eq!(
            rec.ingest("/a", msg(1)),
            IngestOutcome::Buffered { evicted: 0 }
        );
        assert_eq!(rec.pending_channels(), vec!["/b"]);
    }

    #[test]
    fn ingest_trims_to_channel_retention() {
        let rec = recorder(Arc::new(MemorySinkFactory::new()));
        rec.activate("/b", "test/Tick");
        for s in 0..6 {
            rec.ingest("/b", msg(s));
        }
        assert_eq!(
            rec.ingest("/b", msg(6)),
            IngestOutcome::Buffered { evicted: 1 }
        );
        let status = rec.status();
        let b = status.channels.iter().find(|c| c.channel == "/b").unwrap();
        assert_eq!(b.buffered, 6);
        assert!((b.buffered_secs - 5.0).abs() < 1e-9);
    }

    #[test]
    fn dump_request_window_validation() {
        assert_eq!(DumpRequest::default().window().unwrap(), ExportWindow::All);
        assert_eq!(DumpRequest::new("x", 0.0).window().unwrap(), ExportWindow::All);
        assert_eq!(
            DumpRequest::new("x", 2.5).window().unwrap(),
            ExportWindow::Trailing(Duration::from_millis(2500))
        );
        assert!(matches!(
            DumpRequest::new("x", -1.0).window(),
            Err(RecorderError::InvalidDuration(_))
        ));
        assert!(DumpRequest::new("x", f64::INFINITY).window().is_err());
    }

    #[test]
    fn oversized_duration_is_rejected_not_panicking() {
        assert!(matches!(
            DumpRequest::new("big", 1e20).window(),
            Err(RecorderError::InvalidDuration(d)) if d == 1e20
        ));

        let sinks = Arc::new(MemorySinkFactory::new());
        let rec = recorder(sinks.clone());
        rec.activate("/a", "test/Tick");
        rec.ingest("/a", msg(1));
        assert!(matches!(
            rec.dump(&DumpRequest::new("big", 1e20)),
            Err(RecorderError::InvalidDuration(_))
        ));
        assert_eq!(rec.mode(), RecorderMode::Streaming);
        assert_eq!(rec.status().total_buffered(), 1);
        assert!(sinks.logs().is_empty());
    }

    #[test]
    fn export_name_generation_and_validation() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            DumpRequest::default().export_name(now).unwrap(),
            "2024-03-09-07:05:01"
        );
        assert_eq!(
            DumpRequest::new("  ", 0.0).export_name(now).unwrap(),
            "2024-03-09-07:05:01"
        );
        assert_eq!(DumpRequest::new("snap1", 0.0).export_name(now).unwrap(), "snap1");
        assert_eq!(DumpRequest::new("run..2", 0.0).export_name(now).unwrap(), "run..2");
        for bad in ["../etc", "a/../b", "/abs/snap", "a\\b", "a/..", "."] {
            assert!(
                matches!(
                    DumpRequest::new(bad, 0.0).export_name(now),
                    Err(RecorderError::InvalidExportName(_))
                ),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn export_name_keeps_relative_subdirectory() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            DumpRequest::new("runs/snap1", 0.0).export_name(now).unwrap(),
            "runs/snap1"
        );
        assert_eq!(
            DumpRequest::new("runs/day2/", 0.0).export_name(now).unwrap(),
            "runs/day2/2024-03-09-07:05:01"
        );
    }

    #[test]
    fn channel_selection_defaults_to_everything() {
        let all = DumpRequest::new("x", 0.0);
        assert!(all.selects("/a") && all.selects("/b"));

        let empty = DumpRequest::new("x", 0.0).with_channels(Vec::<String>::new());
        assert!(empty.selects("/a"));

        let only_b = DumpRequest::new("x", 0.0).with_channels(["/b"]);
        assert!(!only_b.selects("/a"));
        assert!(only_b.selects("/b"));
    }

    #[test]
    fn channels_field_is_optional_on_the_wire() {
        let req: DumpRequest = serde_json::from_str(r#"{"name":"n"}"#).unwrap();
        assert_eq!(req.channels, None);
        let req: DumpRequest =
            serde_json::from_str(r#"{"name":"n","channels":["/a","/b"]}"#).unwrap();
        assert_eq!(req.channels, Some(vec!["/a".to_string(), "/b".to_string()]));
    }

    #[test]
    fn invalid_request_leaves_gate_and_buffers_alone() {
        let sinks = Arc::new(MemorySinkFactory::new());
        let rec = recorder(sinks.clone());
        rec.activate("/a", "test/Tick");
        rec.ingest("/a", msg(1));

        assert!(rec.dump(&DumpRequest::new("../b", 0.0)).is_err());
        assert_eq!(rec.mode(), RecorderMode::Streaming);
        assert_eq!(rec.status().total_buffered(), 1);
        assert!(sinks.logs().is_empty());
    }

    #[test]
    fn status_text_lists_every_channel() {
        let rec = recorder(Arc::new(MemorySinkFactory::new()));
        rec.activate("/a", "test/Tick");
        let text = rec.status().status_text();
        assert!(text.contains("/a [active]"));
        assert!(text.contains("/b [pending]"));
    }

    #[test]
    fn export_note_wording() {
        assert_eq!(ExportNote::All.to_string(), "all messages exported");
        assert_eq!(
            ExportNote::Complete { requested_secs: 3.0 }.to_string(),
            "the requested 3 seconds were exported"
        );
        let partial = ExportNote::Partial {
            requested_secs: 60.0,
            available_secs: 9.0,
        }
        .to_string();
        assert!(partial.starts_with("only 9.000 of the requested 60 seconds"));
    }
}
