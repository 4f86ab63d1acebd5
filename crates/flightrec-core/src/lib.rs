//! flightrec core library
//!
//! Keeps the most recent time window of every configured channel in memory
//! and, on request, exports a trailing duration (or everything retained) of
//! every active channel to a log, then resumes recording.
//!
//! ## Components
//!
//! - `buffer`: per-channel oldest-first message buffer
//! - `retention`: retention windows and post-ingest trimming
//! - `offset`: requested duration -> buffer offset
//! - `gate`: ingestion gate (Streaming / Dumping)
//! - `recorder`: channel registry, ingest path and the dump coordinator
//! - `sink`: export sink traits and the JSON-lines log writer
//! - `subscription`: backoff retry that activates channels as they appear
//! - `transport`: JSON-lines message bus and TCP control protocol

pub mod buffer;
pub mod config;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod metrics;
pub mod obs;
pub mod offset;
pub mod recorder;
pub mod retention;
pub mod sink;
pub mod subscription;
pub mod telemetry;
pub mod transport;

pub use buffer::{BufferedMessage, ChannelBuffer, Payload, Timestamp};
pub use config::{ChannelConfig, ChannelSpec, RecorderConfig, SubscriptionConfig};
pub use error::{ConfigError, RecorderError, Result, SinkError, SinkResult};
pub use gate::{GateGuard, IngestionGate, RecorderMode};
pub use metrics::METRICS;
pub use obs::DumpSpan;
pub use offset::{resolve_offset, OffsetResolution};
pub use recorder::{
    Channel, ChannelExport, ChannelStatus, DumpReport, DumpRequest, ExportNote, ExportWindow,
    IncomingMessage, IngestOutcome, Recorder, RecorderStatus, SubscriptionStatus,
};
pub use retention::RetentionWindow;
pub use sink::{export_path, read_log, ExportSink, JsonlSinkFactory, SinkFactory, SinkReceipt};
pub use subscription::{spawn_subscriber, subscribe_pending, Backoff, ChannelDiscovery, Readiness};
pub use telemetry::init_tracing;
pub use transport::{
    pump_envelopes, send_request, serve_control, ControlRequest, ControlResponse, Envelope,
    ObservedChannels, PumpStats,
};

/// flightrec version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
