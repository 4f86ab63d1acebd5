//! Line-oriented transports around the recorder.
//!
//! - Message bus: newline-delimited JSON [`Envelope`]s read from any async
//!   reader (the CLI uses stdin).
//! - Control: one JSON [`ControlRequest`] per line over TCP, answered with
//!   one JSON [`ControlResponse`] per line.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, instrument, warn};

use crate::buffer::{Payload, Timestamp};
use crate::recorder::{DumpRequest, IngestOutcome, IncomingMessage, Recorder};
use crate::subscription::ChannelDiscovery;

// ---------------------------------------------------------------------------
// Message bus
// ---------------------------------------------------------------------------

/// One message on the JSON-lines bus.
///
/// ```json
/// {"channel": "/odom", "type": "nav/Odometry", "stamp": "2024-03-09T07:05:01Z", "payload": {"x": 1.0}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(rename = "type")]
    pub message_type: String,
    /// Stamp embedded in the message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<Timestamp>,
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Split into the channel name and the message the recorder ingests.
    pub fn into_message(self, received_at: Timestamp) -> (String, IncomingMessage) {
        let message = IncomingMessage {
            payload: Payload::new(self.message_type, self.payload.to_string().into_bytes()),
            header_stamp: self.stamp,
            received_at,
        };
        (self.channel, message)
    }
}

/// Discovery fed by the bus: a channel is available once a message for it
/// has been seen.
#[derive(Debug, Default)]
pub struct ObservedChannels {
    types: Mutex<HashMap<String, String>>,
}

impl ObservedChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, channel: &str, message_type: &str) {
        let mut types = self.types.lock().unwrap_or_else(PoisonError::into_inner);
        if !types.contains_key(channel) {
            debug!(channel = %channel, message_type = %message_type, "channel observed");
            types.insert(channel.to_string(), message_type.to_string());
        }
    }
}

impl ChannelDiscovery for ObservedChannels {
    fn message_type(&self, channel: &str) -> Option<String> {
        self.types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }
}

/// Counters for one [`pump_envelopes`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub lines: u64,
    pub buffered: u64,
    pub dropped: u64,
    pub malformed: u64,
}

/// Feed every envelope from `reader` into `recorder` until EOF.
///
/// Malformed lines are logged and skipped.
pub async fn pump_envelopes<R>(
    reader: R,
    recorder: &Recorder,
    observed: &ObservedChannels,
) -> std::io::Result<PumpStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = PumpStats::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;

        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "malformed envelope skipped");
                stats.malformed += 1;
                continue;
            }
        };
        observed.observe(&envelope.channel, &envelope.message_type);

        let (channel, message) = envelope.into_message(Utc::now());
        match recorder.ingest(&channel, message) {
            IngestOutcome::Buffered { .. } => stats.buffered += 1,
            _ => stats.dropped += 1,
        }
    }
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    /// `{"op": "dump", "name": "snap1", "duration": 3}`
    Dump(DumpRequest),
    /// `{"op": "status"}`
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    pub status_text: String,
}

impl ControlResponse {
    fn ok(status_text: String) -> Self {
        Self {
            ok: true,
            status_text,
        }
    }

    fn error(status_text: String) -> Self {
        Self {
            ok: false,
            status_text,
        }
    }
}

/// Execute one control request. Dumps run on the blocking pool.
pub async fn handle_request(recorder: Arc<Recorder>, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Status => ControlResponse::ok(recorder.status().status_text()),
        ControlRequest::Dump(dump) => {
            match tokio::task::spawn_blocking(move || recorder.dump(&dump)).await {
                Ok(Ok(report)) => ControlResponse::ok(report.status_text()),
                Ok(Err(err)) => ControlResponse::error(format!("dump failed: {err}")),
                Err(err) => ControlResponse::error(format!("dump task failed: {err}")),
            }
        }
    }
}

/// Parse and execute one request line.
pub async fn handle_line(recorder: Arc<Recorder>, line: &str) -> ControlResponse {
    match serde_json::from_str::<ControlRequest>(line) {
        Ok(request) => handle_request(recorder, request).await,
        Err(err) => ControlResponse::error(format!("invalid request: {err}")),
    }
}

/// Answer requests on one connection until the peer hangs up.
pub async fn serve_connection<S>(stream: S, recorder: Arc<Recorder>) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(Arc::clone(&recorder), &line).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        write_half.write_all(&out).await?;
        write_half.flush().await?;
    }
    Ok(())
}

/// Accept control connections forever.
#[instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
pub async fn serve_control(listener: TcpListener, recorder: Arc<Recorder>) -> std::io::Result<()> {
    info!("control server listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(peer = %peer, "control connection accepted");
        let recorder = Arc::clone(&recorder);
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, recorder).await {
                warn!(peer = %peer, error = %err, "control connection failed");
            }
        });
    }
}

/// Send one request to a running recorder and wait for its response.
pub async fn send_request(
    addr: SocketAddr,
    request: &ControlRequest,
) -> std::io::Result<ControlResponse> {
    let stream = TcpStream::connect(addr).await?;
    let (read_half, mut write_half) = stream.into_split();

    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    write_half.write_all(&line).await?;
    write_half.flush().await?;

    let mut reader = BufReader::new(read_half);
    let mut response = String::new();
    if reader.read_line(&mut response).await? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "recorder closed the connection without answering",
        ));
    }
    Ok(serde_json::from_str(&response)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_request_wire_shape() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"op":"dump","name":"snap1","duration":3}"#).unwrap();
        assert_eq!(req, ControlRequest::Dump(DumpRequest::new("snap1", 3.0)));

        let req: ControlRequest = serde_json::from_str(r#"{"op":"dump"}"#).unwrap();
        assert_eq!(req, ControlRequest::Dump(DumpRequest::default()));

        let req: ControlRequest = serde_json::from_str(r#"{"op":"status"}"#).unwrap();
        assert_eq!(req, ControlRequest::Status);
    }

    #[test]
    fn envelope_prefers_embedded_stamp() {
        let env: Envelope = serde_json::from_str(
            r#"{"channel":"/odom","type":"nav/Odometry","stamp":"2024-03-09T07:05:01Z","payload":{"x":1}}"#,
        )
        .unwrap();
        let arrival = Utc::now();
        let (channel, msg) = env.into_message(arrival);
        assert_eq!(channel, "/odom");
        assert_eq!(msg.payload.type_tag, "nav/Odometry");
        assert_eq!(msg.payload.data, br#"{"x":1}"#.to_vec());
        assert_ne!(msg.effective_stamp(), arrival);
        assert_eq!(msg.received_at, arrival);
    }

    #[test]
    fn observed_channels_keep_first_type() {
        let observed = ObservedChannels::new();
        observed.observe("/a", "one");
        observed.observe("/a", "two");
        assert_eq!(observed.message_type("/a").as_deref(), Some("one"));
        assert_eq!(observed.message_type("/b"), None);
    }
}
