//! Export sinks: where a dump writes its messages.
//!
//! The recorder talks to sinks through [`SinkFactory`] and [`ExportSink`].
//! [`JsonlSinkFactory`] is the on-disk implementation: a JSON-lines log
//! written to a temp file in the target directory and renamed into place on
//! close, so an aborted dump never leaves a partial log behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::buffer::{BufferedMessage, Timestamp};
use crate::error::{SinkError, SinkResult};

/// Version written into every log header.
pub const LOG_FORMAT_VERSION: u32 = 1;

/// What a sink reports once it has been closed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReceipt {
    pub path: PathBuf,
    pub records: u64,
    /// SHA-256 (hex) of the bytes written, when the sink computes one.
    pub digest: Option<String>,
}

/// An open export log.
pub trait ExportSink: Send {
    /// Write one message for `channel`, preserving its original stamp.
    fn write(&mut self, channel: &str, message: &BufferedMessage) -> SinkResult<()>;

    /// Flush and publish the log.
    fn close(self: Box<Self>) -> SinkResult<SinkReceipt>;
}

/// Opens export logs.
pub trait SinkFactory: Send + Sync {
    /// File extension (without the dot) used for export paths.
    fn extension(&self) -> &str;

    fn open(&self, path: &Path) -> SinkResult<Box<dyn ExportSink>>;
}

/// Build `{dir}/{name}.{ext}`; a name that already ends in `.{ext}` is kept as is.
pub fn export_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    let suffix = format!(".{extension}");
    if name.ends_with(&suffix) {
        dir.join(name)
    } else {
        dir.join(format!("{name}{suffix}"))
    }
}

/// First line of every JSON-lines export log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    pub format_version: u32,
    pub export_name: String,
    pub created_at: Timestamp,
}

/// One exported message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub channel: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub stamp: Timestamp,
    pub payload_hex: String,
}

impl LogRecord {
    pub fn from_message(channel: &str, message: &BufferedMessage) -> Self {
        Self {
            channel: channel.to_string(),
            type_tag: message.payload.type_tag.clone(),
            stamp: message.stamp,
            payload_hex: hex::encode(&message.payload.data),
        }
    }

    /// Decode the payload bytes back out of the record.
    pub fn payload_bytes(&self) -> std::result::Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.payload_hex)
    }
}

/// Writes JSON-lines export logs to the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonlSinkFactory;

impl JsonlSinkFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SinkFactory for JsonlSinkFactory {
    fn extension(&self) -> &str {
        "jsonl"
    }

    fn open(&self, path: &Path) -> SinkResult<Box<dyn ExportSink>> {
        let sink = JsonlSink::create(path)?;
        Ok(Box::new(sink))
    }
}

struct JsonlSink {
    path: PathBuf,
    out: BufWriter<NamedTempFile>,
    hasher: Sha256,
    records: u64,
}

impl JsonlSink {
    fn create(path: &Path) -> SinkResult<Self> {
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(open_err)?;
        let tmp = NamedTempFile::new_in(dir).map_err(open_err)?;

        let export_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut sink = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(tmp),
            hasher: Sha256::new(),
            records: 0,
        };
        sink.write_line(&LogHeader {
            format_version: LOG_FORMAT_VERSION,
            export_name,
            created_at: Utc::now(),
        })?;
        Ok(sink)
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> SinkResult<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        self.out.write_all(&line).map_err(SinkError::Write)?;
        self.hasher.update(&line);
        Ok(())
    }
}

impl ExportSink for JsonlSink {
    fn write(&mut self, channel: &str, message: &BufferedMessage) -> SinkResult<()> {
        self.write_line(&LogRecord::from_message(channel, message))?;
        self.records += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> SinkResult<SinkReceipt> {
        let JsonlSink {
            path,
            out,
            hasher,
            records,
        } = *self;

        let tmp = out.into_inner().map_err(|e| SinkError::Write(e.into_error()))?;
        tmp.as_file().sync_all().map_err(SinkError::Write)?;
        tmp.persist(&path).map_err(|e| SinkError::Persist {
            path: path.clone(),
            source: e.error,
        })?;

        Ok(SinkReceipt {
            path,
            records,
            digest: Some(hex::encode(hasher.finalize())),
        })
    }
}

/// Read a JSON-lines export log back into its header and records.
pub fn read_log(path: &Path) -> std::io::Result<(LogHeader, Vec<LogRecord>)> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();
    let header_line = lines.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "export log is empty")
    })?;
    let header: LogHeader = serde_json::from_str(header_line)?;
    let records = lines
        .filter(|l| !l.trim().is_empty())
        .map(serde_json::from_str)
        .collect::<Result<Vec<LogRecord>, _>>()?;
    Ok((header, records))
}
