//! Error taxonomy for the recorder.
//!
//! Expected conditions (pending subscriptions, short history) never show up
//! here; they are absorbed by the recorder and described in the dump report.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("channel name must not be empty (entry {index})")]
    EmptyChannelName { index: usize },

    #[error("channel configured twice: {0}")]
    DuplicateChannel(String),

    #[error("invalid retention for channel {channel}: {value}")]
    InvalidRetention { channel: String, value: f64 },

    #[error("default retention must be positive, got {0}")]
    InvalidDefaultRetention(f64),

    #[error("output directory {path} is not writable: {source}")]
    OutputDirUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid control address {addr}: {reason}")]
    InvalidControlAddr { addr: String, reason: String },
}

/// Errors from the export sink. Any of these aborts the running dump.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open export log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write export log: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to persist export log {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode export record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Recorder errors surfaced to callers of `dump` and friends.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("export sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid export name: {0:?}")]
    InvalidExportName(String),

    #[error("invalid dump duration: {0}")]
    InvalidDuration(f64),

    #[error("a dump is already in progress")]
    DumpInProgress,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for recorder operations.
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Result type for sink operations.
pub type SinkResult<T> = std::result::Result<T, SinkError>;
