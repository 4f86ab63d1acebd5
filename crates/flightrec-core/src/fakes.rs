//! In-memory fakes for the recorder's collaborators (testing only)
//!
//! Provides `MemorySinkFactory`, `FailingSinkFactory` and `StaticDiscovery`
//! that satisfy the trait contracts without touching the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::buffer::BufferedMessage;
use crate::error::{SinkError, SinkResult};
use crate::sink::{ExportSink, SinkFactory, SinkReceipt};
use crate::subscription::ChannelDiscovery;

// ---------------------------------------------------------------------------
// MemorySinkFactory
// ---------------------------------------------------------------------------

/// One message written to a memory sink.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub channel: String,
    pub message: BufferedMessage,
}

/// A closed (published) memory log.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLog {
    pub path: PathBuf,
    pub records: Vec<MemoryRecord>,
}

impl MemoryLog {
    pub fn for_channel<'a>(&'a self, channel: &'a str) -> impl Iterator<Item = &'a BufferedMessage> {
        self.records
            .iter()
            .filter(move |r| r.channel == channel)
            .map(|r| &r.message)
    }
}

type OpenHook = Box<dyn Fn() + Send + Sync>;

/// Sink factory that keeps published logs in memory.
///
/// Logs only become visible through [`logs`](Self::logs) once closed, so an
/// aborted dump publishes nothing.
#[derive(Default)]
pub struct MemorySinkFactory {
    logs: Arc<Mutex<Vec<MemoryLog>>>,
    on_open: Mutex<Option<OpenHook>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` every time a sink is opened (i.e. while the gate is closed).
    pub fn set_open_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_open.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn logs(&self) -> Vec<MemoryLog> {
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_log(&self) -> Option<MemoryLog> {
        self.logs().pop()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn extension(&self) -> &str {
        "mem"
    }

    fn open(&self, path: &Path) -> SinkResult<Box<dyn ExportSink>> {
        if let Some(hook) = self
            .on_open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook();
        }
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            records: Vec::new(),
            logs: Arc::clone(&self.logs),
        }))
    }
}

struct MemorySink {
    path: PathBuf,
    records: Vec<MemoryRecord>,
    logs: Arc<Mutex<Vec<MemoryLog>>>,
}

impl ExportSink for MemorySink {
    fn write(&mut self, channel: &str, message: &BufferedMessage) -> SinkResult<()> {
        self.records.push(MemoryRecord {
            channel: channel.to_string(),
            message: message.clone(),
        });
        Ok(())
    }

    fn close(self: Box<Self>) -> SinkResult<SinkReceipt> {
        let receipt = SinkReceipt {
            path: self.path.clone(),
            records: self.records.len() as u64,
            digest: None,
        };
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MemoryLog {
                path: self.path,
                records: self.records,
            });
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// FailingSinkFactory
// ---------------------------------------------------------------------------

/// Where a [`FailingSinkFactory`] injects its I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Open,
    /// Fail on the write after `n` successful writes.
    WriteAfter(usize),
    Close,
}

/// Sink factory whose sinks fail at a chosen point.
#[derive(Debug, Clone, Copy)]
pub struct FailingSinkFactory {
    fail: FailPoint,
}

impl FailingSinkFactory {
    pub fn new(fail: FailPoint) -> Self {
        Self { fail }
    }
}

fn injected() -> std::io::Error {
    std::io::Error::other("injected sink failure")
}

impl SinkFactory for FailingSinkFactory {
    fn extension(&self) -> &str {
        "fail"
    }

    fn open(&self, path: &Path) -> SinkResult<Box<dyn ExportSink>> {
        if self.fail == FailPoint::Open {
            return Err(SinkError::Open {
                path: path.to_path_buf(),
                source: injected(),
            });
        }
        Ok(Box::new(FailingSink {
            fail: self.fail,
            path: path.to_path_buf(),
            written: 0,
        }))
    }
}

struct FailingSink {
    fail: FailPoint,
    path: PathBuf,
    written: usize,
}

impl ExportSink for FailingSink {
    fn write(&mut self, _channel: &str, _message: &BufferedMessage) -> SinkResult<()> {
        if self.fail == FailPoint::WriteAfter(self.written) {
            return Err(SinkError::Write(injected()));
        }
        self.written += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> SinkResult<SinkReceipt> {
        if self.fail == FailPoint::Close {
            return Err(SinkError::Persist {
                path: self.path,
                source: injected(),
            });
        }
        Ok(SinkReceipt {
            path: self.path,
            records: self.written as u64,
            digest: None,
        })
    }
}

// ---------------------------------------------------------------------------
// StaticDiscovery
// ---------------------------------------------------------------------------

/// Discovery backed by a map that tests fill in as channels "appear".
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    types: Mutex<HashMap<String, String>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `channel` discoverable with `message_type`.
    pub fn publish(&self, channel: &str, message_type: &str) {
        self.types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string(), message_type.to_string());
    }
}

impl ChannelDiscovery for StaticDiscovery {
    fn message_type(&self, channel: &str) -> Option<String> {
        self.types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }
}
