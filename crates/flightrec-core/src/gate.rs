//! Ingestion gate: suspends buffering while a dump is running.
//!
//! Ingest paths run under a read guard and only while the mode is
//! [`RecorderMode::Streaming`]. Closing the gate takes the write guard, so
//! every in-flight ingest finishes before the mode flips. The returned
//! [`GateGuard`] reopens the gate when dropped.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecorderError, Result};

/// Recorder state as seen by the ingestion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderMode {
    Streaming,
    Dumping,
}

#[derive(Debug)]
pub struct IngestionGate {
    mode: RwLock<RecorderMode>,
}

impl Default for IngestionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionGate {
    pub fn new() -> Self {
        Self {
            mode: RwLock::new(RecorderMode::Streaming),
        }
    }

    pub fn mode(&self) -> RecorderMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.mode() == RecorderMode::Streaming
    }

    /// Run `f` if the gate is open, holding the read guard for its duration.
    ///
    /// Returns `None` without calling `f` while a dump is in progress.
    pub fn admit<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let mode = self.mode.read().unwrap_or_else(PoisonError::into_inner);
        match *mode {
            RecorderMode::Streaming => Some(f()),
            RecorderMode::Dumping => None,
        }
    }

    /// Flip Streaming -> Dumping.
    ///
    /// Fails with [`RecorderError::DumpInProgress`] if the gate is already closed.
    pub fn close(&self) -> Result<GateGuard<'_>> {
        let mut mode = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        if *mode == RecorderMode::Dumping {
            return Err(RecorderError::DumpInProgress);
        }
        *mode = RecorderMode::Dumping;
        debug!("ingestion gate closed");
        Ok(GateGuard { gate: self })
    }

    fn reopen(&self) {
        let mut mode = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        *mode = RecorderMode::Streaming;
        debug!("ingestion gate reopened");
    }
}

/// Keeps the gate closed until dropped.
#[must_use = "dropping the guard immediately reopens the gate"]
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a IngestionGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.reopen();
    }
}
