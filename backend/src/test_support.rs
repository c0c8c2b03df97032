//! Test utilities for the backend crate.
//!
//! This module provides shared helpers for both unit tests (in `src/`) and
//! integration tests (in `tests/`). It is only compiled when running tests or
//! with the `test-support` feature.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory sink collecting JSON log lines.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Every record written so far, parsed as JSON.
    ///
    /// Lines that are not valid JSON are skipped.
    #[must_use]
    pub fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Records emitted on `target`.
    #[must_use]
    pub fn records_for(&self, target: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|record| record.get("target").and_then(Value::as_str) == Some(target))
            .collect()
    }
}

/// Writer handed out by [`LogBuffer`].
#[derive(Debug)]
pub struct LogBufferWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogBufferWriter(Arc::clone(&self.0))
    }
}

/// Route this thread's events into a fresh buffer until the guard drops.
///
/// Suits `#[actix_web::test]`, whose runtime stays on the calling thread.
#[must_use]
pub fn install_log_capture() -> (DefaultGuard, LogBuffer) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(buffer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}

/// Run `f` with a capturing subscriber and return its logs.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<Value>) {
    let (guard, buffer) = install_log_capture();
    let result = f();
    drop(guard);
    (result, buffer.records())
}
