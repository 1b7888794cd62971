//! Append-only error log
//!
//! [`ErrorLog`] is a `MakeWriter` for tracing-subscriber: every warning or
//! error event becomes one timestamped line in the log file. Writers hold the
//! log's mutex for the whole event, so lines from concurrent fetch tasks never
//! interleave. The file is opened lazily; a run without failures leaves no
//! log behind.

use parking_lot::{Mutex, MutexGuard};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{filter::LevelFilter, Layer};

/// Timestamp format for log lines
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared handle to the error log file
#[derive(Clone, Debug)]
pub struct ErrorLog {
    inner: Arc<Mutex<LogFile>>,
}

#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    file: Option<File>,
}

impl LogFile {
    fn open(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?
            }
        };
        Ok(self.file.insert(file))
    }
}

impl ErrorLog {
    /// Create a log that appends to `path` on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogFile {
                path: path.into(),
                file: None,
            })),
        }
    }

    /// Path of the log file
    pub fn path(&self) -> PathBuf {
        self.inner.lock().path.clone()
    }

    /// Build a formatting layer that sends `WARN` and above to this log
    pub fn layer<S>(&self) -> impl Layer<S> + Send + Sync + 'static
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        tracing_subscriber::fmt::layer()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_target(false)
            .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
            .with_filter(LevelFilter::WARN)
    }
}

/// Writer holding the log lock for the duration of one event
pub struct ErrorLogWriter<'a> {
    guard: MutexGuard<'a, LogFile>,
}

impl Write for ErrorLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A broken log must never take the caller down with it
        if let Ok(file) = self.guard.open() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.guard.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for ErrorLog {
    type Writer = ErrorLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        ErrorLogWriter {
            guard: self.inner.lock(),
        }
    }
}

/// Check whether a log exists and has content
pub fn has_entries(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
