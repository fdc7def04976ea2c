//! In-memory sinks for capturing logger output.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use strip_ansi_escapes::strip;

/// A pair of in-memory sinks standing in for stdout and stderr.
///
/// Hand the writers to a logger with
/// [`ContextLoggerBuilder::capture`](crate::ContextLoggerBuilder::capture),
/// then read back what was written. Line accessors strip ANSI codes; the
/// `raw_*` accessors keep them.
#[derive(Debug, Clone, Default)]
pub struct CaptureSinks {
    stdout: Arc<Mutex<CaptureBuffer>>,
    stderr: Arc<Mutex<CaptureBuffer>>,
}

#[derive(Debug, Default)]
struct CaptureBuffer {
    /// Bytes as written, ANSI codes included
    raw: Vec<u8>,
    /// Number of `write` calls received
    writes: usize,
}

impl CaptureBuffer {
    fn raw_string(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }

    fn stripped_string(&self) -> String {
        String::from_utf8_lossy(&strip(&self.raw)).into_owned()
    }
}

fn read<T>(buffer: &Mutex<CaptureBuffer>, f: impl FnOnce(&CaptureBuffer) -> T) -> T {
    let guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
}

impl CaptureSinks {
    /// Create empty sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer feeding the stdout buffer.
    #[must_use]
    pub fn stdout_writer(&self) -> CaptureWriter {
        CaptureWriter(self.stdout.clone())
    }

    /// Writer feeding the stderr buffer.
    #[must_use]
    pub fn stderr_writer(&self) -> CaptureWriter {
        CaptureWriter(self.stderr.clone())
    }

    /// Lines written to stdout, ANSI codes stripped.
    #[must_use]
    pub fn stdout(&self) -> Vec<String> {
        self.stdout_string().lines().map(String::from).collect()
    }

    /// Lines written to stderr, ANSI codes stripped.
    #[must_use]
    pub fn stderr(&self) -> Vec<String> {
        self.stderr_string().lines().map(String::from).collect()
    }

    /// Everything written to stdout, ANSI codes stripped, without the final
    /// newline.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        let text = read(&self.stdout, CaptureBuffer::stripped_string);
        text.trim_end_matches('\n').to_string()
    }

    /// Everything written to stderr, ANSI codes stripped, without the final
    /// newline.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        let text = read(&self.stderr, CaptureBuffer::stripped_string);
        text.trim_end_matches('\n').to_string()
    }

    /// Exact bytes written to stdout.
    #[must_use]
    pub fn raw_stdout(&self) -> String {
        read(&self.stdout, CaptureBuffer::raw_string)
    }

    /// Exact bytes written to stderr.
    #[must_use]
    pub fn raw_stderr(&self) -> String {
        read(&self.stderr, CaptureBuffer::raw_string)
    }

    /// Number of writes stdout received.
    #[must_use]
    pub fn stdout_writes(&self) -> usize {
        read(&self.stdout, |b| b.writes)
    }

    /// Number of writes stderr received.
    #[must_use]
    pub fn stderr_writes(&self) -> usize {
        read(&self.stderr, |b| b.writes)
    }

    /// Whether either stream contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.stdout_string().contains(needle) || self.stderr_string().contains(needle)
    }

    /// Whether either stream matches the regex `pattern`.
    ///
    /// An invalid pattern matches nothing.
    #[must_use]
    pub fn matches(&self, pattern: &str) -> bool {
        match regex::Regex::new(pattern) {
            Ok(re) => re.is_match(&self.stdout_string()) || re.is_match(&self.stderr_string()),
            Err(_) => false,
        }
    }

    /// Assert that either stream contains `needle`.
    ///
    /// # Panics
    ///
    /// Panics if neither stream contains the needle.
    pub fn assert_contains(&self, needle: &str) {
        assert!(
            self.contains(needle),
            "Output did not contain '{}'.\nstdout:\n{}\nstderr:\n{}",
            needle,
            self.stdout_string(),
            self.stderr_string()
        );
    }

    /// Assert that neither stream contains `needle`.
    ///
    /// # Panics
    ///
    /// Panics if either stream contains the needle.
    pub fn assert_not_contains(&self, needle: &str) {
        assert!(
            !self.contains(needle),
            "Output unexpectedly contained '{}'.\nstdout:\n{}\nstderr:\n{}",
            needle,
            self.stdout_string(),
            self.stderr_string()
        );
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        for buffer in [&self.stdout, &self.stderr] {
            let mut guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
            guard.raw.clear();
            guard.writes = 0;
        }
    }
}

/// Writer that appends to one of the [`CaptureSinks`] buffers.
#[derive(Debug, Clone)]
pub struct CaptureWriter(Arc<Mutex<CaptureBuffer>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.raw.extend_from_slice(buf);
        buffer.writes += 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
