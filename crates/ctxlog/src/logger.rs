//! The logger facade.
//!
//! [`ContextLogger`] has one method per [`Level`]. Each call resolves the
//! call site, composes one line and writes it, newline included, to stdout
//! (or stderr for [`Level::Error`]) in a single write.
//!
//! # Usage
//!
//! ```ignore
//! use ctxlog::{Arg, ContextLogger, IntoArg, PartialLoggerOptions};
//!
//! let logger = ContextLogger::builder().build();
//! logger
//!     .set_options(&PartialLoggerOptions::new().show_timestamp(true))
//!     .info(&["User:".to_arg(), user.to_arg()]);
//! ```
//!
//! To route the `log` crate's macros through the same pipeline, install a
//! `'static` logger with [`ContextLogger::override_global`].

use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use log::{LevelFilter, Log, Metadata, Record};

use crate::callsite::{CallSite, CallSiteResolver, FrameSource};
use crate::color::ColorMode;
use crate::compose::LineComposer;
use crate::format::Arg;
use crate::level::Level;
use crate::options::{LoggerOptions, OptionsStore, PartialLoggerOptions};
use crate::testing::CaptureSinks;

/// Where call sites come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallSiteMode {
    /// The caller's `#[track_caller]` location, or the file recorded by a
    /// `log`/`tracing` macro
    #[default]
    Caller,
    /// A stack captured at log time by the resolver's frame source
    Captured,
}

impl CallSiteMode {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "caller" | "location" => Some(CallSiteMode::Caller),
            "captured" | "backtrace" | "stack" => Some(CallSiteMode::Captured),
            _ => None,
        }
    }
}

type Sink = Mutex<Box<dyn Write + Send>>;

/// Console logger that tags lines with level, call site and timestamp.
pub struct ContextLogger {
    options: OptionsStore,
    resolver: CallSiteResolver,
    call_site_mode: CallSiteMode,
    color_mode: ColorMode,
    stdout: Sink,
    stderr: Sink,
}

impl fmt::Debug for ContextLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLogger")
            .field("options", &self.options.current())
            .field("call_site_mode", &self.call_site_mode)
            .field("color_mode", &self.color_mode)
            .finish_non_exhaustive()
    }
}

impl Default for ContextLogger {
    fn default() -> Self {
        ContextLoggerBuilder::new().build()
    }
}

impl ContextLogger {
    /// Start configuring a logger.
    #[must_use]
    pub fn builder() -> ContextLoggerBuilder {
        ContextLoggerBuilder::new()
    }

    /// A logger configured from the environment.
    ///
    /// See [`ContextLoggerBuilder::from_env`].
    #[must_use]
    pub fn from_env() -> Self {
        ContextLoggerBuilder::from_env().build()
    }

    /// Write a [`Level::Log`] line.
    #[track_caller]
    pub fn log(&self, args: &[Arg<'_>]) {
        self.emit_at(Level::Log, args, Location::caller());
    }

    /// Write a [`Level::Info`] line.
    #[track_caller]
    pub fn info(&self, args: &[Arg<'_>]) {
        self.emit_at(Level::Info, args, Location::caller());
    }

    /// Write a [`Level::Warn`] line.
    #[track_caller]
    pub fn warn(&self, args: &[Arg<'_>]) {
        self.emit_at(Level::Warn, args, Location::caller());
    }

    /// Write a [`Level::Error`] line to the error sink.
    #[track_caller]
    pub fn error(&self, args: &[Arg<'_>]) {
        self.emit_at(Level::Error, args, Location::caller());
    }

    /// Write a [`Level::Debug`] line.
    #[track_caller]
    pub fn debug(&self, args: &[Arg<'_>]) {
        self.emit_at(Level::Debug, args, Location::caller());
    }

    /// Write a line at `level`.
    #[track_caller]
    pub fn emit(&self, level: Level, args: &[Arg<'_>]) {
        self.emit_at(level, args, Location::caller());
    }

    /// Write a line at `level`, attributed to `location`.
    pub fn emit_at(&self, level: Level, args: &[Arg<'_>], location: &Location<'_>) {
        let call_site = match self.call_site_mode {
            CallSiteMode::Caller => self.resolver.resolve_location(location),
            CallSiteMode::Captured => self.resolver.resolve(),
        };
        self.write_line(level, args, &call_site);
    }

    /// Write a line whose call site is a file recorded by a logging macro.
    ///
    /// The recorded file wins in both modes. A stack captured here would
    /// start inside the facade's dispatch code.
    pub(crate) fn emit_from_file(&self, level: Level, args: &[Arg<'_>], file: Option<&str>) {
        let call_site = match (self.call_site_mode, file) {
            (_, Some(file)) => self.resolver.resolve_file(Some(file)),
            (CallSiteMode::Caller, None) => CallSite::Unknown,
            (CallSiteMode::Captured, None) => self.resolver.resolve(),
        };
        self.write_line(level, args, &call_site);
    }

    /// Compose the line for `level` without writing it.
    #[must_use]
    pub fn compose(&self, level: Level, args: &[Arg<'_>], call_site: &CallSite) -> String {
        let options = self.options.current();
        LineComposer::new(&options)
            .styled(self.color_mode.should_style(level.is_error()))
            .compose(level, args, call_site)
    }

    fn write_line(&self, level: Level, args: &[Arg<'_>], call_site: &CallSite) {
        let mut line = self.compose(level, args, call_site);
        line.push('\n');

        let sink = if level.is_error() {
            &self.stderr
        } else {
            &self.stdout
        };
        let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
        // A failed write has nowhere to be reported
        let _ = sink.write_all(line.as_bytes());
    }

    /// Deep-merge `partial` into the options. Returns `self` for chaining.
    pub fn set_options(&self, partial: &PartialLoggerOptions) -> &Self {
        self.options.merge(partial);
        self
    }

    /// Snapshot of the current options.
    #[must_use]
    pub fn options(&self) -> LoggerOptions {
        self.options.current()
    }

    /// The store backing [`set_options`](Self::set_options).
    #[must_use]
    pub fn options_store(&self) -> &OptionsStore {
        &self.options
    }

    /// How call sites are resolved.
    #[must_use]
    pub fn call_site_mode(&self) -> CallSiteMode {
        self.call_site_mode
    }

    /// Install this logger behind the `log` crate's macros.
    ///
    /// After this, `log::info!` and friends anywhere in the process write
    /// through this logger, with the max level opened to `Trace`. This is
    /// process-wide and cannot be undone.
    ///
    /// Calling it again with the same logger is a no-op. It fails if another
    /// logger already owns the `log` facade.
    pub fn override_global(&'static self) -> Result<(), OverrideError> {
        static INSTALLED: Mutex<Option<&'static ContextLogger>> = Mutex::new(None);

        let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
        match *installed {
            Some(current) if std::ptr::eq(current, self) => return Ok(()),
            Some(_) => return Err(OverrideError::AlreadyInstalled),
            None => {}
        }

        log::set_logger(self).map_err(|_| OverrideError::ForeignLogger)?;
        log::set_max_level(LevelFilter::Trace);
        *installed = Some(self);
        Ok(())
    }
}

impl Log for ContextLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let message = record.args();
        self.emit_from_file(
            Level::from(record.level()),
            &[Arg::display(message)],
            record.file(),
        );
    }

    fn flush(&self) {
        for sink in [&self.stdout, &self.stderr] {
            let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = sink.flush();
        }
    }
}

/// Errors from [`ContextLogger::override_global`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideError {
    /// A different `ContextLogger` was already installed
    AlreadyInstalled,
    /// Some other `log` implementation owns the facade
    ForeignLogger,
}

impl fmt::Display for OverrideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideError::AlreadyInstalled => {
                f.write_str("a different context logger is already installed")
            }
            OverrideError::ForeignLogger => {
                f.write_str("another logger is already installed for the log facade")
            }
        }
    }
}

impl std::error::Error for OverrideError {}

/// Builder for [`ContextLogger`].
///
/// # Example
///
/// ```ignore
/// use ctxlog::{ColorMode, ContextLogger, PartialLoggerOptions};
///
/// let logger = ContextLogger::builder()
///     .with_options(&PartialLoggerOptions::new().show_timestamp(true))
///     .color_mode(ColorMode::Never)
///     .build();
/// ```
pub struct ContextLoggerBuilder {
    options: LoggerOptions,
    color_mode: ColorMode,
    call_site_mode: CallSiteMode,
    resolver: CallSiteResolver,
    base_dir: Option<PathBuf>,
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

impl fmt::Debug for ContextLoggerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLoggerBuilder")
            .field("options", &self.options)
            .field("color_mode", &self.color_mode)
            .field("call_site_mode", &self.call_site_mode)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl Default for ContextLoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextLoggerBuilder {
    /// Default options, automatic colors, caller locations, real stdio.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: LoggerOptions::default(),
            color_mode: ColorMode::Auto,
            call_site_mode: CallSiteMode::Caller,
            resolver: CallSiteResolver::default(),
            base_dir: None,
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }

    /// A builder seeded from environment variables.
    ///
    /// Reads the option variables documented on
    /// [`PartialLoggerOptions::from_env`], the color variables documented on
    /// [`ColorMode::detect_with`], and `CTXLOG_CALL_SITE`
    /// (`caller` or `backtrace`).
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new()
            .with_options(&PartialLoggerOptions::from_env_with(&lookup))
            .color_mode(ColorMode::detect_with(&lookup));

        if let Some(mode) = lookup("CTXLOG_CALL_SITE").and_then(|v| CallSiteMode::from_name(&v)) {
            builder.call_site_mode = mode;
        }
        builder
    }

    /// Replace the starting options.
    #[must_use]
    pub fn options(mut self, options: LoggerOptions) -> Self {
        self.options = options;
        self
    }

    /// Deep-merge `partial` into the starting options.
    #[must_use]
    pub fn with_options(mut self, partial: &PartialLoggerOptions) -> Self {
        let store = OptionsStore::new(self.options);
        self.options = store.merge(partial);
        self
    }

    /// Set when colors are emitted.
    #[must_use]
    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    /// Set how call sites are resolved.
    #[must_use]
    pub fn call_site_mode(mut self, mode: CallSiteMode) -> Self {
        self.call_site_mode = mode;
        self
    }

    /// Capture stacks with `source`. Implies [`CallSiteMode::Captured`].
    #[must_use]
    pub fn frame_source(mut self, source: impl FrameSource + 'static) -> Self {
        self.resolver = CallSiteResolver::new(source);
        self.call_site_mode = CallSiteMode::Captured;
        self
    }

    /// Make call sites relative to `dir` instead of the working directory.
    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Send standard lines to `writer`.
    #[must_use]
    pub fn stdout(mut self, writer: impl Write + Send + 'static) -> Self {
        self.stdout = Box::new(writer);
        self
    }

    /// Send error lines to `writer`.
    #[must_use]
    pub fn stderr(mut self, writer: impl Write + Send + 'static) -> Self {
        self.stderr = Box::new(writer);
        self
    }

    /// Send both streams into `sinks`.
    #[must_use]
    pub fn capture(self, sinks: &CaptureSinks) -> Self {
        self.stdout(sinks.stdout_writer())
            .stderr(sinks.stderr_writer())
    }

    /// Build the logger.
    #[must_use]
    pub fn build(self) -> ContextLogger {
        let resolver = match self.base_dir {
            Some(dir) => self.resolver.with_base_dir(dir),
            None => self.resolver,
        };

        ContextLogger {
            options: OptionsStore::new(self.options),
            resolver,
            call_site_mode: self.call_site_mode,
            color_mode: self.color_mode,
            stdout: Mutex::new(self.stdout),
            stderr: Mutex::new(self.stderr),
        }
    }
}
