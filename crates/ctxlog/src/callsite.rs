//! Call-site resolution.
//!
//! A call site is the file that issued a log call, shown relative to the
//! current working directory. It is found by walking a list of
//! [`StackFrame`]s, innermost first, and picking the first frame that has a
//! file and belongs neither to the Rust runtime, a logging facade (`log`,
//! `tracing`) nor this crate.
//!
//! Frames come from one of two places:
//!
//! - the caller's [`Location`], threaded through `#[track_caller]` (or the
//!   file recorded by a `log`/`tracing` macro). This is a one-frame trace and
//!   works without debug info.
//! - a [`FrameSource`], by default [`BacktraceSource`], which captures and
//!   parses a full backtrace at log time.
//!
//! Resolution never fails loudly: a missing trace, a malformed frame, a
//! panic inside capture or a path that can't be converted all produce
//! [`CallSite::Unknown`].
//!
//! File identifiers may be plain paths or `file://` URLs; both are accepted.
//! Paths the compiler recorded relative to the workspace root are anchored
//! before being made relative to the working directory.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::fmt;
use std::panic::Location;
use std::path::{Component, Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use regex::Regex;
use url::Url;

use crate::unwind::catch_quietly;

/// Name of this crate as it appears in symbol paths.
const OWN_CRATE: &str = env!("CARGO_CRATE_NAME");

/// Source directory of this crate, used to recognise our own frames.
const OWN_SRC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src");

/// Symbol prefixes of the standard library and process startup code.
const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "__rust",
    "rust_begin_unwind",
    "__libc_start",
    "_start",
];

/// Symbol prefixes of the logging facades that forward into this crate.
const FACADE_PREFIXES: &[&str] = &[
    "log::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
];

/// One frame of a captured call stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Demangled symbol name, if known
    pub function: Option<String>,
    /// File path or `file://` URL, if known
    pub file: Option<String>,
}

impl StackFrame {
    /// A frame that only knows its file.
    #[must_use]
    pub fn from_file(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            ..Self::default()
        }
    }

    /// Attach a symbol name.
    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }
}

impl From<&Location<'_>> for StackFrame {
    fn from(location: &Location<'_>) -> Self {
        StackFrame::from_file(location.file())
    }
}

/// Something that can capture the current call stack.
pub trait FrameSource: Send + Sync {
    /// Capture the stack, innermost frame first.
    ///
    /// Returns `None` when no trace is available.
    fn capture(&self) -> Option<Vec<StackFrame>>;
}

/// Captures frames with [`std::backtrace::Backtrace`].
///
/// Needs debug info to see file names; without it every frame lacks a file
/// and resolution yields [`CallSite::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceSource;

impl FrameSource for BacktraceSource {
    fn capture(&self) -> Option<Vec<StackFrame>> {
        let trace = Backtrace::force_capture();
        if trace.status() != BacktraceStatus::Captured {
            return None;
        }
        Some(parse_backtrace(&trace.to_string()))
    }
}

static SYMBOL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+:\s+)?(\S.*?)\s*$").expect("symbol pattern is valid")
});

static AT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at\s+(.+?)(?::\d+){0,2}\s*$").expect("location pattern is valid")
});

/// Parse the rendered form of a [`Backtrace`] into frames.
///
/// Each symbol line (`  3: crate::func`, or an unnumbered inlined symbol)
/// starts a frame; the `at path:line:col` line below it fills in the file.
#[must_use]
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = AT_LINE.captures(line) {
            if let Some(frame) = frames.last_mut() {
                if frame.file.is_none() {
                    frame.file = Some(caps[1].to_string());
                }
            }
            continue;
        }
        if let Some(caps) = SYMBOL_LINE.captures(line) {
            frames.push(StackFrame::default().with_function(&caps[1]));
        }
    }

    frames
}

/// The resolved origin of a log call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSite {
    /// Path relative to the working directory
    Resolved(String),
    /// No frame could be resolved
    Unknown,
}

impl CallSite {
    /// Text form of [`CallSite::Unknown`].
    pub const UNKNOWN: &'static str = "unknown";

    /// The path, or `"unknown"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            CallSite::Resolved(path) => path,
            CallSite::Unknown => Self::UNKNOWN,
        }
    }

    /// The path, if one was resolved and it is not empty.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            CallSite::Resolved(path) if !path.is_empty() => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static CAPTURE_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

/// Scoped hold on stack capture.
///
/// Serializes captures across threads and marks the current thread as
/// capturing. The mark is restored on drop, including during unwinding.
struct CaptureGuard {
    previous: bool,
    _lock: MutexGuard<'static, ()>,
}

impl CaptureGuard {
    /// `None` when this thread is already capturing.
    fn acquire() -> Option<Self> {
        if CAPTURING.with(Cell::get) {
            return None;
        }
        let lock = CAPTURE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = CAPTURING.with(|flag| flag.replace(true));
        Some(Self {
            previous,
            _lock: lock,
        })
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.previous));
    }
}

/// Whether a stack capture is in progress on this thread.
#[must_use]
pub fn is_capturing() -> bool {
    CAPTURING.with(Cell::get)
}

/// Turns frames into a [`CallSite`].
pub struct CallSiteResolver {
    source: Box<dyn FrameSource>,
    base_dir: Option<PathBuf>,
}

impl fmt::Debug for CallSiteResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSiteResolver")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl Default for CallSiteResolver {
    fn default() -> Self {
        Self::new(BacktraceSource)
    }
}

impl CallSiteResolver {
    /// A resolver capturing frames from `source`.
    #[must_use]
    pub fn new(source: impl FrameSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            base_dir: None,
        }
    }

    /// Make paths relative to `dir` instead of the current working directory.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Capture the current stack and resolve it.
    pub fn resolve(&self) -> CallSite {
        let Some(_guard) = CaptureGuard::acquire() else {
            return CallSite::Unknown;
        };
        let frames = catch_quietly(|| self.source.capture()).flatten();
        match frames {
            Some(frames) => self.resolve_frames(&frames),
            None => CallSite::Unknown,
        }
    }

    /// Resolve the caller's [`Location`].
    pub fn resolve_location(&self, location: &Location<'_>) -> CallSite {
        self.resolve_frames(&[StackFrame::from(location)])
    }

    /// Resolve a file recorded by a logging macro.
    pub fn resolve_file(&self, file: Option<&str>) -> CallSite {
        match file {
            Some(file) => self.resolve_frames(&[StackFrame::from_file(file)]),
            None => CallSite::Unknown,
        }
    }

    /// Resolve already captured frames, innermost first.
    pub fn resolve_frames(&self, frames: &[StackFrame]) -> CallSite {
        catch_quietly(|| {
            frames
                .iter()
                .filter(|frame| !is_foreign_frame(frame))
                .find_map(|frame| self.external_path(frame))
        })
        .flatten()
        .map_or(CallSite::Unknown, CallSite::Resolved)
    }

    /// Relative path of `frame` when it is outside this crate.
    fn external_path(&self, frame: &StackFrame) -> Option<String> {
        if frame
            .function
            .as_deref()
            .is_some_and(|symbol| mentions_crate(symbol, OWN_CRATE))
        {
            return None;
        }
        let path = file_to_path(frame.file.as_deref()?)?;
        if path.starts_with(OWN_SRC_DIR) {
            return None;
        }
        self.relativize(&path)
    }

    /// Express `path` relative to the base directory.
    ///
    /// Relative paths are recorded against the directory the compiler ran
    /// in, usually the workspace root. They are anchored at the nearest
    /// ancestor of the base where they exist, and kept as written when none
    /// matches.
    fn relativize(&self, path: &Path) -> Option<String> {
        let base = match &self.base_dir {
            Some(dir) => Some(dir.clone()),
            None => std::env::current_dir().ok(),
        };

        let relative = match base {
            Some(base) if path.is_absolute() => relative_path(path, &base)?,
            None if path.is_absolute() => return None,
            Some(base) => anchor(path, &base)
                .and_then(|absolute| relative_path(&absolute, &base))
                .unwrap_or_else(|| normalize(path)),
            None => normalize(path),
        };
        Some(relative.to_string_lossy().into_owned())
    }
}

/// Frames from the runtime or from a logging facade.
fn is_foreign_frame(frame: &StackFrame) -> bool {
    let foreign_symbol = frame.function.as_deref().is_some_and(|symbol| {
        let symbol = symbol.trim_start_matches('<');
        RUNTIME_PREFIXES
            .iter()
            .chain(FACADE_PREFIXES)
            .any(|prefix| symbol.starts_with(prefix))
    });
    let runtime_file = frame
        .file
        .as_deref()
        .is_some_and(|file| file.starts_with("/rustc/"));
    foreign_symbol || runtime_file
}

/// `path` joined onto the first ancestor of `base` (itself included) under
/// which it exists.
fn anchor(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = normalize(path);
    base.ancestors()
        .map(|dir| dir.join(&path))
        .find(|candidate| candidate.exists())
}

/// Whether `symbol` contains a path rooted at `krate` (`krate::...`).
fn mentions_crate(symbol: &str, krate: &str) -> bool {
    let needle = format!("{krate}::");
    symbol.match_indices(&needle).any(|(at, _)| {
        symbol[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
    })
}

/// Convert a frame's file identifier into a path.
///
/// `file:` URLs go through [`Url::to_file_path`]; anything else is taken as a
/// path already.
fn file_to_path(file: &str) -> Option<PathBuf> {
    if file.is_empty() {
        return None;
    }
    if file.starts_with("file:") {
        return Url::parse(file).ok()?.to_file_path().ok();
    }
    Some(PathBuf::from(file))
}

/// Drop `.` components from a relative path.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// `path` expressed relative to `base`, with `..` segments when it lies
/// outside `base`. Both must be absolute.
fn relative_path(path: &Path, base: &Path) -> Option<PathBuf> {
    if !base.is_absolute() {
        return None;
    }
    let normalized = normalize(path);
    let path: Vec<Component<'_>> = normalized.components().collect();
    let base: Vec<Component<'_>> = base
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    // Different roots (e.g. drive letters) can't be related
    if path.first() != base.first() {
        return None;
    }

    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &path[common..] {
        relative.push(component.as_os_str());
    }
    Some(relative)
}
