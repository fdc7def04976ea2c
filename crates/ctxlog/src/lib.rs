#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod callsite;
pub mod color;
pub mod compose;
pub mod format;
pub mod level;
pub mod logger;
pub mod merge;
pub mod options;
pub mod subscriber;
pub mod testing;
mod unwind;

use std::sync::OnceLock;

pub use callsite::{BacktraceSource, CallSite, CallSiteResolver, FrameSource, StackFrame};
pub use color::{ColorMode, ColorName};
pub use compose::LineComposer;
pub use format::{Arg, IntoArg, Structured};
pub use level::Level;
pub use logger::{CallSiteMode, ContextLogger, ContextLoggerBuilder, OverrideError};
pub use merge::deep_merge;
pub use options::{LoggerOptions, OptionsError, OptionsStore, PartialLoggerOptions};
pub use subscriber::ContextLayer;

static LOGGER: OnceLock<ContextLogger> = OnceLock::new();

/// The process-wide logger, configured from the environment on first use.
///
/// This is the logger behind [`log!`], [`info!`], [`warn!`], [`error!`] and
/// [`debug!`].
pub fn logger() -> &'static ContextLogger {
    LOGGER.get_or_init(ContextLogger::from_env)
}

/// Deep-merge `partial` into the process-wide logger's options.
pub fn set_options(partial: &PartialLoggerOptions) -> &'static ContextLogger {
    logger().set_options(partial)
}

/// Route the `log` crate's macros through the process-wide logger.
///
/// Repeated calls are no-ops.
pub fn init() -> Result<(), OverrideError> {
    logger().override_global()
}

/// Log through the process-wide logger at [`Level::Log`].
///
/// Each argument is anything [`IntoArg`] accepts: strings, serializable
/// values, or an [`Arg`] built explicitly.
///
/// ```ignore
/// ctxlog::log!("User:", user);
/// ```
#[macro_export]
macro_rules! log {
    ($($arg:expr),* $(,)?) => {
        $crate::logger().log(&[$($crate::IntoArg::to_arg(&$arg)),*])
    };
}

/// Log through the process-wide logger at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:expr),* $(,)?) => {
        $crate::logger().info(&[$($crate::IntoArg::to_arg(&$arg)),*])
    };
}

/// Log through the process-wide logger at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:expr),* $(,)?) => {
        $crate::logger().warn(&[$($crate::IntoArg::to_arg(&$arg)),*])
    };
}

/// Log through the process-wide logger at [`Level::Error`].
///
/// Pass errors as `Arg::error(&err)` to get the message and the cause chain.
#[macro_export]
macro_rules! error {
    ($($arg:expr),* $(,)?) => {
        $crate::logger().error(&[$($crate::IntoArg::to_arg(&$arg)),*])
    };
}

/// Log through the process-wide logger at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:expr),* $(,)?) => {
        $crate::logger().debug(&[$($crate::IntoArg::to_arg(&$arg)),*])
    };
}
