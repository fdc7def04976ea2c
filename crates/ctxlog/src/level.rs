//! Severity levels.
//!
//! The five levels mirror the classic console entry points. Each one decides
//! the sink a line is written to and the default color of its tag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::color::ColorName;

/// A severity level accepted by the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Plain log output
    Log,
    /// Informational output
    Info,
    /// Warnings
    Warn,
    /// Errors, written to the error sink
    Error,
    /// Debug output
    Debug,
}

impl Level {
    /// All levels, in declaration order.
    pub const ALL: [Level; 5] = [
        Level::Log,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Debug,
    ];

    /// Lowercase name, as used in configuration keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Log => "log",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Debug => "debug",
        }
    }

    /// Uppercase tag shown at the start of every line.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Level::Log => "LOG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Debug => "DEBUG",
        }
    }

    /// Whether lines at this level go to the error sink.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Level::Error)
    }

    /// Built-in color for this level.
    #[must_use]
    pub fn default_color(self) -> ColorName {
        match self {
            Level::Log => ColorName::Green,
            Level::Info => ColorName::Blue,
            Level::Warn => ColorName::Yellow,
            Level::Error => ColorName::Red,
            Level::Debug => ColorName::Magenta,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(Level::Log),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "debug" => Ok(Level::Debug),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

// Parsed from text so levels work as map keys in every format.
impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

// `log` has no plain "log" level; trace is its catch-all, so it lands there.
impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Log,
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG => Level::Debug,
            _ => Level::Log,
        }
    }
}
