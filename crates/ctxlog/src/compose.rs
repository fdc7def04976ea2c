//! Line composition.
//!
//! A composed line looks like
//!
//! ```text
//! [INFO] [src/main.rs] [2026-10-16T09:30:00.000Z] User: {"id": 1}
//! ```
//!
//! The level tag and message share the level's color, the call site uses the
//! context color and the timestamp is always gray. The call-site segment is
//! left out when the call site is unknown, and the timestamp when timestamps
//! are off.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::callsite::CallSite;
use crate::color::{ColorName, paint};
use crate::format::{Arg, join_args};
use crate::level::Level;
use crate::options::LoggerOptions;

/// Color of the timestamp segment, independent of configuration.
pub const TIMESTAMP_COLOR: ColorName = ColorName::Gray;

/// Builds output lines from a snapshot of the options.
#[derive(Debug, Clone, Copy)]
pub struct LineComposer<'a> {
    options: &'a LoggerOptions,
    styled: bool,
}

impl<'a> LineComposer<'a> {
    /// A composer emitting colored lines.
    #[must_use]
    pub fn new(options: &'a LoggerOptions) -> Self {
        Self {
            options,
            styled: true,
        }
    }

    /// Turn color escape codes on or off.
    #[must_use]
    pub fn styled(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    /// Compose a line stamped with the current time.
    #[must_use]
    pub fn compose(&self, level: Level, args: &[Arg<'_>], call_site: &CallSite) -> String {
        self.compose_at(level, args, call_site, Utc::now())
    }

    /// Compose a line stamped with `now`.
    #[must_use]
    pub fn compose_at(
        &self,
        level: Level,
        args: &[Arg<'_>],
        call_site: &CallSite,
        now: DateTime<Utc>,
    ) -> String {
        let level_color = self.options.color_for(level);
        let message = join_args(args);

        let mut segments = Vec::with_capacity(4);
        segments.push(self.paint(&format!("[{}]", level.tag()), level_color));

        if let Some(path) = call_site.path() {
            segments.push(self.paint(&format!("[{path}]"), self.options.context_color));
        }

        if self.options.show_timestamp {
            segments.push(self.paint(&format!("[{}]", timestamp_text(now)), TIMESTAMP_COLOR));
        }

        segments.push(self.paint(&message, level_color));
        segments.join(" ")
    }

    fn paint(&self, text: &str, color: ColorName) -> String {
        if self.styled {
            paint(text, color)
        } else {
            text.to_string()
        }
    }
}

/// ISO-8601 UTC timestamp with millisecond precision.
#[must_use]
pub fn timestamp_text(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}
