//! Terminal colors.
//!
//! [`ColorName`] is the closed set of colors accepted in configuration, and
//! [`paint`] is the only place that turns a color into escape codes. Whether
//! escape codes are emitted at all is decided by [`ColorMode`].

use std::fmt;
use std::str::FromStr;

use console::{Color, Style};
use serde::{Deserialize, Deserializer, Serialize};

/// A named terminal color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorName {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Gray,
}

impl ColorName {
    /// Color used when a level has no configured color.
    pub const FALLBACK: ColorName = ColorName::White;

    /// Lowercase name, as accepted in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ColorName::Black => "black",
            ColorName::Red => "red",
            ColorName::Green => "green",
            ColorName::Yellow => "yellow",
            ColorName::Blue => "blue",
            ColorName::Magenta => "magenta",
            ColorName::Cyan => "cyan",
            ColorName::White => "white",
            ColorName::Gray => "gray",
        }
    }

    fn style(self) -> Style {
        let style = Style::new().force_styling(true);
        match self {
            ColorName::Black => style.fg(Color::Black),
            ColorName::Red => style.fg(Color::Red),
            ColorName::Green => style.fg(Color::Green),
            ColorName::Yellow => style.fg(Color::Yellow),
            ColorName::Blue => style.fg(Color::Blue),
            ColorName::Magenta => style.fg(Color::Magenta),
            ColorName::Cyan => style.fg(Color::Cyan),
            ColorName::White => style.fg(Color::White),
            // Bright black is what terminals render as gray
            ColorName::Gray => style.fg(Color::Black).bright(),
        }
    }
}

impl fmt::Display for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown color: {}", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for ColorName {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "black" => Ok(ColorName::Black),
            "red" => Ok(ColorName::Red),
            "green" => Ok(ColorName::Green),
            "yellow" => Ok(ColorName::Yellow),
            "blue" => Ok(ColorName::Blue),
            "magenta" => Ok(ColorName::Magenta),
            "cyan" => Ok(ColorName::Cyan),
            "white" => Ok(ColorName::White),
            "gray" | "grey" => Ok(ColorName::Gray),
            _ => Err(ParseColorError(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ColorName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Wrap `text` in the escape codes for `color`.
#[must_use]
pub fn paint(text: &str, color: ColorName) -> String {
    color.style().apply_to(text).to_string()
}

/// When to emit color escape codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Style only when the target stream is a color-capable terminal
    #[default]
    Auto,
    /// Always style, even when piped
    Always,
    /// Never style
    Never,
}

impl ColorMode {
    /// Detect the mode from the process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_with(|key| std::env::var(key).ok())
    }

    /// Detect the mode using a custom variable lookup.
    ///
    /// `CTXLOG_FORCE_COLOR` wins over `NO_COLOR`.
    pub fn detect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("CTXLOG_FORCE_COLOR").is_some() {
            ColorMode::Always
        } else if lookup("NO_COLOR").is_some() {
            ColorMode::Never
        } else {
            ColorMode::Auto
        }
    }

    /// Resolve whether lines bound for stdout (`error_sink == false`) or
    /// stderr should carry escape codes.
    #[must_use]
    pub fn should_style(self, error_sink: bool) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto if error_sink => console::colors_enabled_stderr(),
            ColorMode::Auto => console::colors_enabled(),
        }
    }
}
