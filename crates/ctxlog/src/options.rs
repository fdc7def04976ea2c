//! Logger configuration.
//!
//! [`LoggerOptions`] is the full, always-valid configuration. Callers change
//! it with a [`PartialLoggerOptions`] that only names the keys they care
//! about; [`OptionsStore::merge`] deep-merges that update onto the current
//! state. Partial updates can also come from the environment or from a TOML
//! file, using the same camelCase keys:
//!
//! ```toml
//! showTimestamp = true
//! contextColor = "cyan"
//!
//! [colors]
//! info = "red"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::ColorName;
use crate::level::Level;
use crate::merge::deep_merge;

/// The logger's active configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerOptions {
    /// Prefix every message with an ISO-8601 timestamp
    pub show_timestamp: bool,
    /// Per-level color of the tag and message
    pub colors: BTreeMap<Level, ColorName>,
    /// Color of the call-site segment
    pub context_color: ColorName,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            show_timestamp: false,
            colors: Level::ALL
                .into_iter()
                .map(|level| (level, level.default_color()))
                .collect(),
            context_color: ColorName::Yellow,
        }
    }
}

impl LoggerOptions {
    /// Color for `level`, or [`ColorName::FALLBACK`] when unmapped.
    #[must_use]
    pub fn color_for(&self, level: Level) -> ColorName {
        self.colors
            .get(&level)
            .copied()
            .unwrap_or(ColorName::FALLBACK)
    }
}

/// A partial update to [`LoggerOptions`]. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialLoggerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_timestamp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<BTreeMap<Level, ColorName>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_color: Option<ColorName>,
}

impl PartialLoggerOptions {
    /// An empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an update from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Values | Description |
    /// |----------|--------|-------------|
    /// | `CTXLOG_TIMESTAMPS` | 1/true/0/false | Show timestamps |
    /// | `CTXLOG_CONTEXT_COLOR` | color name | Call-site color |
    /// | `CTXLOG_COLORS` | `info=red,warn=cyan` | Per-level colors |
    ///
    /// Values that don't parse are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut partial = Self::default();

        if let Some(val) = lookup("CTXLOG_TIMESTAMPS") {
            partial.show_timestamp = match val.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            };
        }

        if let Some(val) = lookup("CTXLOG_CONTEXT_COLOR") {
            partial.context_color = val.parse().ok();
        }

        if let Some(val) = lookup("CTXLOG_COLORS") {
            let colors: BTreeMap<Level, ColorName> = val
                .split(',')
                .filter_map(|pair| {
                    let (level, color) = pair.split_once('=')?;
                    Some((level.parse().ok()?, color.parse().ok()?))
                })
                .collect();
            if !colors.is_empty() {
                partial.colors = Some(colors);
            }
        }

        partial
    }

    /// Parse an update from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, OptionsError> {
        toml::from_str(text).map_err(OptionsError::Parse)
    }

    /// Read and parse an update from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Whether this update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Set the timestamp toggle.
    #[must_use]
    pub fn show_timestamp(mut self, show: bool) -> Self {
        self.show_timestamp = Some(show);
        self
    }

    /// Set the color of one level.
    #[must_use]
    pub fn color(mut self, level: Level, color: ColorName) -> Self {
        self.colors.get_or_insert_with(BTreeMap::new).insert(level, color);
        self
    }

    /// Set the call-site color.
    #[must_use]
    pub fn context_color(mut self, color: ColorName) -> Self {
        self.context_color = Some(color);
        self
    }
}

/// Errors raised while loading or applying untyped configuration.
#[derive(Debug)]
pub enum OptionsError {
    /// The configuration file could not be read
    Io { path: PathBuf, source: io::Error },
    /// The configuration text is not valid TOML for these options
    Parse(toml::de::Error),
    /// The merged result is not a valid set of options
    Invalid(serde_json::Error),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            OptionsError::Parse(e) => write!(f, "invalid logger configuration: {e}"),
            OptionsError::Invalid(e) => write!(f, "invalid logger options: {e}"),
        }
    }
}

impl std::error::Error for OptionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OptionsError::Io { source, .. } => Some(source),
            OptionsError::Parse(e) => Some(e),
            OptionsError::Invalid(e) => Some(e),
        }
    }
}

/// Holds the current options and applies merges to them.
#[derive(Debug, Default)]
pub struct OptionsStore {
    current: RwLock<LoggerOptions>,
}

impl OptionsStore {
    /// A store starting from `options`.
    #[must_use]
    pub fn new(options: LoggerOptions) -> Self {
        Self {
            current: RwLock::new(options),
        }
    }

    /// Snapshot of the current options.
    #[must_use]
    pub fn current(&self) -> LoggerOptions {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deep-merge `partial` onto the current options and return the result.
    pub fn merge(&self, partial: &PartialLoggerOptions) -> LoggerOptions {
        // Typed updates always produce valid options
        serde_json::to_value(partial)
            .map_err(OptionsError::Invalid)
            .and_then(|update| self.merge_value(&update))
            .unwrap_or_else(|_| self.current())
    }

    /// Deep-merge an untyped JSON update.
    ///
    /// On error the current options are left unchanged.
    pub fn merge_value(&self, update: &Value) -> Result<LoggerOptions, OptionsError> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let base = serde_json::to_value(&*current).map_err(OptionsError::Invalid)?;
        let merged = deep_merge(&base, update);
        let options: LoggerOptions =
            serde_json::from_value(merged).map_err(OptionsError::Invalid)?;

        *current = options.clone();
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_documented_colors() {
        let options = LoggerOptions::default();
        assert!(!options.show_timestamp);
        assert_eq!(options.context_color, ColorName::Yellow);
        assert_eq!(options.color_for(Level::Log), ColorName::Green);
        assert_eq!(options.color_for(Level::Info), ColorName::Blue);
        assert_eq!(options.color_for(Level::Warn), ColorName::Yellow);
        assert_eq!(options.color_for(Level::Error), ColorName::Red);
        assert_eq!(options.color_for(Level::Debug), ColorName::Magenta);
    }

    #[test]
    fn test_unmapped_level_falls_back_to_white() {
        let mut options = LoggerOptions::default();
        options.colors.remove(&Level::Debug);
        assert_eq!(options.color_for(Level::Debug), ColorName::White);
    }

    #[test]
    fn test_merge_keeps_untouched_nested_keys() {
        let store = OptionsStore::default();
        let merged = store.merge(&PartialLoggerOptions::new().color(Level::Log, ColorName::Red));
        assert_eq!(merged.color_for(Level::Log), ColorName::Red);
        assert_eq!(merged.color_for(Level::Warn), ColorName::Yellow);
        assert_eq!(store.current(), merged);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = OptionsStore::default();
        let update = PartialLoggerOptions::new().show_timestamp(true);
        let once = store.merge(&update);
        let twice = store.merge(&update);
        assert_eq!(once, twice);
        assert!(twice.show_timestamp);
    }

    #[test]
    fn test_merge_does_not_touch_the_update() {
        let store = OptionsStore::default();
        let update = PartialLoggerOptions::new()
            .color(Level::Info, ColorName::Red)
            .context_color(ColorName::Cyan);
        let snapshot = update.clone();
        store.merge(&update);
        assert_eq!(update, snapshot);
    }

    #[test]
    fn test_merge_value_accepts_camel_case_json() {
        let store = OptionsStore::default();
        let merged = store
            .merge_value(&json!({ "showTimestamp": true, "colors": { "info": "grey" } }))
            .unwrap();
        assert!(merged.show_timestamp);
        assert_eq!(merged.color_for(Level::Info), ColorName::Gray);
        assert_eq!(merged.color_for(Level::Error), ColorName::Red);
    }

    #[test]
    fn test_invalid_update_leaves_state_alone() {
        let store = OptionsStore::default();
        let err = store
            .merge_value(&json!({ "colors": { "info": "purple" } }))
            .unwrap_err();
        assert!(matches!(err, OptionsError::Invalid(_)));
        assert_eq!(store.current(), LoggerOptions::default());
    }

    #[test]
    fn test_env_update_parses_known_variables() {
        let partial = PartialLoggerOptions::from_env_with(|key| match key {
            "CTXLOG_TIMESTAMPS" => Some("true".into()),
            "CTXLOG_CONTEXT_COLOR" => Some("cyan".into()),
            "CTXLOG_COLORS" => Some("info=red, warn = gray,bogus=red,debug=nope".into()),
            _ => None,
        });
        assert_eq!(partial.show_timestamp, Some(true));
        assert_eq!(partial.context_color, Some(ColorName::Cyan));
        let colors = partial.colors.unwrap();
        assert_eq!(colors.get(&Level::Info), Some(&ColorName::Red));
        assert_eq!(colors.get(&Level::Warn), Some(&ColorName::Gray));
        assert_eq!(colors.len(), 2);
    }

    #[test]
    fn test_env_update_ignores_garbage() {
        let partial = PartialLoggerOptions::from_env_with(|key| match key {
            "CTXLOG_TIMESTAMPS" => Some("maybe".into()),
            "CTXLOG_CONTEXT_COLOR" => Some("ultraviolet".into()),
            _ => None,
        });
        assert!(partial.is_empty());
    }

    #[test]
    fn test_toml_update_uses_option_names() {
        let partial = PartialLoggerOptions::from_toml_str(
            "showTimestamp = true\ncontextColor = \"red\"\n\n[colors]\ninfo = \"red\"\n",
        )
        .unwrap();
        assert_eq!(partial.show_timestamp, Some(true));
        assert_eq!(partial.context_color, Some(ColorName::Red));
        assert_eq!(
            partial.colors.unwrap().get(&Level::Info),
            Some(&ColorName::Red)
        );
    }

    #[test]
    fn test_toml_errors_are_reported() {
        let err = PartialLoggerOptions::from_toml_str("showTimestamp = \"often\"").unwrap_err();
        assert!(matches!(err, OptionsError::Parse(_)));
        assert!(err.to_string().contains("invalid logger configuration"));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PartialLoggerOptions::from_toml_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, OptionsError::Io { .. }));
    }

    #[test]
    fn test_toml_file_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctxlog.toml");
        std::fs::write(&path, "[colors]\ndebug = \"cyan\"\n").unwrap();

        let store = OptionsStore::default();
        let merged = store.merge(&PartialLoggerOptions::from_toml_file(&path).unwrap());
        assert_eq!(merged.color_for(Level::Debug), ColorName::Cyan);
        assert_eq!(merged.color_for(Level::Log), ColorName::Green);
    }
}
