//! Argument formatting.
//!
//! Every value handed to a log call becomes an [`Arg`], and [`format_arg`]
//! turns an `Arg` into the text that ends up on the line:
//!
//! - text is passed through unchanged
//! - errors render as their message, a newline, then their diagnostic trace
//! - anything `Serialize` renders as pretty JSON, falling back to `Debug`
//!   when serialization fails
//!
//! ```ignore
//! use ctxlog::format::{Arg, format_arg};
//!
//! #[derive(serde::Serialize, Debug)]
//! struct User { id: u32 }
//!
//! let user = User { id: 1 };
//! assert_eq!(format_arg(&Arg::value(&user)), "{\n  \"id\": 1\n}");
//! ```

use std::borrow::Cow;
use std::fmt::{self, Write as _};

use serde::Serialize;
use serde_json::Value;

use crate::unwind::catch_quietly;

/// Rendered in place of a value whose formatting impls panicked.
const UNFORMATTABLE: &str = "<unformattable value>";

/// Object-safe view of a value that can be rendered as JSON or `Debug`.
pub trait Structured {
    /// Serialize into a JSON tree.
    fn to_json_value(&self) -> serde_json::Result<Value>;

    /// Generic string conversion used when serialization fails.
    fn to_fallback_string(&self) -> String;
}

impl<T> Structured for T
where
    T: Serialize + fmt::Debug,
{
    fn to_json_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn to_fallback_string(&self) -> String {
        format!("{self:?}")
    }
}

/// One argument of a log call.
pub struct Arg<'a> {
    repr: Repr<'a>,
}

enum Repr<'a> {
    Text(Cow<'a, str>),
    Error(&'a (dyn std::error::Error + 'a)),
    Value(&'a dyn Structured),
    Display(&'a dyn fmt::Display),
}

impl<'a> Arg<'a> {
    /// Plain text, printed as-is.
    pub fn text(text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            repr: Repr::Text(text.into()),
        }
    }

    /// An error, printed as its message followed by its trace.
    pub fn error(error: &'a (dyn std::error::Error + 'a)) -> Self {
        Self {
            repr: Repr::Error(error),
        }
    }

    /// A structured value, printed as pretty JSON.
    pub fn value<T>(value: &'a T) -> Self
    where
        T: Serialize + fmt::Debug,
    {
        Self {
            repr: Repr::Value(value),
        }
    }

    /// A value printed through its `Display` impl.
    pub fn display(value: &'a dyn fmt::Display) -> Self {
        Self {
            repr: Repr::Display(value),
        }
    }

    /// Borrow this argument again without cloning owned text.
    #[must_use]
    pub fn reborrow(&self) -> Arg<'_> {
        let repr = match &self.repr {
            Repr::Text(text) => Repr::Text(Cow::Borrowed(text.as_ref())),
            Repr::Error(error) => Repr::Error(*error),
            Repr::Value(value) => Repr::Value(*value),
            Repr::Display(value) => Repr::Display(*value),
        };
        Arg { repr }
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.repr {
            Repr::Text(_) => "Text",
            Repr::Error(_) => "Error",
            Repr::Value(_) => "Value",
            Repr::Display(_) => "Display",
        };
        f.debug_struct("Arg").field("kind", &kind).finish_non_exhaustive()
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(text: &'a str) -> Self {
        Arg::text(text)
    }
}

impl From<String> for Arg<'_> {
    fn from(text: String) -> Self {
        Arg::text(text)
    }
}

/// Conversion used by the logging macros.
///
/// Anything `Serialize + Debug` becomes a structured argument; an [`Arg`]
/// built explicitly (for errors or `Display`-only values) is passed through.
pub trait IntoArg {
    /// Borrow `self` as a log argument.
    fn to_arg(&self) -> Arg<'_>;
}

impl<T> IntoArg for T
where
    T: Serialize + fmt::Debug,
{
    fn to_arg(&self) -> Arg<'_> {
        Arg::value(self)
    }
}

impl IntoArg for Arg<'_> {
    fn to_arg(&self) -> Arg<'_> {
        self.reborrow()
    }
}

/// Render one argument. Never panics.
#[must_use]
pub fn format_arg(arg: &Arg<'_>) -> String {
    match &arg.repr {
        Repr::Text(text) => text.to_string(),
        Repr::Error(error) => {
            catch_quietly(|| format_error(*error)).unwrap_or_else(|| UNFORMATTABLE.into())
        }
        Repr::Value(value) => format_structured(*value),
        Repr::Display(value) => catch_quietly(|| value.to_string()).unwrap_or_else(|| UNFORMATTABLE.into()),
    }
}

/// Render every argument and join them with single spaces.
#[must_use]
pub fn join_args(args: &[Arg<'_>]) -> String {
    args.iter().map(format_arg).collect::<Vec<_>>().join(" ")
}

/// Render an error as `message\ntrace`.
///
/// The trace is the error's `Debug` output followed by its `source()` chain.
#[must_use]
pub fn format_error(error: &(dyn std::error::Error + '_)) -> String {
    let mut out = format!("{error}\n{error:?}");
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(out, "\n    caused by: {cause}");
        source = cause.source();
    }
    out
}

fn format_structured(value: &dyn Structured) -> String {
    let rendered = catch_quietly(|| match value.to_json_value() {
        Ok(Value::String(text)) => Some(text),
        Ok(json) => serde_json::to_string_pretty(&json).ok(),
        Err(_) => None,
    });

    match rendered {
        Some(Some(text)) => text,
        _ => catch_quietly(|| value.to_fallback_string()).unwrap_or_else(|| UNFORMATTABLE.into()),
    }
}
