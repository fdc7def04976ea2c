//! Run with `cargo run -p ctxlog --example basic`.

use std::fmt;

use ctxlog::{Arg, ColorName, Level, PartialLoggerOptions};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct User {
    id: u32,
    name: &'static str,
    active: bool,
}

#[derive(Debug)]
struct SampleError;

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sample error for testing")
    }
}

impl std::error::Error for SampleError {}

fn risky() -> Result<(), SampleError> {
    Err(SampleError)
}

fn main() {
    ctxlog::set_options(
        &PartialLoggerOptions::new()
            .show_timestamp(true)
            .color(Level::Info, ColorName::Red)
            .context_color(ColorName::Red),
    );
    if let Err(err) = ctxlog::init() {
        eprintln!("could not install logger: {err}");
    }

    ctxlog::log!("This is a basic log message");
    ctxlog::info!("This is info");
    ctxlog::warn!("This is a warning");
    ctxlog::error!("This is an error");
    ctxlog::debug!("This is debug info");

    ctxlog::log!(
        "User data:",
        User {
            id: 1,
            name: "John",
            active: true,
        }
    );
    ctxlog::log!("Numbers:", [1, 2, 3, 4, 5]);

    if let Err(err) = risky() {
        ctxlog::error!("Caught error:", Arg::error(&err));
    }

    // The log facade now writes through the same logger
    log::info!("routed through the log crate");
}
