//! Testing utilities for logger output.
//!
//! [`CaptureSinks`] stands in for stdout and stderr so tests can assert on
//! what a [`ContextLogger`](crate::ContextLogger) wrote.

mod capture;

pub use capture::{CaptureSinks, CaptureWriter};
