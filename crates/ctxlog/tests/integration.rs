//! End-to-end behavior of the logger through its public API.

use std::fmt;

use ctxlog::testing::CaptureSinks;
use ctxlog::{
    Arg, CallSite, ColorMode, ColorName, ContextLayer, ContextLogger, FrameSource, IntoArg, Level,
    PartialLoggerOptions, StackFrame,
};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::prelude::*;

const TIMESTAMP: &str = r"\[\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z\]";

fn plain(sinks: &CaptureSinks) -> ContextLogger {
    ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .capture(sinks)
        .build()
}

struct Fixed(Vec<StackFrame>);

impl FrameSource for Fixed {
    fn capture(&self) -> Option<Vec<StackFrame>> {
        Some(self.0.clone())
    }
}

struct NoTrace;

impl FrameSource for NoTrace {
    fn capture(&self) -> Option<Vec<StackFrame>> {
        None
    }
}

struct Panicking;

impl FrameSource for Panicking {
    fn capture(&self) -> Option<Vec<StackFrame>> {
        panic!("capture failed")
    }
}

#[derive(Debug, Serialize)]
struct User {
    id: u32,
    name: &'static str,
}

#[derive(Debug)]
struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timed out")
    }
}

impl std::error::Error for Timeout {}

#[derive(Debug)]
struct RequestFailed(Timeout);

impl fmt::Display for RequestFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("request failed")
    }
}

impl std::error::Error for RequestFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[test]
fn test_only_errors_reach_stderr() {
    let sinks = CaptureSinks::new();
    let logger = plain(&sinks);

    for level in Level::ALL {
        logger.emit(level, &[level.as_str().to_arg()]);
    }

    let stdout = sinks.stdout();
    assert_eq!(stdout.len(), 4);
    for (line, tag) in stdout.iter().zip(["[LOG]", "[INFO]", "[WARN]", "[DEBUG]"]) {
        assert!(line.starts_with(tag), "{line}");
    }
    let stderr = sinks.stderr();
    assert_eq!(stderr.len(), 1);
    assert!(stderr[0].starts_with("[ERROR]"));
}

#[test]
fn test_call_site_points_at_calling_file() {
    let sinks = CaptureSinks::new();
    let logger = plain(&sinks);

    logger.info(&["from the test".to_arg()]);

    assert_eq!(sinks.stdout_string(), "[INFO] [tests/integration.rs] from the test");
    assert!(std::path::Path::new("tests/integration.rs").exists());
}

#[test]
fn test_user_and_object_example() {
    let sinks = CaptureSinks::new();
    let logger = ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .frame_source(Fixed(vec![StackFrame::from_file("src/app.rs")]))
        .capture(&sinks)
        .build();

    logger.info(&["User:".to_arg(), json!({ "id": 1 }).to_arg()]);

    assert_eq!(sinks.raw_stdout(), "[INFO] [src/app.rs] User: {\n  \"id\": 1\n}\n");
}

#[test]
fn test_serializable_structs_are_pretty_printed() {
    let sinks = CaptureSinks::new();
    let logger = plain(&sinks);

    logger.log(&["User data:".to_arg(), User { id: 1, name: "John" }.to_arg()]);
    logger.log(&["Numbers:".to_arg(), [1_u8, 2, 3].to_arg()]);

    let out = sinks.stdout_string();
    assert!(out.contains("User data: {\n  \"id\": 1,\n  \"name\": \"John\"\n}"), "{out}");
    assert!(out.contains("Numbers: [\n  1,\n  2,\n  3\n]"), "{out}");
}

#[test]
fn test_errors_show_message_and_causes() {
    let sinks = CaptureSinks::new();
    let logger = plain(&sinks);
    let err = RequestFailed(Timeout);

    logger.error(&["Caught error:".to_arg(), Arg::error(&err)]);

    let out = sinks.stderr_string();
    assert!(out.contains("Caught error: request failed"), "{out}");
    assert!(out.contains("caused by: timed out"), "{out}");
    assert_eq!(sinks.stderr_writes(), 1);
}

#[test]
fn test_timestamps_follow_options() {
    let sinks = CaptureSinks::new();
    let logger = ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .frame_source(NoTrace)
        .capture(&sinks)
        .build();

    logger.info(&["before".to_arg()]);
    logger.set_options(&PartialLoggerOptions::new().show_timestamp(true));
    logger.info(&["after".to_arg()]);

    let lines = sinks.stdout();
    assert_eq!(lines[0], "[INFO] before");
    let stamped = regex::Regex::new(&format!("^\\[INFO\\] {TIMESTAMP} after$")).unwrap();
    assert!(stamped.is_match(&lines[1]), "{}", lines[1]);
}

#[test]
fn test_missing_trace_omits_call_site() {
    let sinks = CaptureSinks::new();
    let without_trace = ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .frame_source(NoTrace)
        .capture(&sinks)
        .build();
    without_trace.warn(&["no trace".to_arg()]);

    let panicking = ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .frame_source(Panicking)
        .capture(&sinks)
        .build();
    panicking.warn(&["still logs".to_arg()]);

    assert_eq!(
        sinks.stdout(),
        vec!["[WARN] no trace".to_string(), "[WARN] still logs".to_string()]
    );
}

#[cfg(unix)]
#[test]
fn test_captured_frames_skip_logger_and_runtime() {
    let sinks = CaptureSinks::new();
    let frames = vec![
        StackFrame::default().with_function("std::backtrace::Backtrace::force_capture"),
        StackFrame::from_file("/home/dev/ctxlog/src/logger.rs")
            .with_function("ctxlog::logger::ContextLogger::info"),
        StackFrame::from_file("/srv/app/src/handlers/user.rs")
            .with_function("app::handlers::user::show"),
        StackFrame::from_file("/srv/app/src/main.rs").with_function("app::main"),
    ];
    let logger = ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .frame_source(Fixed(frames))
        .base_dir("/srv/app")
        .capture(&sinks)
        .build();

    logger.debug(&["loaded".to_arg()]);

    assert_eq!(sinks.stdout_string(), "[DEBUG] [src/handlers/user.rs] loaded");
}

#[cfg(unix)]
#[test]
fn test_file_urls_are_resolved() {
    let sinks = CaptureSinks::new();
    let logger = ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .frame_source(Fixed(vec![StackFrame::from_file("file:///srv/app/lib/db.rs")]))
        .base_dir("/srv/app")
        .capture(&sinks)
        .build();

    logger.log(&["query".to_arg()]);

    assert_eq!(sinks.stdout_string(), "[LOG] [lib/db.rs] query");
}

#[test]
fn test_options_merge_deeply_across_calls() {
    let logger = ContextLogger::builder().capture(&CaptureSinks::new()).build();

    logger
        .set_options(&PartialLoggerOptions::new().color(Level::Info, ColorName::Red))
        .set_options(&PartialLoggerOptions::new().context_color(ColorName::Cyan));
    logger
        .options_store()
        .merge_value(&json!({ "colors": { "warn": "gray" }, "showTimestamp": null }))
        .unwrap();

    let options = logger.options();
    assert_eq!(options.color_for(Level::Info), ColorName::Red);
    assert_eq!(options.color_for(Level::Warn), ColorName::Gray);
    assert_eq!(options.color_for(Level::Log), ColorName::Green);
    assert_eq!(options.context_color, ColorName::Cyan);
    assert!(!options.show_timestamp);
}

#[test]
fn test_colored_output_uses_configured_colors() {
    let sinks = CaptureSinks::new();
    let logger = ContextLogger::builder()
        .color_mode(ColorMode::Always)
        .frame_source(Fixed(vec![StackFrame::from_file("src/app.rs")]))
        .capture(&sinks)
        .build();
    logger.set_options(&PartialLoggerOptions::new().color(Level::Info, ColorName::Red));

    logger.info(&["hot".to_arg()]);

    let raw = sinks.raw_stdout();
    assert!(raw.starts_with(&ctxlog::color::paint("[INFO]", ColorName::Red)), "{raw:?}");
    assert!(raw.contains(&ctxlog::color::paint("[src/app.rs]", ColorName::Yellow)));
    assert_eq!(sinks.stdout_string(), "[INFO] [src/app.rs] hot");
}

#[test]
fn test_compose_matches_written_line() {
    let sinks = CaptureSinks::new();
    let logger = ContextLogger::builder()
        .color_mode(ColorMode::Never)
        .frame_source(NoTrace)
        .capture(&sinks)
        .build();

    let composed = logger.compose(Level::Warn, &["same".to_arg()], &CallSite::Unknown);
    logger.warn(&["same".to_arg()]);

    assert_eq!(sinks.stdout_string(), composed);
}

#[test]
fn test_tracing_events_share_the_pipeline() {
    let sinks = CaptureSinks::new();
    let logger: &'static ContextLogger = Box::leak(Box::new(plain(&sinks)));
    let subscriber = tracing_subscriber::registry().with(ContextLayer::new(logger));

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(attempt = 2, "retrying");
        tracing::error!("gave up");
    });

    assert_eq!(sinks.stdout_string(), "[WARN] [tests/integration.rs] retrying attempt=2");
    assert_eq!(sinks.stderr_string(), "[ERROR] [tests/integration.rs] gave up");
}

#[test]
fn test_concurrent_writers_never_interleave_lines() {
    let sinks = CaptureSinks::new();
    let logger = plain(&sinks);

    std::thread::scope(|scope| {
        for worker in 0..4_u32 {
            let logger = &logger;
            scope.spawn(move || {
                for i in 0..50_u32 {
                    logger.info(&["worker".to_arg(), worker.to_arg(), i.to_arg()]);
                }
            });
        }
    });

    let lines = sinks.stdout();
    assert_eq!(lines.len(), 200);
    assert!(lines.iter().all(|line| line.starts_with("[INFO] [")));
}
