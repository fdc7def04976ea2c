//! Installing a logger behind the `log` facade. Kept in its own test binary
//! because the facade can only be claimed once per process.

use ctxlog::testing::CaptureSinks;
use ctxlog::{CallSiteMode, ColorMode, ContextLogger, OverrideError};

#[test]
fn test_override_routes_log_macros() {
    let sinks = CaptureSinks::new();
    let logger: &'static ContextLogger = Box::leak(Box::new(
        ContextLogger::builder()
            .color_mode(ColorMode::Never)
            .call_site_mode(CallSiteMode::Captured)
            .capture(&sinks)
            .build(),
    ));

    assert_eq!(logger.override_global(), Ok(()));
    assert_eq!(logger.override_global(), Ok(()));

    let other: &'static ContextLogger = Box::leak(Box::new(ContextLogger::builder().build()));
    assert_eq!(other.override_global(), Err(OverrideError::AlreadyInstalled));

    log::info!("routed {}", 1);
    log::error!("broken");
    log::trace!("fine detail");

    assert_eq!(
        sinks.stdout(),
        vec![
            "[INFO] [tests/global_override.rs] routed 1".to_string(),
            "[LOG] [tests/global_override.rs] fine detail".to_string(),
        ]
    );
    assert_eq!(sinks.stderr_string(), "[ERROR] [tests/global_override.rs] broken");
}
