//! Integration tests for Engine logging and the error macros
//!
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use lumen_engine::lumen::{Engine, Error, Result};
use lumen_engine::lumen::log::{DefaultLogger, Logger, LogEntry, LogSeverity};
use lumen_engine::{engine_bail, engine_bail_warn, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn install() -> Arc<Mutex<Vec<LogEntry>>> {
        let entries = Arc::new(Mutex::new(Vec::new()));
        Engine::set_logger(Self { entries: entries.clone() });
        entries
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOGGER
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger_receives_entries_in_order() {
    let entries = TestLogger::install();

    Engine::log(LogSeverity::Info, "lumen::Test", "first".to_string());
    Engine::log(LogSeverity::Warn, "lumen::Test", "second".to_string());
    Engine::log(LogSeverity::Error, "lumen::Test", "third".to_string());

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 3);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[1].severity, LogSeverity::Warn);
    assert_eq!(captured[2].severity, LogSeverity::Error);
    assert!(captured.iter().all(|e| e.source == "lumen::Test"));
    assert_eq!(captured[2].message, "third");
    // Plain log() carries no location
    assert_eq!(captured[2].file, None);
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_log_detailed_keeps_location() {
    let entries = TestLogger::install();

    Engine::log_detailed(
        LogSeverity::Error,
        "lumen::Test",
        "device lost".to_string(),
        "lighting_pass.rs",
        42,
    );

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].file, Some("lighting_pass.rs"));
    assert_eq!(captured[0].line, Some(42));
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_reset_logger_detaches_custom_logger() {
    let entries = TestLogger::install();
    Engine::log(LogSeverity::Info, "lumen::Test", "captured".to_string());

    Engine::reset_logger();
    Engine::log(LogSeverity::Info, "lumen::Test", "not captured".to_string());

    assert_eq!(entries.lock().unwrap().len(), 1);
}

#[test]
fn test_integration_default_logger_filters_by_severity() {
    let logger = DefaultLogger::new(LogSeverity::Warn);
    assert!(!logger.accepts(LogSeverity::Debug));
    assert!(!logger.accepts(LogSeverity::Info));
    assert!(logger.accepts(LogSeverity::Warn));
    assert!(logger.accepts(LogSeverity::Error));
}

#[test]
fn test_integration_engine_version_is_package_version() {
    assert_eq!(Engine::version(), env!("CARGO_PKG_VERSION"));
}

// ============================================================================
// MACROS
// ============================================================================

#[test]
#[serial]
fn test_integration_log_macros_format_arguments() {
    let entries = TestLogger::install();

    engine_debug!("lumen::Pass", "'{}' framebuffer ready", "geometry");
    engine_info!("lumen::DeferredRenderer", "Renderer built with {} passes", 3);
    engine_warn!("lumen::DeferredRenderer", "Swapchain suboptimal on image {}", 1);

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 3);
    assert_eq!(captured[0].severity, LogSeverity::Debug);
    assert_eq!(captured[0].message, "'geometry' framebuffer ready");
    assert_eq!(captured[1].source, "lumen::DeferredRenderer");
    assert_eq!(captured[1].message, "Renderer built with 3 passes");
    assert_eq!(captured[2].severity, LogSeverity::Warn);
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_error_records_this_file() {
    let entries = TestLogger::install();

    engine_error!("lumen::Test", "failed: {}", 7);

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "failed: 7");
    assert!(captured[0].file.unwrap().ends_with("logging_integration_tests.rs"));
    assert!(captured[0].line.unwrap() > 0);
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_err_logs_and_builds_backend_error() {
    let entries = TestLogger::install();

    let error = engine_err!("lumen::vulkan", "Failed to create fence: {}", "OOM");

    assert!(matches!(&error, Error::BackendError(m) if m == "Failed to create fence: OOM"));
    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].source, "lumen::vulkan");
    drop(captured);

    Engine::reset_logger();
}

fn bail_on_zero(value: u32) -> Result<u32> {
    if value == 0 {
        engine_bail!("lumen::Test", "value must be non-zero");
    }
    Ok(value)
}

fn warn_on_zero(value: u32) -> Result<u32> {
    if value == 0 {
        engine_bail_warn!("lumen::Test", "value {} rejected", value);
    }
    Ok(value)
}

#[test]
#[serial]
fn test_integration_bail_macros_return_early_with_severity() {
    let entries = TestLogger::install();

    assert_eq!(bail_on_zero(3).unwrap(), 3);
    assert!(matches!(bail_on_zero(0), Err(Error::BackendError(_))));
    assert!(matches!(warn_on_zero(0), Err(Error::BackendError(m)) if m == "value 0 rejected"));

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[1].severity, LogSeverity::Warn);
    // Warnings carry no location
    assert_eq!(captured[1].file, None);
    drop(captured);

    Engine::reset_logger();
}
