/// Vulkan debug messenger - routes validation layer messages into the engine log
///
/// Messages are filtered by `DebugSeverity`, counted in global statistics and
/// logged under the "lumen::vulkan::validation" source. The messenger itself
/// only exists when the crate is built with the `vulkan-validation` feature.

use ash::vk;
use colored::*;
use lumen_engine::lumen::device::{DebugSeverity, ValidationStats};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

#[cfg(feature = "vulkan-validation")]
use lumen_engine::{engine_debug, engine_error, engine_info, engine_warn};

/// Global debug configuration (shared across callbacks)
static DEBUG_CONFIG: RwLock<Option<DebugConfig>> = RwLock::new(None);

/// Global validation statistics
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

#[derive(Debug, Clone, Copy)]
pub(crate) struct DebugConfig {
    pub(crate) severity: DebugSeverity,
    pub(crate) break_on_error: bool,
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    #[cfg_attr(not(feature = "vulkan-validation"), allow(dead_code))]
    fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Messenger severity mask for a configured `DebugSeverity`
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

#[cfg_attr(not(feature = "vulkan-validation"), allow(dead_code))]
fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Install the callback configuration and reset the statistics
#[cfg_attr(not(feature = "vulkan-validation"), allow(dead_code))]
pub(crate) fn init(config: DebugConfig) {
    VALIDATION_STATS.reset();
    if let Ok(mut guard) = DEBUG_CONFIG.write() {
        *guard = Some(config);
    }
}

/// Stop handling messages (called before the messenger is destroyed)
pub(crate) fn shutdown() {
    if let Ok(mut guard) = DEBUG_CONFIG.write() {
        *guard = None;
    }
}

/// Validation messages counted since the device was created
pub fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.get()
}

/// Print a colored summary of `validation_stats()` to stdout
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());
    println!("{}\n", "====================================".bright_blue().bold());
}

/// Create the debug messenger for `instance`
#[cfg(feature = "vulkan-validation")]
pub(crate) fn create_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: DebugConfig,
) -> lumen_engine::lumen::Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    init(config);

    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_flags(config.severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback));

    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
        .map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create debug messenger: {:?}", e);
            lumen_engine::lumen::Error::InitializationFailed(format!(
                "Failed to create debug messenger: {:?}",
                e
            ))
        })?;
    Ok((loader, messenger))
}

/// Vulkan debug messenger callback
#[cfg(feature = "vulkan-validation")]
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let config = match DEBUG_CONFIG.read().ok().and_then(|guard| *guard) {
        Some(config) => config,
        None => return vk::FALSE,
    };
    if !severity_flags(config.severity).intersects(message_severity) {
        return vk::FALSE;
    }

    let callback_data = &*p_callback_data;
    let message_id = callback_data
        .message_id_name_as_c_str()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| "Unknown".into());
    let message = callback_data
        .message_as_c_str()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| "No message".into());
    let kind = message_type_name(message_type);

    VALIDATION_STATS.record(message_severity);

    const SOURCE: &str = "lumen::vulkan::validation";
    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        engine_error!(SOURCE, "[{}] {}: {}", kind, message_id, message);
        if config.break_on_error {
            eprintln!("{}", "BREAK ON VALIDATION ERROR - aborting".red().bold());
            std::process::abort();
        }
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        engine_warn!(SOURCE, "[{}] {}: {}", kind, message_id, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        engine_info!(SOURCE, "[{}] {}: {}", kind, message_id, message);
    } else {
        engine_debug!(SOURCE, "[{}] {}: {}", kind, message_id, message);
    }

    vk::FALSE
}

#[cfg(test)]
#[path = "vulkan_debug_tests.rs"]
mod tests;
