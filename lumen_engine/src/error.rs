//! Error types for the Lumen engine
//!
//! This module defines the error type used throughout the engine, from GPU
//! object creation in the backend up to pass-graph validation in the renderer,
//! together with the `engine_err!` family of macros that log an error at the
//! point it is created.

use std::fmt;

/// Result type for Lumen engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan object creation, command recording, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, pipeline description, ...)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, subsystems)
    InitializationFailed(String),

    /// A pass was queried for its command list before `initialize()` completed
    PassNotInitialized(String),

    /// An on-screen pass was queried with an image index outside its command list array
    ImageIndexOutOfRange {
        pass: String,
        index: u32,
        count: u32,
    },

    /// A pass was constructed without a producer it cannot work without
    MissingDependency(String),

    /// A producer's outputs were read before the producer published them
    DependencyNotReady(String),

    /// The pass list does not form a valid topological order
    InvalidPassGraph(String),

    /// The swapchain no longer matches the surface and must be rebuilt
    SwapchainOutOfDate,

    /// The logical device was lost
    DeviceLost,
}

impl Error {
    /// Returns true if the application has no recovery path for this error.
    ///
    /// Only `SwapchainOutOfDate` is transient: the caller rebuilds the
    /// swapchain-dependent state and retries the frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::SwapchainOutOfDate)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::PassNotInitialized(pass) => {
                write!(f, "Pass '{}' queried before initialization completed", pass)
            }
            Error::ImageIndexOutOfRange { pass, index, count } => write!(
                f,
                "Pass '{}': image index {} out of range ({} command lists)",
                pass, index, count
            ),
            Error::MissingDependency(msg) => write!(f, "Missing dependency: {}", msg),
            Error::DependencyNotReady(msg) => write!(f, "Dependency not ready: {}", msg),
            Error::InvalidPassGraph(msg) => write!(f, "Invalid pass graph: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::DeviceLost => write!(f, "Device lost"),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR message and build an `Error::BackendError` from it
///
/// # Example
///
/// ```ignore
/// let err = engine_err!("lumen::vulkan", "Failed to create fence: {:?}", e);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::lumen::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return `Err(Error::BackendError)` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN message and build an `Error::BackendError` from it
///
/// Used for failures caused by caller input rather than the device.
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::lumen::Error::BackendError(message)
    }};
}

/// Log a WARN message and return `Err(Error::BackendError)` from the enclosing function
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
