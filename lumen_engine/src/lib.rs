/*!
# Lumen Engine

Core types for a deferred-shading renderer organized as a graph of passes.

The crate is backend-agnostic: GPU objects are trait objects created by a
`GraphicsDevice`, implemented for Vulkan by `lumen_engine_renderer_vulkan`.

## Architecture

- **graphics_device**: device, swapchain and GPU object traits
- **scene**: meshes, uniforms and the `FrameContext` every pass reads
- **pass**: the `Pass` lifecycle and the concrete passes
  (Shadow, Geometry, Lighting, Skybox, Tone, Composite)
- **renderer**: `RendererBuilder`, `DeferredRenderer` and the presets

A frame acquires a swapchain image, submits each pass in order (each one
waiting on its predecessor's semaphore), presents, and waits for the device
to go idle.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod scene;
pub mod pass;
pub mod renderer;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // GPU abstraction
    pub mod device {
        pub use crate::graphics_device::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod pass {
        pub use crate::pass::*;
    }

    pub mod renderer {
        pub use crate::renderer::*;
    }
}

// Re-export math library at crate root
pub use glam;
