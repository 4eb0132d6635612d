/// Graphics device module - backend-agnostic GPU objects and the device trait

// Module declarations
pub mod graphics_device;
pub mod texture;
pub mod sampler;
pub mod buffer;
pub mod shader;
pub mod pipeline;
pub mod binding_group;
pub mod render_pass;
pub mod framebuffer;
pub mod command_list;
pub mod sync;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use texture::*;
pub use sampler::*;
pub use buffer::*;
pub use shader::*;
pub use pipeline::*;
pub use binding_group::*;
pub use render_pass::*;
pub use framebuffer::*;
pub use command_list::*;
pub use sync::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
