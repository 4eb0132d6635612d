/*!
# Lumen Engine - Vulkan Backend

Vulkan implementation of the `lumen_engine` graphics device traits, built on
`ash` for the Vulkan bindings and `gpu-allocator` for memory management.

```no_run
use lumen_engine::lumen::device::DeviceConfig;
use lumen_engine_renderer_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
let device = VulkanGraphicsDevice::new(window, DeviceConfig::default())?;
let _swapchain = device.create_swapchain(window, 1280, 720)?;
# Ok(())
# }
```

Build with the `vulkan-validation` feature to route validation layer
messages into the engine log.
*/

mod vulkan;
mod vulkan_context;
mod vulkan_debug;
mod vulkan_format;

mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_buffer;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_binding_group;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_command_list;
mod vulkan_sync;
mod vulkan_swapchain;

pub use vulkan::VulkanGraphicsDevice;
pub use vulkan_swapchain::VulkanSwapchain;

pub use vulkan_debug::{print_validation_stats_report, validation_stats};
