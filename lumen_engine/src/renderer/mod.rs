/// Renderer module - orders the passes and drives the frame loop

mod renderer_config;
mod renderer_builder;
mod deferred_renderer;
pub mod presets;

pub use renderer_config::RendererConfig;
pub use renderer_builder::RendererBuilder;
pub use deferred_renderer::{ChainLink, DeferredRenderer, FrameStatus, RendererStats};

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
