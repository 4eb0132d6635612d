/// State and helpers shared by every pass.
///
/// `PassBase` owns the GPU objects of a pass and records its command
/// lists. Concrete passes describe *what* goes into each object and call
/// the helpers here to build it.

use std::path::Path;
use std::sync::Arc;
use crate::engine_debug;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingWrite, ClearValue,
    ColorBlendState, CommandList, CullMode, DepthBias, DepthStencilState, DescriptorPoolDesc, DescriptorPool,
    DynamicState, Framebuffer, FramebufferDesc, GraphicsDevice, Pipeline, PipelineCache,
    PipelineDesc, PipelineLayout, PipelineLayoutDesc, PrimitiveTopology, PushConstantRange,
    RasterizationState, Rect2D, RenderPass, Semaphore, Shader, ShaderDesc, ShaderStage,
    VertexLayout, Viewport,
};
use crate::pass::{AttachmentProvider, AttachmentType, PassDesc, PassOutputs, PassType, SampledAttachment, SetupContext};
use crate::scene::FrameContext;

/// Fixed-function state a concrete pass chooses for its pipeline
pub struct PipelineState {
    pub shaders: Vec<(&'static str, ShaderStage)>,
    pub vertex_layout: VertexLayout,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    /// One entry per color attachment
    pub color_blend: Vec<ColorBlendState>,
    pub dynamic_states: Vec<DynamicState>,
}

impl PipelineState {
    /// Fullscreen triangle: no vertex input, no culling, no depth
    pub fn fullscreen(fragment_shader: &'static str, color_attachments: usize) -> Self {
        Self {
            shaders: vec![
                ("fullscreen.vert.spv", ShaderStage::Vertex),
                (fragment_shader, ShaderStage::Fragment),
            ],
            vertex_layout: VertexLayout::default(),
            rasterization: RasterizationState {
                cull_mode: CullMode::None,
                ..RasterizationState::default()
            },
            depth_stencil: DepthStencilState::disabled(),
            color_blend: vec![ColorBlendState::default(); color_attachments],
            dynamic_states: vec![DynamicState::Viewport, DynamicState::Scissor],
        }
    }
}

// Field order is the release order of whatever `release_resources` leaves.
pub struct PassBase {
    desc: PassDesc,
    outputs: PassOutputs,
    command_lists: Vec<Box<dyn CommandList>>,
    pipeline: Option<Arc<dyn Pipeline>>,
    binding_groups: Vec<Arc<dyn BindingGroup>>,
    descriptor_pool: Option<Arc<dyn DescriptorPool>>,
    pipeline_layout: Option<Arc<dyn PipelineLayout>>,
    set_layout: Option<Arc<dyn BindingGroupLayout>>,
    framebuffer: Option<Arc<dyn Framebuffer>>,
    depth_bias: Option<DepthBias>,
    initialized: bool,
    semaphore: Arc<dyn Semaphore>,
    pipeline_cache: Arc<dyn PipelineCache>,
    device: Arc<dyn GraphicsDevice>,
}

impl PassBase {
    /// Allocate the handles every pass needs before initialization
    ///
    /// On-screen passes get one command list per swapchain image,
    /// off-screen passes exactly one.
    pub fn new(device: Arc<dyn GraphicsDevice>, desc: PassDesc, swapchain_image_count: usize) -> Result<Self> {
        let pipeline_cache = device.create_pipeline_cache()?;
        let semaphore = device.create_semaphore()?;

        let list_count = match desc.attachment_type {
            AttachmentType::OnScreen => swapchain_image_count,
            AttachmentType::OffScreen => 1,
        };
        if list_count == 0 {
            return Err(Error::InvalidResource(format!(
                "pass '{}': on-screen pass needs at least one swapchain image",
                desc.name
            )));
        }
        let command_lists = (0..list_count)
            .map(|_| device.create_command_list())
            .collect::<Result<Vec<_>>>()?;

        engine_debug!(
            "lumen::pass",
            "Pass '{}' created ({:?}, {:?}, {} command list(s))",
            desc.name,
            desc.pass_type,
            desc.attachment_type,
            list_count
        );

        Ok(Self {
            outputs: PassOutputs::new(&desc.name),
            desc,
            command_lists,
            pipeline: None,
            binding_groups: Vec::new(),
            descriptor_pool: None,
            pipeline_layout: None,
            set_layout: None,
            framebuffer: None,
            depth_bias: None,
            initialized: false,
            semaphore,
            pipeline_cache,
            device,
        })
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn desc(&self) -> &PassDesc {
        &self.desc
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn semaphore(&self) -> &dyn Semaphore {
        self.semaphore.as_ref()
    }

    pub fn command_list_count(&self) -> usize {
        self.command_lists.len()
    }

    pub fn framebuffer(&self) -> Option<&Arc<dyn Framebuffer>> {
        self.framebuffer.as_ref()
    }

    pub fn pipeline(&self) -> Option<&Arc<dyn Pipeline>> {
        self.pipeline.as_ref()
    }

    pub fn pipeline_layout(&self) -> Option<&Arc<dyn PipelineLayout>> {
        self.pipeline_layout.as_ref()
    }

    pub fn binding_groups(&self) -> &[Arc<dyn BindingGroup>] {
        &self.binding_groups
    }

    pub fn depth_bias(&self) -> Option<DepthBias> {
        self.depth_bias
    }

    pub fn set_depth_bias(&mut self, bias: Option<DepthBias>) {
        self.depth_bias = bias;
    }

    pub fn outputs(&self) -> &PassOutputs {
        &self.outputs
    }

    pub fn provider(&self) -> Arc<dyn AttachmentProvider> {
        self.outputs.provider()
    }

    pub(crate) fn set_extent(&mut self, width: u32, height: u32) {
        self.desc.width = width;
        self.desc.height = height;
    }

    /// Extent rendered at: the swapchain's for on-screen passes
    pub fn extent(&self, ctx: &SetupContext) -> (u32, u32) {
        match self.desc.attachment_type {
            AttachmentType::OnScreen => (ctx.swapchain.width(), ctx.swapchain.height()),
            AttachmentType::OffScreen => (self.desc.width, self.desc.height),
        }
    }

    /// Command list to submit for swapchain image `image_index`
    pub fn command_list(&self, image_index: u32) -> Result<&dyn CommandList> {
        if !self.initialized {
            crate::engine_error!(
                "lumen::pass",
                "Pass '{}' queried before initialization",
                self.desc.name
            );
            return Err(Error::PassNotInitialized(self.desc.name.clone()));
        }
        let list = match self.desc.attachment_type {
            AttachmentType::OnScreen => self.command_lists.get(image_index as usize).ok_or_else(|| {
                crate::engine_error!(
                    "lumen::pass",
                    "Pass '{}': image index {} out of range",
                    self.desc.name,
                    image_index
                );
                Error::ImageIndexOutOfRange {
                    pass: self.desc.name.clone(),
                    index: image_index,
                    count: self.command_lists.len() as u32,
                }
            })?,
            AttachmentType::OffScreen => self
                .command_lists
                .first()
                .ok_or_else(|| Error::PassNotInitialized(self.desc.name.clone()))?,
        };
        Ok(&**list)
    }

    // ===== LIFECYCLE =====

    /// Drop what a previous `initialize()` built and unpublish the outputs
    ///
    /// On-screen passes also match their command lists to the swapchain's
    /// current image count, which may change when it is recreated.
    pub(crate) fn prepare_for_setup(&mut self, ctx: &SetupContext) -> Result<()> {
        self.initialized = false;
        self.outputs.revoke();
        self.pipeline = None;
        self.binding_groups.clear();
        self.descriptor_pool = None;
        self.pipeline_layout = None;
        self.set_layout = None;
        self.framebuffer = None;

        if self.desc.attachment_type == AttachmentType::OnScreen {
            let image_count = ctx.swapchain.image_count();
            if image_count == 0 {
                return Err(Error::InvalidResource(format!(
                    "pass '{}': on-screen pass needs at least one swapchain image",
                    self.desc.name
                )));
            }
            if image_count != self.command_lists.len() {
                engine_debug!(
                    "lumen::pass",
                    "Pass '{}': {} -> {} command lists",
                    self.desc.name,
                    self.command_lists.len(),
                    image_count
                );
                self.command_lists.truncate(image_count);
                while self.command_lists.len() < image_count {
                    self.command_lists.push(self.device.create_command_list()?);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Release GPU objects in reverse dependency order
    ///
    /// The semaphore and pipeline cache follow when the base itself drops.
    pub fn release_resources(&mut self) {
        self.initialized = false;
        self.outputs.revoke();
        self.command_lists.clear();
        self.pipeline = None;
        self.binding_groups.clear();
        self.descriptor_pool = None;
        self.pipeline_layout = None;
        self.set_layout = None;
        self.framebuffer = None;
    }

    // ===== SETUP HELPERS =====

    /// Create the pass framebuffer (and with it the render pass and attachments)
    pub fn create_framebuffer(&mut self, desc: FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        let framebuffer = self.device.create_framebuffer(desc)?;
        self.framebuffer = Some(framebuffer.clone());
        Ok(framebuffer)
    }

    /// Make `attachments` readable by later passes
    pub fn publish(&self, attachments: Vec<SampledAttachment>) {
        self.outputs.publish(attachments);
    }

    /// Render pass pipelines of this pass are built against
    pub fn render_pass(&self, ctx: &SetupContext) -> Result<Arc<dyn RenderPass>> {
        match self.desc.attachment_type {
            AttachmentType::OnScreen => Ok(ctx.swapchain.render_pass().clone()),
            AttachmentType::OffScreen => self
                .framebuffer
                .as_ref()
                .map(|fb| fb.render_pass().clone())
                .ok_or_else(|| {
                    Error::InvalidResource(format!("pass '{}' has no framebuffer", self.desc.name))
                }),
        }
    }

    /// Pipeline layout `[scene set 0, set 1]`
    ///
    /// Set 1 is the per-mesh layout for mesh passes and `pass_layout` for
    /// fullscreen passes.
    pub fn create_pipeline_layout(
        &mut self,
        frame: &FrameContext,
        pass_layout: Option<Arc<dyn BindingGroupLayout>>,
        push_constant_ranges: Vec<PushConstantRange>,
    ) -> Result<()> {
        let set_1 = match (self.desc.pass_type, &pass_layout) {
            (PassType::Mesh, _) => frame.mesh_layout().clone(),
            (PassType::FullScreen, Some(layout)) => layout.clone(),
            (PassType::FullScreen, None) => {
                return Err(Error::InvalidResource(format!(
                    "fullscreen pass '{}' needs a pass binding layout",
                    self.desc.name
                )))
            }
        };

        let layout = self.device.create_pipeline_layout(PipelineLayoutDesc {
            set_layouts: vec![frame.scene_layout().clone(), set_1],
            push_constant_ranges,
        })?;
        self.pipeline_layout = Some(layout);
        self.set_layout = pass_layout;
        Ok(())
    }

    /// Binding layout, pool and group for the pass's own inputs (set 1)
    ///
    /// The pool is sized for exactly this one group.
    pub fn create_pass_binding_group(
        &mut self,
        layout_desc: BindingGroupLayoutDesc,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroupLayout>> {
        let layout = self.device.create_binding_group_layout(layout_desc)?;
        let pool = self
            .device
            .create_descriptor_pool(DescriptorPoolDesc::for_layouts(&[layout.desc()]))?;
        let group = self.device.create_binding_group(&pool, &layout, writes)?;

        self.descriptor_pool = Some(pool);
        self.binding_groups.push(group);
        Ok(layout)
    }

    /// Load SPIR-V stages from `<shader_dir>/<file>`
    pub fn load_shaders(
        &self,
        shader_dir: &Path,
        shaders: &[(&str, ShaderStage)],
    ) -> Result<Vec<Arc<dyn Shader>>> {
        shaders
            .iter()
            .map(|(file, stage)| {
                self.device.create_shader(ShaderDesc {
                    path: shader_dir.join(file),
                    stage: *stage,
                    entry_point: "main".to_string(),
                })
            })
            .collect()
    }

    /// Build the pass pipeline from `state` against this pass's layout and render pass
    pub fn create_pipeline(&mut self, ctx: &SetupContext, state: PipelineState) -> Result<()> {
        let layout = self.pipeline_layout.clone().ok_or_else(|| {
            Error::InvalidResource(format!("pass '{}' has no pipeline layout", self.desc.name))
        })?;
        let shaders = self.load_shaders(ctx.shader_dir, &state.shaders)?;

        let pipeline = self.device.create_pipeline(PipelineDesc {
            label: self.desc.name.clone(),
            layout,
            render_pass: self.render_pass(ctx)?,
            cache: Some(self.pipeline_cache.clone()),
            shaders,
            vertex_layout: state.vertex_layout,
            topology: PrimitiveTopology::TriangleList,
            rasterization: state.rasterization,
            depth_stencil: state.depth_stencil,
            color_blend: state.color_blend,
            dynamic_states: state.dynamic_states,
        })?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    // ===== RECORDING =====

    /// Framebuffer command list `index` renders into
    fn target(&self, ctx: &SetupContext, index: usize) -> Result<Arc<dyn Framebuffer>> {
        let target = match self.desc.attachment_type {
            AttachmentType::OnScreen => ctx.swapchain.framebuffer(index),
            AttachmentType::OffScreen => self.framebuffer.as_ref(),
        };
        target.cloned().ok_or_else(|| {
            Error::InvalidResource(format!(
                "pass '{}' has no framebuffer for command list {}",
                self.desc.name, index
            ))
        })
    }

    /// Record every command list of the pass
    ///
    /// Each list gets: begin, begin render pass, viewport and scissor,
    /// depth bias when set, pipeline, scene set 0, `draw`, end render pass,
    /// `after`, end.
    pub fn record<D, A>(
        &mut self,
        ctx: &SetupContext,
        clear_values: &[ClearValue],
        mut draw: D,
        mut after: A,
    ) -> Result<()>
    where
        D: FnMut(&mut dyn CommandList, &Arc<dyn Pipeline>) -> Result<()>,
        A: FnMut(&mut dyn CommandList) -> Result<()>,
    {
        let pipeline = self.pipeline.clone().ok_or_else(|| {
            Error::InvalidResource(format!("pass '{}' has no pipeline", self.desc.name))
        })?;
        let scene_group = ctx.frame.scene_group().clone();
        let (width, height) = self.extent(ctx);
        let depth_bias = self.depth_bias;
        let targets = (0..self.command_lists.len())
            .map(|i| self.target(ctx, i))
            .collect::<Result<Vec<_>>>()?;

        for (list, framebuffer) in self.command_lists.iter_mut().zip(targets.iter()) {
            let cmd: &mut dyn CommandList = &mut **list;
            cmd.begin()?;
            cmd.begin_render_pass(framebuffer, clear_values)?;
            cmd.set_viewport(Viewport::full(width, height))?;
            cmd.set_scissor(Rect2D::full(width, height))?;
            if let Some(bias) = depth_bias {
                cmd.set_depth_bias(bias.constant_factor, bias.clamp, bias.slope_factor)?;
            }
            cmd.bind_pipeline(&pipeline)?;
            cmd.bind_binding_group(&pipeline, 0, &scene_group)?;
            draw(&mut *cmd, &pipeline)?;
            cmd.end_render_pass()?;
            after(&mut *cmd)?;
            cmd.end()?;
        }
        Ok(())
    }

    /// Draw one fullscreen triangle with the pass's own set 1
    pub fn record_fullscreen(
        &mut self,
        ctx: &SetupContext,
        clear_values: &[ClearValue],
        push_constants: Option<(PushConstantRange, Vec<u8>)>,
    ) -> Result<()> {
        self.record_fullscreen_then(ctx, clear_values, push_constants, |_| Ok(()))
    }

    /// `record_fullscreen` followed by `after`, outside the render pass
    pub fn record_fullscreen_then<A>(
        &mut self,
        ctx: &SetupContext,
        clear_values: &[ClearValue],
        push_constants: Option<(PushConstantRange, Vec<u8>)>,
        after: A,
    ) -> Result<()>
    where
        A: FnMut(&mut dyn CommandList) -> Result<()>,
    {
        let inputs = self.binding_groups.first().cloned().ok_or_else(|| {
            Error::InvalidResource(format!("pass '{}' has no input binding group", self.desc.name))
        })?;
        self.record(
            ctx,
            clear_values,
            |cmd, pipeline| {
                cmd.bind_binding_group(pipeline, 1, &inputs)?;
                if let Some((range, data)) = &push_constants {
                    cmd.push_constants(pipeline, range.stages, range.offset, data)?;
                }
                cmd.draw(3, 1, 0, 0)
            },
            after,
        )
    }
}

impl Drop for PassBase {
    fn drop(&mut self) {
        self.release_resources();
    }
}

/// Bind each mesh's set 1 and record its draw
pub fn render_scene(
    cmd: &mut dyn CommandList,
    pipeline: &Arc<dyn Pipeline>,
    frame: &FrameContext,
) -> Result<()> {
    for entry in frame.entries() {
        cmd.bind_binding_group(pipeline, 1, &entry.binding_group)?;
        entry.mesh.draw(cmd)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "pass_base_tests.rs"]
mod tests;
