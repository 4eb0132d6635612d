/// Mock graphics device for unit tests (no GPU required)
///
/// Every object created by `MockGraphicsDevice` records what it was created
/// with, and `submit()` replays the recorded commands on the CPU: attachments
/// are cleared, barriers and copies move layouts and contents around, and
/// draws run a test-registered fragment program. Textures hold one uniform
/// color, which is enough to follow a value through a chain of passes.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    validate_binding_writes, AcquiredImage, AttachmentDesc, AttachmentSource, FramebufferAttachment, StoreOp, BindingGroup,
    BindingGroupLayout, BindingGroupLayoutDesc, BindingResource, BindingType, BindingWrite, Buffer,
    BufferDesc, ClearValue, CommandList, DescriptorPool, DescriptorPoolDesc, Framebuffer,
    FramebufferDesc, GraphicsDevice, ImageLayout, IndexType, LoadOp, Pipeline, PipelineCache,
    PipelineDesc, PipelineLayout, PipelineLayoutDesc, PipelineStage, PushConstantRange, Rect2D,
    RenderPass, RenderPassDesc, Sampler, SamplerDesc, Semaphore, Shader, ShaderDesc, ShaderStage,
    ShaderStageFlags, Submission, Swapchain, Texture, TextureDesc, TextureFormat, TextureInfo,
    TextureUsage, Viewport,
};

/// Address of the object behind a reference, used as its identity
pub fn object_id<T: ?Sized>(object: &T) -> usize {
    object as *const T as *const () as usize
}

/// True if both references point at the same object
pub fn same_object<A: ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    object_id(a) == object_id(b)
}

// All objects reaching the mock device were created by it, so the casts
// below always see the concrete mock type.

fn mock_texture(texture: &Arc<dyn Texture>) -> &MockTexture {
    unsafe { &*(Arc::as_ptr(texture) as *const MockTexture) }
}

fn mock_pipeline(pipeline: &Arc<dyn Pipeline>) -> &MockPipeline {
    unsafe { &*(Arc::as_ptr(pipeline) as *const MockPipeline) }
}

fn mock_framebuffer(framebuffer: &Arc<dyn Framebuffer>) -> &MockFramebuffer {
    unsafe { &*(Arc::as_ptr(framebuffer) as *const MockFramebuffer) }
}

fn mock_binding_group(group: &Arc<dyn BindingGroup>) -> &MockBindingGroup {
    unsafe { &*(Arc::as_ptr(group) as *const MockBindingGroup) }
}

fn mock_pool(pool: &Arc<dyn DescriptorPool>) -> &MockDescriptorPool {
    unsafe { &*(Arc::as_ptr(pool) as *const MockDescriptorPool) }
}

/// Commands recorded into a mock command list
pub fn recorded_commands(command_list: &dyn CommandList) -> &[MockCommand] {
    let mock = unsafe { &*(command_list as *const dyn CommandList as *const MockCommandList) };
    &mock.commands
}

/// Shared log of released objects, in drop order
pub type DropLog = Arc<Mutex<Vec<String>>>;

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    pub info: TextureInfo,
    /// Uniform content of every texel and layer
    pub contents: Mutex<[f32; 4]>,
    /// Current layout of every layer
    pub layout: Mutex<ImageLayout>,
}

impl MockTexture {
    pub fn new(desc: &TextureDesc) -> Self {
        Self {
            info: TextureInfo::from(desc),
            contents: Mutex::new([0.0; 4]),
            layout: Mutex::new(ImageLayout::Undefined),
        }
    }

    pub fn contents(&self) -> [f32; 4] {
        *self.contents.lock().unwrap()
    }

    pub fn fill(&self, color: [f32; 4]) {
        *self.contents.lock().unwrap() = color;
    }

    pub fn layout(&self) -> ImageLayout {
        *self.layout.lock().unwrap()
    }

    pub fn set_layout(&self, layout: ImageLayout) {
        *self.layout.lock().unwrap() = layout;
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

/// Access the mock state of a texture created by the mock device
pub fn texture_state(texture: &Arc<dyn Texture>) -> &MockTexture {
    mock_texture(texture)
}

// ============================================================================
// Mock Sampler / Buffer / Shader
// ============================================================================

pub struct MockSampler {
    pub desc: SamplerDesc,
}

impl Sampler for MockSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

pub struct MockBuffer {
    pub desc: BufferDesc,
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(desc: BufferDesc) -> Self {
        let data = vec![0u8; desc.size as usize];
        Self { desc, data: Mutex::new(data) }
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.desc.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.desc.size {
            return Err(Error::InvalidResource(format!(
                "buffer '{}': write of {} bytes at {} exceeds size {}",
                self.desc.label,
                data.len(),
                offset,
                self.desc.size
            )));
        }
        self.data.lock().unwrap()[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }
}

/// Read back the bytes of a buffer created by the mock device
pub fn buffer_contents(buffer: &Arc<dyn Buffer>) -> Vec<u8> {
    let mock = unsafe { &*(Arc::as_ptr(buffer) as *const MockBuffer) };
    mock.data.lock().unwrap().clone()
}

pub struct MockShader {
    pub path: PathBuf,
    pub stage: ShaderStage,
    pub entry_point: String,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

impl MockShader {
    /// File name of the SPIR-V module ("tone.frag.spv")
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ============================================================================
// Mock Pipeline objects
// ============================================================================

pub struct MockPipelineCache;

impl PipelineCache for MockPipelineCache {}

pub struct MockBindingGroupLayout {
    pub desc: BindingGroupLayoutDesc,
}

impl BindingGroupLayout for MockBindingGroupLayout {
    fn desc(&self) -> &BindingGroupLayoutDesc {
        &self.desc
    }
}

pub struct MockPipelineLayout {
    pub set_layouts: Vec<Arc<dyn BindingGroupLayout>>,
    pub push_constant_ranges: Vec<PushConstantRange>,
    drops: DropLog,
}

impl PipelineLayout for MockPipelineLayout {
    fn set_count(&self) -> usize {
        self.set_layouts.len()
    }

    fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }
}

impl Drop for MockPipelineLayout {
    fn drop(&mut self) {
        self.drops.lock().unwrap().push("pipeline_layout".to_string());
    }
}

pub struct MockPipeline {
    pub desc: PipelineDesc,
    drops: DropLog,
}

impl MockPipeline {
    /// Fragment shader of this pipeline, if any
    pub fn fragment_shader(&self) -> Option<&MockShader> {
        self.desc
            .shaders
            .iter()
            .map(|s| unsafe { &*(Arc::as_ptr(s) as *const MockShader) })
            .find(|s| s.stage == ShaderStage::Fragment)
    }
}

impl Pipeline for MockPipeline {
    fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.desc.layout
    }
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        self.drops.lock().unwrap().push(format!("pipeline:{}", self.desc.label));
    }
}

// ============================================================================
// Mock Binding groups
// ============================================================================

pub struct MockDescriptorPool {
    pub desc: DescriptorPoolDesc,
    pub allocated: Mutex<u32>,
    drops: DropLog,
}

impl DescriptorPool for MockDescriptorPool {
    fn desc(&self) -> &DescriptorPoolDesc {
        &self.desc
    }
}

impl Drop for MockDescriptorPool {
    fn drop(&mut self) {
        self.drops.lock().unwrap().push("descriptor_pool".to_string());
    }
}

pub struct MockBindingGroup {
    pub layout: Arc<dyn BindingGroupLayout>,
    pub writes: Vec<BindingWrite>,
    drops: DropLog,
}

impl MockBindingGroup {
    /// Sampled textures ordered by binding number
    pub fn sampled_textures(&self) -> Vec<(u32, Arc<dyn Texture>)> {
        let mut textures: Vec<(u32, Arc<dyn Texture>)> = self
            .writes
            .iter()
            .filter_map(|w| match &w.resource {
                BindingResource::SampledTexture(texture, _) => Some((w.binding, texture.clone())),
                BindingResource::UniformBuffer(_) => None,
            })
            .collect();
        textures.sort_by_key(|(binding, _)| *binding);
        textures
    }
}

impl BindingGroup for MockBindingGroup {
    fn layout(&self) -> &Arc<dyn BindingGroupLayout> {
        &self.layout
    }
}

impl Drop for MockBindingGroup {
    fn drop(&mut self) {
        self.drops
            .lock()
            .unwrap()
            .push(format!("binding_group:{}", self.layout.desc().label));
    }
}

/// Access the mock state of a binding group created by the mock device
pub fn binding_group_state(group: &Arc<dyn BindingGroup>) -> &MockBindingGroup {
    mock_binding_group(group)
}

// ============================================================================
// Mock RenderPass / Framebuffer
// ============================================================================

pub struct MockRenderPass {
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn color_attachment_count(&self) -> usize {
        self.desc.color_attachments.len()
    }

    fn has_depth_attachment(&self) -> bool {
        self.desc.depth_attachment.is_some()
    }
}

pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub render_pass: Arc<dyn RenderPass>,
    pub render_pass_desc: RenderPassDesc,
    pub color_attachments: Vec<Arc<dyn Texture>>,
    pub depth_attachment: Option<Arc<dyn Texture>>,
    pub sampler: Option<Arc<dyn Sampler>>,
    drops: DropLog,
}

impl MockFramebuffer {
    /// Attachments paired with their descriptions, color first then depth
    fn attachments(&self) -> Vec<(&Arc<dyn Texture>, &AttachmentDesc)> {
        let mut all: Vec<(&Arc<dyn Texture>, &AttachmentDesc)> = self
            .color_attachments
            .iter()
            .zip(self.render_pass_desc.color_attachments.iter())
            .collect();
        if let (Some(texture), Some(desc)) =
            (&self.depth_attachment, &self.render_pass_desc.depth_attachment)
        {
            all.push((texture, desc));
        }
        all
    }
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn layers(&self) -> u32 {
        self.layers
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn color_attachment_count(&self) -> usize {
        self.color_attachments.len()
    }

    fn color_attachment(&self, index: usize) -> Option<&Arc<dyn Texture>> {
        self.color_attachments.get(index)
    }

    fn depth_attachment(&self) -> Option<&Arc<dyn Texture>> {
        self.depth_attachment.as_ref()
    }

    fn sampler(&self) -> Option<&Arc<dyn Sampler>> {
        self.sampler.as_ref()
    }
}

impl Drop for MockFramebuffer {
    fn drop(&mut self) {
        self.drops.lock().unwrap().push("framebuffer".to_string());
    }
}

/// Access the mock state of a framebuffer created by the mock device
pub fn framebuffer_state(framebuffer: &Arc<dyn Framebuffer>) -> &MockFramebuffer {
    mock_framebuffer(framebuffer)
}

// ============================================================================
// Mock CommandList
// ============================================================================

/// One recorded command
#[derive(Clone)]
pub enum MockCommand {
    Begin,
    End,
    BeginRenderPass { framebuffer: Arc<dyn Framebuffer>, clear_values: Vec<ClearValue> },
    EndRenderPass,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    SetDepthBias { constant_factor: f32, clamp: f32, slope_factor: f32 },
    BindPipeline(Arc<dyn Pipeline>),
    BindBindingGroup { set_index: u32, group: Arc<dyn BindingGroup> },
    PushConstants { stages: ShaderStageFlags, offset: u32, data: Vec<u8> },
    BindVertexBuffer(Arc<dyn Buffer>),
    BindIndexBuffer(Arc<dyn Buffer>, IndexType),
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
    ImageBarrier { texture: Arc<dyn Texture>, old_layout: ImageLayout, new_layout: ImageLayout },
    CopyTexture { src: Arc<dyn Texture>, dst: Arc<dyn Texture> },
}

impl MockCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MockCommand::Begin => "begin",
            MockCommand::End => "end",
            MockCommand::BeginRenderPass { .. } => "begin_render_pass",
            MockCommand::EndRenderPass => "end_render_pass",
            MockCommand::SetViewport(_) => "set_viewport",
            MockCommand::SetScissor(_) => "set_scissor",
            MockCommand::SetDepthBias { .. } => "set_depth_bias",
            MockCommand::BindPipeline(_) => "bind_pipeline",
            MockCommand::BindBindingGroup { .. } => "bind_binding_group",
            MockCommand::PushConstants { .. } => "push_constants",
            MockCommand::BindVertexBuffer(_) => "bind_vertex_buffer",
            MockCommand::BindIndexBuffer(_, _) => "bind_index_buffer",
            MockCommand::Draw { .. } => "draw",
            MockCommand::DrawIndexed { .. } => "draw_indexed",
            MockCommand::ImageBarrier { .. } => "image_barrier",
            MockCommand::CopyTexture { .. } => "copy_texture",
        }
    }
}

/// Names of the commands recorded into a mock command list
pub fn command_names(command_list: &dyn CommandList) -> Vec<&'static str> {
    recorded_commands(command_list).iter().map(|c| c.name()).collect()
}

pub struct MockCommandList {
    pub commands: Vec<MockCommand>,
    recording: bool,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self { commands: Vec::new(), recording: false }
    }

    fn push(&mut self, command: MockCommand) -> Result<()> {
        if !self.recording {
            return Err(Error::BackendError(format!(
                "{} recorded outside begin/end",
                command.name()
            )));
        }
        self.commands.push(command);
        Ok(())
    }
}

impl Default for MockCommandList {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.recording = true;
        self.push(MockCommand::Begin)
    }

    fn end(&mut self) -> Result<()> {
        self.push(MockCommand::End)?;
        self.recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.push(MockCommand::BeginRenderPass {
            framebuffer: framebuffer.clone(),
            clear_values: clear_values.to_vec(),
        })
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.push(MockCommand::EndRenderPass)
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.push(MockCommand::SetViewport(viewport))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.push(MockCommand::SetScissor(scissor))
    }

    fn set_depth_bias(&mut self, constant_factor: f32, clamp: f32, slope_factor: f32) -> Result<()> {
        self.push(MockCommand::SetDepthBias { constant_factor, clamp, slope_factor })
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.push(MockCommand::BindPipeline(pipeline.clone()))
    }

    fn bind_binding_group(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        binding_group: &Arc<dyn BindingGroup>,
    ) -> Result<()> {
        self.push(MockCommand::BindBindingGroup { set_index, group: binding_group.clone() })
    }

    fn push_constants(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.push(MockCommand::PushConstants { stages, offset, data: data.to_vec() })
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.push(MockCommand::BindVertexBuffer(buffer.clone()))
    }

    fn bind_index_buffer(
        &mut self,
        buffer: &Arc<dyn Buffer>,
        _offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        self.push(MockCommand::BindIndexBuffer(buffer.clone(), index_type))
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) -> Result<()> {
        self.push(MockCommand::Draw { vertex_count, instance_count })
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> Result<()> {
        self.push(MockCommand::DrawIndexed { index_count, instance_count })
    }

    fn image_barrier(
        &mut self,
        texture: &Arc<dyn Texture>,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) -> Result<()> {
        self.push(MockCommand::ImageBarrier { texture: texture.clone(), old_layout, new_layout })
    }

    fn copy_texture(&mut self, src: &Arc<dyn Texture>, dst: &Arc<dyn Texture>) -> Result<()> {
        self.push(MockCommand::CopyTexture { src: src.clone(), dst: dst.clone() })
    }
}

// ============================================================================
// Mock Semaphore
// ============================================================================

pub struct MockSemaphore {
    pub id: u32,
}

impl Semaphore for MockSemaphore {}

// ============================================================================
// Mock Device state
// ============================================================================

/// Inputs of an emulated fragment program
pub struct FragmentInputs {
    /// Contents of the textures bound at set 1, by binding number
    pub sampled: Vec<[f32; 4]>,
    /// Bytes pushed as push constants
    pub push_constants: Vec<u8>,
}

/// CPU stand-in for a fragment shader, keyed by SPIR-V file name
pub type FragmentProgram = Arc<dyn Fn(&FragmentInputs) -> [f32; 4] + Send + Sync>;

/// One submission as seen by the queue
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub command_list: usize,
    pub wait: Option<(usize, PipelineStage)>,
    pub signal: Option<usize>,
}

/// One binding group write, flattened for assertions
#[derive(Debug, Clone, PartialEq)]
pub struct BindingRecord {
    pub binding: u32,
    pub binding_type: BindingType,
    /// Label of the sampled texture, if any
    pub texture: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    pub textures: Vec<TextureInfo>,
    pub samplers: Vec<SamplerDesc>,
    pub buffers: Vec<BufferDesc>,
    pub shaders: Vec<PathBuf>,
    pub pipelines: Vec<PipelineDesc>,
    pub binding_groups: Vec<(String, Vec<BindingRecord>)>,
    pub command_lists_created: usize,
    pub semaphores_created: u32,
    pub submissions: Vec<SubmissionRecord>,
    pub wait_idle_calls: usize,
    /// Layout mismatches found while replaying submissions
    pub layout_errors: Vec<String>,
    pub fragment_programs: FxHashMap<String, FragmentProgram>,
    fail_on: Option<String>,
}

impl MockState {
    /// Binding records of the last binding group allocated against `layout_label`
    pub fn bindings_for(&self, layout_label: &str) -> Option<&Vec<BindingRecord>> {
        self.binding_groups
            .iter()
            .rev()
            .find(|(label, _)| label == layout_label)
            .map(|(_, records)| records)
    }

    /// Last pipeline created with `label`
    pub fn pipeline(&self, label: &str) -> Option<&PipelineDesc> {
        self.pipelines.iter().rev().find(|p| p.label == label)
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    state: Arc<Mutex<MockState>>,
    drops: DropLog,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            drops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle on the device state that outlives moving the device into an Arc
    pub fn probe(&self) -> Arc<Mutex<MockState>> {
        self.state.clone()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Released objects, in drop order
    pub fn drop_log(&self) -> DropLog {
        self.drops.clone()
    }

    /// Make the next call to `operation` (e.g. "create_pipeline") fail
    pub fn fail_next(&self, operation: &str) {
        self.state().fail_on = Some(operation.to_string());
    }

    /// Emulate the fragment shader `file_name` with `program` during submit
    pub fn set_fragment_program<F>(&self, file_name: &str, program: F)
    where
        F: Fn(&FragmentInputs) -> [f32; 4] + Send + Sync + 'static,
    {
        self.state()
            .fragment_programs
            .insert(file_name.to_string(), Arc::new(program));
    }

    fn check_failure(&self, operation: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_on.as_deref() == Some(operation) {
            state.fail_on = None;
            return Err(Error::BackendError(format!("mock {} failure", operation)));
        }
        Ok(())
    }

    fn execute(&self, commands: &[MockCommand]) {
        let programs = self.state().fragment_programs.clone();
        let mut layout_errors = Vec::new();
        let mut framebuffer: Option<Arc<dyn Framebuffer>> = None;
        let mut pipeline: Option<Arc<dyn Pipeline>> = None;
        let mut pass_inputs: Option<Arc<dyn BindingGroup>> = None;
        let mut push_constants = Vec::new();

        for command in commands {
            match command {
                MockCommand::BeginRenderPass { framebuffer: fb, clear_values } => {
                    let mock = mock_framebuffer(fb);
                    for (index, (texture, desc)) in mock.attachments().into_iter().enumerate() {
                        let texture = mock_texture(texture);
                        if desc.initial_layout != ImageLayout::Undefined
                            && texture.layout() != desc.initial_layout
                        {
                            layout_errors.push(format!(
                                "'{}' begins in {:?}, render pass expects {:?}",
                                texture.info.label,
                                texture.layout(),
                                desc.initial_layout
                            ));
                        }
                        if desc.load_op == LoadOp::Clear {
                            match clear_values.get(index) {
                                Some(ClearValue::Color(color)) => texture.fill(*color),
                                Some(ClearValue::DepthStencil { depth, .. }) => {
                                    texture.fill([*depth, 0.0, 0.0, 0.0])
                                }
                                None => layout_errors.push(format!(
                                    "'{}' cleared without a clear value",
                                    texture.info.label
                                )),
                            }
                        }
                    }
                    framebuffer = Some(fb.clone());
                }
                MockCommand::EndRenderPass => {
                    if let Some(fb) = framebuffer.take() {
                        for (texture, desc) in mock_framebuffer(&fb).attachments() {
                            mock_texture(texture).set_layout(desc.final_layout);
                        }
                    }
                }
                MockCommand::BindPipeline(p) => pipeline = Some(p.clone()),
                MockCommand::BindBindingGroup { set_index: 1, group } => {
                    pass_inputs = Some(group.clone())
                }
                MockCommand::PushConstants { data, .. } => push_constants = data.clone(),
                MockCommand::Draw { .. } => {
                    let (Some(fb), Some(p)) = (&framebuffer, &pipeline) else {
                        continue;
                    };
                    let Some(shader) = mock_pipeline(p).fragment_shader() else {
                        continue;
                    };
                    let Some(program) = programs.get(&shader.file_name()) else {
                        continue;
                    };
                    let sampled = pass_inputs
                        .as_ref()
                        .map(|g| {
                            mock_binding_group(g)
                                .sampled_textures()
                                .iter()
                                .map(|(_, t)| mock_texture(t).contents())
                                .collect()
                        })
                        .unwrap_or_default();
                    let output = program(&FragmentInputs {
                        sampled,
                        push_constants: push_constants.clone(),
                    });
                    for texture in &mock_framebuffer(fb).color_attachments {
                        mock_texture(texture).fill(output);
                    }
                }
                MockCommand::ImageBarrier { texture, old_layout, new_layout } => {
                    let texture = mock_texture(texture);
                    if *old_layout != ImageLayout::Undefined && texture.layout() != *old_layout {
                        layout_errors.push(format!(
                            "barrier on '{}' from {:?}, texture is in {:?}",
                            texture.info.label,
                            old_layout,
                            texture.layout()
                        ));
                    }
                    texture.set_layout(*new_layout);
                }
                MockCommand::CopyTexture { src, dst } => {
                    let (src, dst) = (mock_texture(src), mock_texture(dst));
                    if src.layout() != ImageLayout::TransferSrc {
                        layout_errors.push(format!("copy source '{}' in {:?}", src.info.label, src.layout()));
                    }
                    if dst.layout() != ImageLayout::TransferDst {
                        layout_errors.push(format!("copy destination '{}' in {:?}", dst.info.label, dst.layout()));
                    }
                    dst.fill(src.contents());
                }
                _ => {}
            }
        }

        self.state().layout_errors.extend(layout_errors);
    }

    fn build_texture(&self, desc: TextureDesc) -> Arc<dyn Texture> {
        self.state().textures.push(TextureInfo::from(&desc));
        Arc::new(MockTexture::new(&desc))
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        self.check_failure("create_texture")?;
        Ok(self.build_texture(desc))
    }

    fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>> {
        self.check_failure("create_sampler")?;
        self.state().samplers.push(desc);
        Ok(Arc::new(MockSampler { desc }))
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.check_failure("create_buffer")?;
        self.state().buffers.push(desc.clone());
        Ok(Arc::new(MockBuffer::new(desc)))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        self.check_failure("create_shader")?;
        self.state().shaders.push(desc.path.clone());
        Ok(Arc::new(MockShader {
            path: desc.path,
            stage: desc.stage,
            entry_point: desc.entry_point,
        }))
    }

    fn create_pipeline_cache(&self) -> Result<Arc<dyn PipelineCache>> {
        self.check_failure("create_pipeline_cache")?;
        Ok(Arc::new(MockPipelineCache))
    }

    fn create_binding_group_layout(
        &self,
        desc: BindingGroupLayoutDesc,
    ) -> Result<Arc<dyn BindingGroupLayout>> {
        self.check_failure("create_binding_group_layout")?;
        Ok(Arc::new(MockBindingGroupLayout { desc }))
    }

    fn create_pipeline_layout(&self, desc: PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        self.check_failure("create_pipeline_layout")?;
        Ok(Arc::new(MockPipelineLayout {
            set_layouts: desc.set_layouts,
            push_constant_ranges: desc.push_constant_ranges,
            drops: self.drops.clone(),
        }))
    }

    fn create_pipeline(&self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        self.check_failure("create_pipeline")?;
        desc.validate()?;
        self.state().pipelines.push(desc.clone());
        Ok(Arc::new(MockPipeline { desc, drops: self.drops.clone() }))
    }

    fn create_descriptor_pool(&self, desc: DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>> {
        self.check_failure("create_descriptor_pool")?;
        Ok(Arc::new(MockDescriptorPool {
            desc,
            allocated: Mutex::new(0),
            drops: self.drops.clone(),
        }))
    }

    fn create_binding_group(
        &self,
        pool: &Arc<dyn DescriptorPool>,
        layout: &Arc<dyn BindingGroupLayout>,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroup>> {
        self.check_failure("create_binding_group")?;
        validate_binding_writes(layout.desc(), writes).map_err(Error::InvalidResource)?;

        let pool = mock_pool(pool);
        let mut allocated = pool.allocated.lock().unwrap();
        if *allocated >= pool.desc.max_sets {
            return Err(Error::BackendError(format!(
                "descriptor pool exhausted ({} sets)",
                pool.desc.max_sets
            )));
        }
        *allocated += 1;

        let records = writes
            .iter()
            .map(|w| BindingRecord {
                binding: w.binding,
                binding_type: w.resource.binding_type(),
                texture: match &w.resource {
                    BindingResource::SampledTexture(texture, _) => Some(texture.info().label.clone()),
                    BindingResource::UniformBuffer(_) => None,
                },
            })
            .collect();
        self.state()
            .binding_groups
            .push((layout.desc().label.clone(), records));

        Ok(Arc::new(MockBindingGroup {
            layout: layout.clone(),
            writes: writes.to_vec(),
            drops: self.drops.clone(),
        }))
    }

    fn create_render_pass(&self, desc: RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        self.check_failure("create_render_pass")?;
        Ok(Arc::new(MockRenderPass { desc }))
    }

    fn create_framebuffer(&self, desc: FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        self.check_failure("create_framebuffer")?;

        let render_pass_desc = RenderPassDesc {
            color_attachments: desc.color_attachments.iter().map(|a| a.desc).collect(),
            depth_attachment: desc.depth_attachment.as_ref().map(|a| a.desc),
        };

        let resolve = |attachment: &FramebufferAttachment| -> Arc<dyn Texture> {
            match &attachment.source {
                AttachmentSource::Import(texture) => texture.clone(),
                AttachmentSource::Create { usage } => self.build_texture(TextureDesc {
                    label: attachment.label.clone(),
                    width: desc.width,
                    height: desc.height,
                    format: attachment.desc.format,
                    usage: *usage,
                    array_layers: desc.layers,
                    texture_type: desc.attachment_texture_type(),
                }),
            }
        };
        let color_attachments: Vec<Arc<dyn Texture>> =
            desc.color_attachments.iter().map(&resolve).collect();
        let depth_attachment = desc.depth_attachment.as_ref().map(&resolve);

        let sampler = match desc.sampler {
            Some(sampler_desc) => Some(self.create_sampler(sampler_desc)?),
            None => None,
        };

        Ok(Arc::new(MockFramebuffer {
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            render_pass: Arc::new(MockRenderPass { desc: render_pass_desc.clone() }),
            render_pass_desc,
            color_attachments,
            depth_attachment,
            sampler,
            drops: self.drops.clone(),
        }))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        self.check_failure("create_command_list")?;
        self.state().command_lists_created += 1;
        Ok(Box::new(MockCommandList::new()))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        self.check_failure("create_semaphore")?;
        let mut state = self.state();
        state.semaphores_created += 1;
        Ok(Arc::new(MockSemaphore { id: state.semaphores_created }))
    }

    fn submit(&self, submission: &Submission) -> Result<()> {
        self.check_failure("submit")?;
        self.state().submissions.push(SubmissionRecord {
            command_list: object_id(submission.command_list),
            wait: submission.wait.map(|(s, stage)| (object_id(s), stage)),
            signal: submission.signal.map(|s| object_id(s)),
        });
        self.execute(recorded_commands(submission.command_list));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.check_failure("wait_idle")?;
        self.state().wait_idle_calls += 1;
        Ok(())
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

/// Scripted swapchain behavior, shared with the test through `probe()`
#[derive(Default)]
pub struct SwapchainScript {
    /// Results returned by the next acquires (cycling indices once empty)
    pub acquire_results: VecDeque<Result<AcquiredImage>>,
    /// Results returned by the next presents (Ok(false) once empty)
    pub present_results: VecDeque<Result<bool>>,
    /// Image indices presented so far
    pub presented: Vec<u32>,
    /// Sizes passed to `recreate()`
    pub recreated: Vec<(u32, u32)>,
    /// Image count the next `recreate()` switches to
    pub image_count_on_recreate: Option<usize>,
    next_index: u32,
}

pub struct MockSwapchain {
    device: Arc<MockGraphicsDevice>,
    image_count: usize,
    width: u32,
    height: u32,
    render_pass: Arc<dyn RenderPass>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
    image_acquired: MockSemaphore,
    render_complete: MockSemaphore,
    script: Arc<Mutex<SwapchainScript>>,
}

impl MockSwapchain {
    pub fn new(device: Arc<MockGraphicsDevice>, image_count: usize, width: u32, height: u32) -> Result<Self> {
        let render_pass = device.create_render_pass(Self::render_pass_desc())?;
        let mut swapchain = Self {
            device,
            image_count,
            width,
            height,
            render_pass,
            framebuffers: Vec::new(),
            image_acquired: MockSemaphore { id: 1000 },
            render_complete: MockSemaphore { id: 1001 },
            script: Arc::new(Mutex::new(SwapchainScript::default())),
        };
        swapchain.build_framebuffers()?;
        Ok(swapchain)
    }

    pub fn probe(&self) -> Arc<Mutex<SwapchainScript>> {
        self.script.clone()
    }

    fn render_pass_desc() -> RenderPassDesc {
        RenderPassDesc {
            color_attachments: vec![AttachmentDesc {
                format: TextureFormat::B8G8R8A8_SRGB,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::PresentSrc,
            }],
            depth_attachment: None,
        }
    }

    fn build_framebuffers(&mut self) -> Result<()> {
        let attachment = Self::render_pass_desc().color_attachments[0];
        self.framebuffers = (0..self.image_count)
            .map(|i| {
                self.device.create_framebuffer(FramebufferDesc {
                    width: self.width,
                    height: self.height,
                    layers: 1,
                    layered: false,
                    color_attachments: vec![FramebufferAttachment::create(
                        &format!("swapchain_image_{}", i),
                        attachment,
                        TextureUsage::COLOR_ATTACHMENT,
                    )],
                    depth_attachment: None,
                    sampler: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, _timeout_ns: u64) -> Result<AcquiredImage> {
        let mut script = self.script.lock().unwrap();
        if let Some(result) = script.acquire_results.pop_front() {
            return result;
        }
        let image_index = script.next_index;
        script.next_index = (image_index + 1) % self.image_count as u32;
        Ok(AcquiredImage { image_index, suboptimal: false })
    }

    fn present(&mut self, image_index: u32) -> Result<bool> {
        let mut script = self.script.lock().unwrap();
        script.presented.push(image_index);
        script.present_results.pop_front().unwrap_or(Ok(false))
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        {
            let mut script = self.script.lock().unwrap();
            script.recreated.push((width, height));
            if let Some(count) = script.image_count_on_recreate.take() {
                self.image_count = count;
            }
            script.next_index = 0;
        }
        self.width = width;
        self.height = height;
        self.build_framebuffers()
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_SRGB
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn framebuffer(&self, image_index: usize) -> Option<&Arc<dyn Framebuffer>> {
        self.framebuffers.get(image_index)
    }

    fn image_acquired_semaphore(&self) -> &dyn Semaphore {
        &self.image_acquired
    }

    fn render_complete_semaphore(&self) -> &dyn Semaphore {
        &self.render_complete
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
