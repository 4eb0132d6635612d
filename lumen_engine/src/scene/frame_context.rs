//! Frame context: the scene data every pass reads.
//!
//! Holds the scene-wide uniform buffer and binding group (set 0), the
//! per-mesh binding group layout (set 1), and the ordered mesh list with
//! one binding group per mesh. Passes receive it explicitly when they
//! record; nothing here is global.
//!
//! Command lists are recorded once, so meshes added after the passes are
//! initialized are only drawn once the passes are initialized again.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingResource, BindingSlotDesc,
    BindingWrite, Buffer, BufferDesc, BufferUsage, DescriptorPool, DescriptorPoolDesc,
    GraphicsDevice, ShaderStageFlags,
};
use crate::scene::{MeshUniforms, SceneMesh, SceneUniforms};

/// A mesh and its per-mesh resources
pub struct SceneEntry {
    pub mesh: Arc<dyn SceneMesh>,
    pub uniforms: Arc<dyn Buffer>,
    pub binding_group: Arc<dyn BindingGroup>,
}

pub struct FrameContext {
    scene_layout: Arc<dyn BindingGroupLayout>,
    mesh_layout: Arc<dyn BindingGroupLayout>,
    /// Holds the scene group and one group per mesh
    pool: Arc<dyn DescriptorPool>,
    scene_buffer: Arc<dyn Buffer>,
    scene_group: Arc<dyn BindingGroup>,
    entries: Vec<SceneEntry>,
    max_meshes: u32,
}

impl FrameContext {
    /// Create the scene-wide resources for up to `max_meshes` meshes
    pub fn new(device: &dyn GraphicsDevice, max_meshes: u32) -> Result<Self> {
        let scene_layout = device.create_binding_group_layout(BindingGroupLayoutDesc {
            label: "scene".to_string(),
            entries: vec![BindingSlotDesc::uniform_buffer(
                0,
                ShaderStageFlags::VERTEX | ShaderStageFlags::GEOMETRY | ShaderStageFlags::FRAGMENT,
            )],
        })?;
        let mesh_layout = device.create_binding_group_layout(BindingGroupLayoutDesc {
            label: "mesh".to_string(),
            entries: vec![BindingSlotDesc::uniform_buffer(
                0,
                ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
            )],
        })?;

        let scene_pool = DescriptorPoolDesc::repeated(scene_layout.desc(), 1);
        let mesh_pool = DescriptorPoolDesc::repeated(mesh_layout.desc(), max_meshes);
        let pool = device.create_descriptor_pool(DescriptorPoolDesc {
            max_sets: scene_pool.max_sets + mesh_pool.max_sets,
            uniform_buffers: scene_pool.uniform_buffers + mesh_pool.uniform_buffers,
            combined_image_samplers: 0,
        })?;

        let scene_buffer = device.create_buffer(BufferDesc {
            label: "scene_uniforms".to_string(),
            size: SceneUniforms::SIZE,
            usage: BufferUsage::Uniform,
        })?;
        scene_buffer.update(0, SceneUniforms::default().as_bytes())?;

        let scene_group = device.create_binding_group(
            &pool,
            &scene_layout,
            &[BindingWrite { binding: 0, resource: BindingResource::UniformBuffer(scene_buffer.clone()) }],
        )?;

        Ok(Self {
            scene_layout,
            mesh_layout,
            pool,
            scene_buffer,
            scene_group,
            entries: Vec::new(),
            max_meshes,
        })
    }

    /// Append a mesh with its per-mesh uniforms; returns its index
    pub fn add_mesh(
        &mut self,
        device: &dyn GraphicsDevice,
        mesh: Arc<dyn SceneMesh>,
        uniforms: MeshUniforms,
    ) -> Result<usize> {
        if self.entries.len() as u32 >= self.max_meshes {
            return Err(Error::InvalidResource(format!(
                "frame context holds at most {} meshes",
                self.max_meshes
            )));
        }

        let index = self.entries.len();
        let buffer = device.create_buffer(BufferDesc {
            label: format!("mesh_uniforms_{}", index),
            size: MeshUniforms::SIZE,
            usage: BufferUsage::Uniform,
        })?;
        buffer.update(0, bytemuck::bytes_of(&uniforms))?;

        let binding_group = device.create_binding_group(
            &self.pool,
            &self.mesh_layout,
            &[BindingWrite { binding: 0, resource: BindingResource::UniformBuffer(buffer.clone()) }],
        )?;

        self.entries.push(SceneEntry { mesh, uniforms: buffer, binding_group });
        Ok(index)
    }

    /// Write the scene-wide uniforms read by every pass this frame
    pub fn update_uniforms(&self, uniforms: &SceneUniforms) -> Result<()> {
        self.scene_buffer.update(0, uniforms.as_bytes())
    }

    /// Rewrite the per-mesh uniforms of mesh `index`
    pub fn update_mesh(&self, index: usize, uniforms: &MeshUniforms) -> Result<()> {
        let entry = self.entries.get(index).ok_or_else(|| {
            Error::InvalidResource(format!("no mesh at index {}", index))
        })?;
        entry.uniforms.update(0, bytemuck::bytes_of(uniforms))
    }

    pub fn scene_layout(&self) -> &Arc<dyn BindingGroupLayout> {
        &self.scene_layout
    }

    pub fn mesh_layout(&self) -> &Arc<dyn BindingGroupLayout> {
        &self.mesh_layout
    }

    pub fn scene_group(&self) -> &Arc<dyn BindingGroup> {
        &self.scene_group
    }

    pub fn scene_buffer(&self) -> &Arc<dyn Buffer> {
        &self.scene_buffer
    }

    /// Meshes in draw order
    pub fn entries(&self) -> &[SceneEntry] {
        &self.entries
    }

    pub fn mesh_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "frame_context_tests.rs"]
mod tests;
