//! Drawable meshes.
//!
//! A `SceneMesh` owns its GPU buffers and knows how to record its own draw.
//! Mesh-drawing passes bind the mesh's binding group at set 1 and then
//! call `draw()`; they never look at the vertex data themselves.

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferFormat, BufferUsage, CommandList, GraphicsDevice, IndexType,
    VertexAttribute, VertexBinding, VertexInputRate, VertexLayout,
};

// ============================================================================
// VERTEX FORMAT
// ============================================================================

/// Vertex format shared by every mesh-drawing pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub const STRIDE: u32 = std::mem::size_of::<MeshVertex>() as u32;

    /// Vertex input layout matching this struct (binding 0, locations 0..=2)
    pub fn layout() -> VertexLayout {
        VertexLayout {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: Self::STRIDE,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes: vec![
                VertexAttribute { location: 0, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 12 },
                VertexAttribute { location: 2, binding: 0, format: BufferFormat::R32G32_SFLOAT, offset: 24 },
            ],
        }
    }
}

// ============================================================================
// SCENE MESH
// ============================================================================

/// Anything a mesh-drawing pass can draw
pub trait SceneMesh: Send + Sync {
    /// Record the buffer binds and the draw call
    ///
    /// Called inside a render pass, with the pipeline and set 0/1 bound.
    fn draw(&self, command_list: &mut dyn CommandList) -> Result<()>;

    /// Number of indices drawn by `draw()`
    fn index_count(&self) -> u32;
}

/// Indexed triangle mesh with its own vertex and index buffers
pub struct Mesh {
    label: String,
    vertex_buffer: Arc<dyn Buffer>,
    index_buffer: Arc<dyn Buffer>,
    index_count: u32,
}

impl Mesh {
    /// Upload `vertices` and `indices` into new GPU buffers
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        vertices: &[MeshVertex],
        indices: &[u32],
    ) -> Result<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(Error::InvalidResource(format!("mesh '{}' has no geometry", label)));
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(Error::InvalidResource(format!(
                "mesh '{}': index {} out of range ({} vertices)",
                label,
                bad,
                vertices.len()
            )));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_buffer = device.create_buffer(BufferDesc {
            label: format!("{}_vertices", label),
            size: vertex_bytes.len() as u64,
            usage: BufferUsage::Vertex,
        })?;
        vertex_buffer.update(0, vertex_bytes)?;

        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let index_buffer = device.create_buffer(BufferDesc {
            label: format!("{}_indices", label),
            size: index_bytes.len() as u64,
            usage: BufferUsage::Index,
        })?;
        index_buffer.update(0, index_bytes)?;

        Ok(Self {
            label: label.to_string(),
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Axis-aligned cube centered on the origin, 24 vertices with face normals
    pub fn cube(device: &dyn GraphicsDevice, label: &str, half_extent: f32) -> Result<Self> {
        let (vertices, indices) = cube_geometry(half_extent);
        Self::new(device, label, &vertices, &indices)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl SceneMesh for Mesh {
    fn draw(&self, command_list: &mut dyn CommandList) -> Result<()> {
        command_list.bind_vertex_buffer(&self.vertex_buffer, 0)?;
        command_list.bind_index_buffer(&self.index_buffer, 0, IndexType::U32)?;
        command_list.draw_indexed(self.index_count, 1, 0, 0, 0)
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Cube vertices and counter-clockwise indices
pub fn cube_geometry(half_extent: f32) -> (Vec<MeshVertex>, Vec<u32>) {
    let h = half_extent;
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                (normal[0] + su * u[0] + sv * v[0]) * h,
                (normal[1] + su * u[1] + sv * v[1]) * h,
                (normal[2] + su * u[2] + sv * v[2]) * h,
            ];
            vertices.push(MeshVertex {
                position,
                normal,
                uv: [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}
