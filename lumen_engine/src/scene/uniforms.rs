//! GPU-visible uniform blocks.
//!
//! Layouts are std140-compatible: every field is 16-byte aligned.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use crate::error::{Error, Result};

/// Number of shadow-casting lights (and shadow map layers)
pub const MAX_SHADOW_LIGHTS: usize = 4;

/// One shadow-casting light
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    /// Light-space projection * view, used for the shadow layer
    pub view_projection: Mat4,
    /// World-space position (w = 1)
    pub position: Vec4,
    /// Linear color (w = intensity)
    pub color: Vec4,
}

impl LightUniform {
    /// Spot light at `position` looking at `target`
    pub fn spot(position: Vec3, target: Vec3, color: Vec3, intensity: f32, fov_y: f32, near: f32, far: f32) -> Self {
        let direction = (target - position).normalize_or_zero();
        let up = if direction.abs_diff_eq(Vec3::Y, 1e-4) || direction.abs_diff_eq(-Vec3::Y, 1e-4) {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(position, target, up);
        let projection = Mat4::perspective_rh(fov_y, 1.0, near, far);
        Self {
            view_projection: projection * view,
            position: position.extend(1.0),
            color: color.extend(intensity),
        }
    }
}

/// Scene-wide uniform block, bound at set 0 binding 0 by every pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    /// World-space camera position (w = 1)
    pub camera_position: Vec4,
    pub light_count: u32,
    pub _pad: [u32; 3],
    pub lights: [LightUniform; MAX_SHADOW_LIGHTS],
}

impl SceneUniforms {
    pub const SIZE: u64 = std::mem::size_of::<SceneUniforms>() as u64;

    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        Self {
            view,
            projection,
            camera_position: camera_position.extend(1.0),
            ..Self::zeroed()
        }
    }

    /// Append a shadow-casting light
    pub fn add_light(&mut self, light: LightUniform) -> Result<()> {
        let index = self.light_count as usize;
        if index >= MAX_SHADOW_LIGHTS {
            return Err(Error::InvalidResource(format!(
                "at most {} shadow-casting lights",
                MAX_SHADOW_LIGHTS
            )));
        }
        self.lights[index] = light;
        self.light_count += 1;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

/// Per-mesh uniform block, bound at set 1 binding 0 by mesh-drawing passes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshUniforms {
    pub model: Mat4,
    /// Linear albedo (w unused)
    pub albedo: Vec4,
    /// x = metallic, y = roughness, z = ambient occlusion
    pub material: Vec4,
}

impl MeshUniforms {
    pub const SIZE: u64 = std::mem::size_of::<MeshUniforms>() as u64;

    pub fn new(model: Mat4, albedo: Vec3, metallic: f32, roughness: f32, ambient_occlusion: f32) -> Self {
        Self {
            model,
            albedo: albedo.extend(1.0),
            material: Vec4::new(metallic, roughness, ambient_occlusion, 0.0),
        }
    }
}

impl Default for MeshUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Vec3::ONE, 0.0, 0.5, 1.0)
    }
}
