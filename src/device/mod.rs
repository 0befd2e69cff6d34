//! The GPU command interface.
//!
//! Everything above this module (shaders, textures, meshes, materials and the
//! scene) talks to the GPU through [`GraphicsDevice`]. Two implementations
//! ship with the crate:
//!
//! - [`WgpuDevice`] renders through wgpu into a window surface or any
//!   texture view.
//! - [`HeadlessDevice`] records every command and keeps enough state to
//!   inspect uniforms, bound textures and draw calls without a GPU.
//!
//! The interface is modelled on a classic immediate-state API: a program is
//! made current, named uniforms are set on it, textures are bound to numbered
//! units and indexed draws pick up whatever state is current at the time.
//! Methods take `&self`; implementations keep their state behind interior
//! mutability so a single device can be shared as `Rc<dyn GraphicsDevice>`
//! by every resource created on it.

mod headless;
mod mipmaps;
mod wgpu_device;

pub use headless::{DeviceCommand, DrawCall, HeadlessDevice};
pub use wgpu_device::WgpuDevice;

use crate::color::Color;
use crate::error::ShaderError;
use crate::mesh::Vertex3d;
use crate::texture::TextureSettings;
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw numeric value, unique per device.
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

resource_id!(
    /// Handle to one compiled shader stage.
    ShaderId
);
resource_id!(
    /// Handle to one linked shader program.
    ProgramId
);
resource_id!(
    /// Handle to one GPU image.
    TextureId
);
resource_id!(
    /// Handle to one vertex/index buffer pair.
    GeometryId
);

/// Pipeline stage a shader source is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

/// How the indices of a geometry are assembled into primitives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    #[default]
    TriangleList,
    LineList,
}

/// Fixed-function state toggled by [`GraphicsDevice::set_capability`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    DepthTest,
    CullFace,
    Blend,
}

/// Type of an active uniform as reported by a linked program.
///
/// `Sampler2D` covers texture globals; its value is the texture unit the
/// texture is read from, set with [`UniformValue::Int`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformType {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
}

impl UniformType {
    /// Size in bytes of the uniform buffer backing a value of this type.
    ///
    /// `mat3x3f` columns are padded to 16 bytes. Textures have no buffer.
    pub fn byte_size(self) -> u64 {
        match self {
            UniformType::Int | UniformType::Float => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
            UniformType::Sampler2D => 0,
        }
    }
}

/// One uniform a linked program exposes to the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub ty: UniformType,
    pub group: u32,
    pub binding: u32,
}

/// A value uploaded to a named uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Whether this value may be stored in a uniform of type `ty`.
    pub fn fits(&self, ty: UniformType) -> bool {
        match (self, ty) {
            (UniformValue::Int(_), UniformType::Sampler2D) => true,
            _ => self.ty() == ty,
        }
    }

    /// Appends the value in WGSL uniform layout.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            UniformValue::Int(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Float(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => out.extend_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec3(v) => out.extend_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => out.extend_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Mat3(m) => {
                for col in [m.x_axis, m.y_axis, m.z_axis] {
                    out.extend_from_slice(bytemuck::cast_slice(&col.extend(0.0).to_array()));
                }
            }
            UniformValue::Mat4(m) => {
                out.extend_from_slice(bytemuck::cast_slice(&m.to_cols_array()))
            }
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Size, mip chain and sampling state of a texture to create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    /// Number of mip levels, the base image included.
    pub mip_level_count: u32,
    pub settings: TextureSettings,
}

impl TextureDescriptor {
    /// A descriptor with a full mip chain when `settings.mipmaps` is set and
    /// a single level otherwise.
    pub fn new(width: u32, height: u32, settings: TextureSettings) -> Self {
        let mip_level_count = if settings.mipmaps {
            mip_levels(width, height)
        } else {
            1
        };
        Self {
            width,
            height,
            mip_level_count,
            settings,
        }
    }
}

/// Levels needed to halve the largest side down to one pixel.
pub fn mip_levels(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Abstraction over the GPU used by every resource wrapper.
///
/// Creation methods that can fail on bad input (`create_shader`,
/// `create_program`) still hand back a handle alongside the result. The
/// handle must be deleted like any other; using a failed handle is a
/// silent no-op.
pub trait GraphicsDevice {
    /// Compiles one shader stage from WGSL source.
    fn create_shader(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> (ShaderId, Result<(), ShaderError>);

    fn delete_shader(&self, shader: ShaderId);

    /// Links compiled stages into a program.
    ///
    /// The program keeps its own copy of the linked code, so the stages may be
    /// deleted right after.
    fn create_program(&self, shaders: &[ShaderId]) -> (ProgramId, Result<(), ShaderError>);

    fn delete_program(&self, program: ProgramId);

    /// Uniforms and textures the program declares, sorted by group and
    /// binding. Empty for a program that failed to link.
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform>;

    /// Makes `program` current for subsequent draws.
    fn use_program(&self, program: ProgramId);

    /// Stores a uniform value on `program`.
    ///
    /// Unknown names and values of the wrong type are ignored.
    fn set_uniform(&self, program: ProgramId, name: &str, value: UniformValue);

    /// Creates a 2D RGBA8 texture from `pixels` (row-major, top row first,
    /// `width * height * 4` bytes).
    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> TextureId;

    fn delete_texture(&self, texture: TextureId);

    /// Binds `texture` to the numbered texture unit.
    fn bind_texture(&self, unit: u32, texture: TextureId);

    /// Uploads interleaved vertices and 32-bit indices.
    fn create_geometry(&self, vertices: &[Vertex3d], indices: &[u32]) -> GeometryId;

    fn delete_geometry(&self, geometry: GeometryId);

    /// Draws the first `index_count` indices of `geometry` with the current
    /// program, uniforms, texture units and capabilities.
    fn draw_indexed(&self, geometry: GeometryId, topology: Topology, index_count: u32);

    fn set_capability(&self, capability: Capability, enabled: bool);

    fn set_depth_write(&self, enabled: bool);

    /// Clears color to `color` and depth to the far plane.
    fn clear(&self, color: Color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat3_columns_are_padded() {
        let mut bytes = Vec::new();
        UniformValue::Mat3(Mat3::IDENTITY).write_bytes(&mut bytes);
        assert_eq!(bytes.len() as u64, UniformType::Mat3.byte_size());

        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(&floats[0..4], &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&floats[4..8], &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(&floats[8..12], &[0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn value_sizes_match_types() {
        let values = [
            UniformValue::Int(3),
            UniformValue::Float(1.5),
            UniformValue::Vec2(Vec2::ONE),
            UniformValue::Vec3(Vec3::ONE),
            UniformValue::Vec4(Vec4::ONE),
            UniformValue::Mat4(Mat4::IDENTITY),
        ];
        for value in values {
            let mut bytes = Vec::new();
            value.write_bytes(&mut bytes);
            assert_eq!(bytes.len() as u64, value.ty().byte_size(), "{value:?}");
        }
    }

    #[test]
    fn mip_levels_halve_to_one_pixel() {
        assert_eq!(mip_levels(1, 1), 1);
        assert_eq!(mip_levels(2, 1), 2);
        assert_eq!(mip_levels(1024, 16), 11);
        assert_eq!(mip_levels(0, 0), 1);

        let settings = TextureSettings::default().mipmaps(false);
        assert_eq!(TextureDescriptor::new(64, 64, settings).mip_level_count, 1);
    }

    #[test]
    fn int_fits_texture_uniform() {
        assert!(UniformValue::Int(2).fits(UniformType::Sampler2D));
        assert!(!UniformValue::Float(2.0).fits(UniformType::Sampler2D));
        assert!(!UniformValue::Vec3(Vec3::ONE).fits(UniformType::Vec4));
    }
}
