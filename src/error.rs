//! Error types for the rendering core.
//!
//! None of these are fatal to the process. Shader failures leave an unusable
//! handle behind, import failures are recovered with a fallback cube, and
//! texture failures are handed back to the caller.

use crate::device::ShaderStage;

/// A shader stage failed to compile or a program failed to link.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    /// The stage source was rejected by the WGSL front end or validator.
    #[error("{stage:?} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    /// The attached stages could not be combined into a program.
    #[error("shader program failed to link: {0}")]
    Link(String),
}

/// Errors raised while creating a texture.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to read texture: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("texture size {width}x{height} has no pixels")]
    EmptySize { width: u32, height: u32 },
    #[error("pixel data holds {actual} bytes, a {width}x{height} RGBA texture needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised while importing a scene file.
///
/// [`Mesh::load_from_file`](crate::Mesh::load_from_file) never returns these;
/// it logs them and substitutes a unit cube.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to import scene: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("failed to read STL: {0}")]
    Stl(#[source] std::io::Error),
    #[error("scene contains no meshes")]
    Empty,
    #[error("primitive is missing its {0} attribute")]
    MissingAttribute(&'static str),
    #[error("{attribute} has {actual} entries, POSITION has {expected}")]
    AttributeCount {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("index {index} is out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
    #[error("unsupported primitive mode {0:?}")]
    UnsupportedMode(gltf::mesh::Mode),
}

/// Errors raised while bootstrapping the GPU.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}
