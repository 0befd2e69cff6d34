//! # Brazier
//!
//! **A small retained-mode 3D renderer on wgpu.**
//!
//! Build a [`Scene`] out of [`Drawable`]s, give them [`Material`]s over WGSL
//! [`ShaderProgram`]s, point a [`Camera`] at it and draw. Uniforms are set by
//! name; the scene fills in camera, transform and lighting uniforms, and
//! materials own the rest.
//!
//! ## Quick Start
//!
//! ```no_run
//! use brazier::*;
//! use std::rc::Rc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     run(|ctx| {
//!         let material = Rc::new(Material::new(ctx, Rc::new(ShaderProgram::lit(ctx))));
//!         material.set_vec4("u_Color", Vec4::new(0.9, 0.3, 0.2, 1.0));
//!
//!         let cube = Drawable::mesh3d(Some(material), vec![Rc::new(Mesh::cube(ctx, 1.0))])
//!             .with_transform(Transform::from_position(Vec3::new(0.0, 0.0, -4.0)))
//!             .shared();
//!
//!         let mut scene = Scene::new(ctx);
//!         scene.add_drawable(&cube);
//!         let mut camera = Camera::default();
//!
//!         move |frame| {
//!             camera.aspect = frame.aspect();
//!             if let Some(t) = cube.borrow_mut().transform_mut() {
//!                 t.rotation.y += 90.0 * frame.dt;
//!             }
//!             scene.draw(&camera, None);
//!         }
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without a GPU
//!
//! Everything above the device goes through [`GraphicsDevice`]. A
//! [`RenderContext::headless`] context records commands on a
//! [`HeadlessDevice`] instead of rendering them, which is how the crate's own
//! tests inspect uniforms, texture units and draw calls.

mod app;
mod camera;
mod color;
mod context;
pub mod device;
mod drawable;
mod error;
mod geometry;
mod gpu;
mod import;
mod light;
mod logging;
mod material;
mod mesh;
mod reflect;
mod scene;
mod shader;
mod texture;
mod transform;

pub use app::{AppConfig, Frame, run, run_with_config};
pub use camera::{Camera, Projection};
pub use color::Color;
pub use context::RenderContext;
pub use device::{
    ActiveUniform, Capability, DeviceCommand, DrawCall, GeometryId, GraphicsDevice,
    HeadlessDevice, ProgramId, ShaderId, ShaderStage, TextureId, Topology, UniformType,
    UniformValue, WgpuDevice,
};
pub use drawable::{Drawable, DrawableKind, SharedDrawable};
pub use error::{GpuError, ImportError, ShaderError, TextureError};
pub use geometry::Geometry;
pub use gpu::GpuContext;
pub use import::import_file;
pub use light::DirectionalLight;
pub use logging::{LoggingConfig, init_logging};
pub use material::Material;
pub use mesh::{Mesh, Vertex3d};
pub use reflect::SAMPLER_SUFFIX;
pub use scene::Scene;
pub use shader::{
    LIT_FRAGMENT, LIT_VERTEX, RESERVED_UNIFORMS, Shader, ShaderProgram, UNLIT_FRAGMENT,
    UNLIT_VERTEX, is_reserved,
};
pub use texture::{FilterMode, Texture, TextureSettings, WrapMode};
pub use transform::Transform;

// Re-export glam math types for convenience
pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
