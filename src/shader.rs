//! Shader stages and linked shader programs.
//!
//! Shaders are written in WGSL. A [`Shader`] is one compiled stage; a
//! [`ShaderProgram`] links one vertex and one fragment stage and is the unit
//! that uniforms are set on and draws are issued with.
//!
//! Compile and link failures are logged and leave a handle that draws
//! nothing. They are never fatal.
//!
//! # Uniform conventions
//!
//! Each uniform is its own module-scope binding so that it can be addressed by
//! name:
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> u_Model: mat4x4f;
//! @group(0) @binding(1) var<uniform> u_View: mat4x4f;
//! @group(1) @binding(0) var<uniform> u_Color: vec4f;
//! @group(1) @binding(1) var u_Texture: texture_2d<f32>;
//! @group(1) @binding(2) var u_Texture_sampler: sampler;
//! ```
//!
//! The scene and drawables fill in the names listed in [`RESERVED_UNIFORMS`];
//! materials own everything else.

use crate::camera::Camera;
use crate::context::RenderContext;
use crate::device::{ActiveUniform, GraphicsDevice, ProgramId, ShaderId, ShaderStage, UniformValue};
use crate::error::ShaderError;
use crate::light::DirectionalLight;
use crate::transform::Transform;
use std::path::Path;
use std::rc::Rc;

/// Uniform names set by the renderer itself rather than by materials.
pub const RESERVED_UNIFORMS: [&str; 10] = [
    "u_Model",
    "u_Rotation",
    "u_View",
    "u_Projection",
    "u_ViewPosition",
    "u_ViewInverseRotation",
    "u_AmbientColor",
    "u_LightDirection",
    "u_LightColor",
    "u_LightMap",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_UNIFORMS.contains(&name)
}

/// Blinn-Phong vertex stage: `u_Model`, `u_View`, `u_Projection`, `u_Rotation`.
pub const LIT_VERTEX: &str = include_str!("shaders/lit.vert.wgsl");
/// Blinn-Phong fragment stage. Material inputs are `u_Color`, `u_Shininess`
/// (0 disables highlights) and `u_Texture`.
pub const LIT_FRAGMENT: &str = include_str!("shaders/lit.frag.wgsl");
pub const UNLIT_VERTEX: &str = include_str!("shaders/unlit.vert.wgsl");
/// Flat `u_Color`.
pub const UNLIT_FRAGMENT: &str = include_str!("shaders/unlit.frag.wgsl");

/// One compiled shader stage.
pub struct Shader {
    device: Rc<dyn GraphicsDevice>,
    id: ShaderId,
    stage: ShaderStage,
    error: Option<ShaderError>,
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("error", &self.error)
            .finish()
    }
}

impl Shader {
    /// Compiles `source` as a `stage` shader.
    ///
    /// On failure the compiler output is logged and the shader is left
    /// uncompiled; linking it into a program fails.
    pub fn new(ctx: &RenderContext, stage: ShaderStage, source: &str) -> Self {
        let device = Rc::clone(ctx.device());
        let (id, result) = device.create_shader(stage, source);
        let error = result.err();
        match &error {
            Some(e) => log::error!("{e}"),
            None => log::debug!("compiled {stage:?} shader {id:?}"),
        }
        Self {
            device,
            id,
            stage,
            error,
        }
    }

    /// Reads a WGSL file and compiles it.
    pub fn load_from_file(
        ctx: &RenderContext,
        path: impl AsRef<Path>,
        stage: ShaderStage,
    ) -> std::io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::new(ctx, stage, &source))
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn is_compiled(&self) -> bool {
        self.error.is_none()
    }

    /// The compile error, if compilation failed.
    pub fn error(&self) -> Option<&ShaderError> {
        self.error.as_ref()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.device.delete_shader(self.id);
    }
}

/// A linked shader program.
///
/// Programs are shared between materials and the scene as
/// `Rc<ShaderProgram>`; the GPU program is released with the last
/// reference.
pub struct ShaderProgram {
    device: Rc<dyn GraphicsDevice>,
    id: ProgramId,
    error: Option<ShaderError>,
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("id", &self.id)
            .field("error", &self.error)
            .finish()
    }
}

impl ShaderProgram {
    /// Links the given stages.
    ///
    /// The stages can be dropped afterwards; the program keeps what it needs.
    pub fn new(ctx: &RenderContext, shaders: &[&Shader]) -> Self {
        let device = Rc::clone(ctx.device());
        let ids: Vec<ShaderId> = shaders.iter().map(|s| s.id).collect();
        let (id, result) = device.create_program(&ids);
        let error = result.err();
        match &error {
            Some(e) => log::error!("{e}"),
            None => log::debug!("linked program {id:?} from {} stage(s)", ids.len()),
        }
        Self { device, id, error }
    }

    /// Compiles a vertex and a fragment stage and links them.
    pub fn from_sources(ctx: &RenderContext, vertex: &str, fragment: &str) -> Self {
        let vs = Shader::new(ctx, ShaderStage::Vertex, vertex);
        let fs = Shader::new(ctx, ShaderStage::Fragment, fragment);
        Self::new(ctx, &[&vs, &fs])
    }

    /// The bundled lit program ([`LIT_VERTEX`] and [`LIT_FRAGMENT`]).
    pub fn lit(ctx: &RenderContext) -> Self {
        Self::from_sources(ctx, LIT_VERTEX, LIT_FRAGMENT)
    }

    /// The bundled flat-color program.
    pub fn unlit(ctx: &RenderContext) -> Self {
        Self::from_sources(ctx, UNLIT_VERTEX, UNLIT_FRAGMENT)
    }

    /// Reads and links a vertex and a fragment WGSL file.
    pub fn load_from_files(
        ctx: &RenderContext,
        vertex: impl AsRef<Path>,
        fragment: impl AsRef<Path>,
    ) -> std::io::Result<Self> {
        let vs = Shader::load_from_file(ctx, vertex, ShaderStage::Vertex)?;
        let fs = Shader::load_from_file(ctx, fragment, ShaderStage::Fragment)?;
        Ok(Self::new(ctx, &[&vs, &fs]))
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub(crate) fn device(&self) -> &Rc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn is_linked(&self) -> bool {
        self.error.is_none()
    }

    /// The compile or link error, if linking failed.
    pub fn error(&self) -> Option<&ShaderError> {
        self.error.as_ref()
    }

    /// Uniforms and textures the program declares.
    pub fn active_uniforms(&self) -> Vec<ActiveUniform> {
        self.device.active_uniforms(self.id)
    }

    /// Makes this program current for subsequent draws.
    pub fn use_program(&self) {
        self.device.use_program(self.id);
    }

    /// Sets a uniform by name, making the program current first.
    ///
    /// Names the program does not declare are ignored.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) {
        self.use_program();
        self.device.set_uniform(self.id, name, value.into());
    }

    /// Uploads `u_Model` and `u_Rotation`.
    pub fn apply_transform(&self, transform: &Transform) {
        self.set_uniform("u_Model", transform.model_matrix());
        self.set_uniform("u_Rotation", transform.rotation_matrix());
    }

    /// Uploads `u_View`, `u_Projection`, `u_ViewPosition` and
    /// `u_ViewInverseRotation`.
    pub fn apply_camera(&self, camera: &Camera) {
        self.set_uniform("u_View", camera.view_matrix());
        self.set_uniform("u_Projection", camera.projection_matrix());
        self.set_uniform("u_ViewPosition", camera.position());
        self.set_uniform(
            "u_ViewInverseRotation",
            camera.transform.inverse_rotation_matrix(),
        );
    }

    /// Uploads `u_LightDirection` and `u_LightColor`.
    pub fn apply_directional_light(&self, light: &DirectionalLight) {
        self.set_uniform("u_LightDirection", light.direction());
        self.set_uniform("u_LightColor", light.color);
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        log::debug!("deleting program {:?}", self.id);
        self.device.delete_program(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCommand;
    use crate::reflect::tests::{FRAGMENT, VERTEX};
    use glam::{Mat4, Vec3};

    #[test]
    fn from_sources_links_and_releases_stages() {
        let (ctx, device) = RenderContext::headless();
        let program = ShaderProgram::from_sources(&ctx, VERTEX, FRAGMENT);
        assert!(program.is_linked());
        assert_eq!(device.live_shaders(), 0);
        assert_eq!(device.live_programs(), 1);
        drop(program);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn compile_failure_is_not_fatal() {
        let (ctx, device) = RenderContext::headless();
        let bad = Shader::new(&ctx, ShaderStage::Fragment, "this is not wgsl");
        assert!(!bad.is_compiled());
        assert!(matches!(bad.error(), Some(ShaderError::Compile { .. })));

        let vs = Shader::new(&ctx, ShaderStage::Vertex, VERTEX);
        let program = ShaderProgram::new(&ctx, &[&vs, &bad]);
        assert!(!program.is_linked());
        assert!(matches!(program.error(), Some(ShaderError::Link(_))));
        assert!(program.active_uniforms().is_empty());

        drop((vs, bad, program));
        assert_eq!(device.live_shaders(), 0);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn set_uniform_binds_program_first() {
        let (ctx, device) = RenderContext::headless();
        let program = ShaderProgram::from_sources(&ctx, VERTEX, FRAGMENT);
        device.take_commands();

        program.set_uniform("u_Shininess", 8.0f32);
        let commands = device.take_commands();
        assert_eq!(commands[0], DeviceCommand::UseProgram(program.id()));
        assert_eq!(
            device.uniform(program.id(), "u_Shininess"),
            Some(UniformValue::Float(8.0))
        );

        program.set_uniform("u_NotDeclared", 1.0f32);
        assert_eq!(device.uniform(program.id(), "u_NotDeclared"), None);
    }

    #[test]
    fn apply_helpers_fill_reserved_uniforms() {
        let (ctx, device) = RenderContext::headless();
        let program = ShaderProgram::from_sources(&ctx, VERTEX, FRAGMENT);
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        program.apply_transform(&transform);
        program.apply_directional_light(&DirectionalLight::new(Vec3::new(1.0, 0.5, 0.25)));

        assert_eq!(
            device.uniform(program.id(), "u_Model"),
            Some(UniformValue::Mat4(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))))
        );
        assert_eq!(
            device.uniform(program.id(), "u_LightColor"),
            Some(UniformValue::Vec3(Vec3::new(1.0, 0.5, 0.25)))
        );
        assert_eq!(
            device.uniform(program.id(), "u_LightDirection"),
            Some(UniformValue::Vec3(Vec3::NEG_Z))
        );
    }

    #[test]
    fn bundled_programs_link() {
        let (ctx, _device) = RenderContext::headless();
        let lit = ShaderProgram::lit(&ctx);
        assert!(lit.is_linked(), "{:?}", lit.error());
        let names: Vec<_> = lit.active_uniforms().into_iter().map(|u| u.name).collect();
        for name in ["u_Model", "u_Rotation", "u_Color", "u_Texture", "u_LightDirection"] {
            assert!(names.iter().any(|n| n == name), "{name} missing");
        }

        let unlit = ShaderProgram::unlit(&ctx);
        assert!(unlit.is_linked(), "{:?}", unlit.error());
        assert_eq!(unlit.active_uniforms().len(), 4);
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved("u_LightMap"));
        assert!(!is_reserved("u_Color"));
    }
}
