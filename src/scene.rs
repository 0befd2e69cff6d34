//! The retained scene: drawables, the programs they use and global lighting.

use crate::camera::Camera;
use crate::color::Color;
use crate::context::RenderContext;
use crate::device::{Capability, GraphicsDevice};
use crate::drawable::SharedDrawable;
use crate::light::DirectionalLight;
use crate::material::Material;
use crate::shader::ShaderProgram;
use glam::Vec3;
use std::rc::Rc;

/// An ordered set of drawables plus the lighting they are drawn under.
///
/// Drawables are drawn in insertion order. The scene also remembers every
/// distinct program used by a drawable's material so that camera and light
/// uniforms are uploaded once per program per frame rather than once per
/// drawable.
///
/// ```
/// use brazier::*;
/// use std::rc::Rc;
///
/// let (ctx, device) = RenderContext::headless();
/// let program = Rc::new(ShaderProgram::from_sources(&ctx, VS, FS));
/// let material = Rc::new(Material::new(&ctx, program));
/// let cube = Rc::new(Mesh::cube(&ctx, 1.0));
///
/// let mut scene = Scene::new(&ctx);
/// let drawable = Drawable::mesh3d(Some(material), vec![cube]).shared();
/// scene.add_drawable(&drawable);
/// scene.draw(&Camera::default(), None);
/// assert_eq!(device.draw_calls().len(), 1);
/// # const VS: &str = "@group(0) @binding(0) var<uniform> u_Model: mat4x4f;
/// # @vertex fn vs_main(@location(0) p: vec3f) -> @builtin(position) vec4f {
/// #     return u_Model * vec4f(p, 1.0);
/// # }";
/// # const FS: &str = "@fragment fn fs_main() -> @location(0) vec4f { return vec4f(1.0); }";
/// ```
pub struct Scene {
    device: Rc<dyn GraphicsDevice>,
    drawables: Vec<SharedDrawable>,
    programs: Vec<Rc<ShaderProgram>>,
    directional_light: DirectionalLight,
    /// Uploaded as `u_AmbientColor`.
    pub ambient_color: Vec3,
    pub clear_color: Color,
}

impl Scene {
    pub fn new(ctx: &RenderContext) -> Self {
        Self {
            device: Rc::clone(ctx.device()),
            drawables: Vec::new(),
            programs: Vec::new(),
            directional_light: DirectionalLight::default(),
            ambient_color: Vec3::new(0.2, 0.2, 0.4),
            clear_color: Color::BLACK,
        }
    }

    /// Adds a drawable unless it is already in the scene, and registers its
    /// material's program.
    pub fn add_drawable(&mut self, drawable: &SharedDrawable) {
        if self.contains(drawable) {
            return;
        }
        self.drawables.push(Rc::clone(drawable));

        let program = drawable
            .borrow()
            .material
            .as_ref()
            .map(|m| Rc::clone(m.program()));
        if let Some(program) = program {
            if !self.programs.iter().any(|p| Rc::ptr_eq(p, &program)) {
                self.programs.push(program);
            }
        }
    }

    /// Removes a drawable if present. Registered programs are kept.
    pub fn remove_drawable(&mut self, drawable: &SharedDrawable) {
        self.drawables.retain(|d| !Rc::ptr_eq(d, drawable));
    }

    pub fn contains(&self, drawable: &SharedDrawable) -> bool {
        self.drawables.iter().any(|d| Rc::ptr_eq(d, drawable))
    }

    pub fn drawables(&self) -> &[SharedDrawable] {
        &self.drawables
    }

    pub fn programs(&self) -> &[Rc<ShaderProgram>] {
        &self.programs
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    pub fn directional_light(&self) -> &DirectionalLight {
        &self.directional_light
    }

    pub fn directional_light_mut(&mut self) -> &mut DirectionalLight {
        &mut self.directional_light
    }

    fn setup_program(&self, program: &ShaderProgram, camera: &Camera) {
        program.apply_camera(camera);
        program.apply_directional_light(&self.directional_light);
        program.set_uniform("u_AmbientColor", self.ambient_color);
    }

    /// Clears the target and draws every drawable.
    ///
    /// With `material_override`, only its program receives camera and light
    /// uniforms and every drawable is drawn with it.
    pub fn draw(&self, camera: &Camera, material_override: Option<&Material>) {
        self.device.set_depth_write(true);
        self.device.set_capability(Capability::Blend, false);

        match material_override {
            Some(material) => self.setup_program(material.program(), camera),
            None => {
                for program in &self.programs {
                    self.setup_program(program, camera);
                }
            }
        }

        self.device.clear(self.clear_color);
        for drawable in &self.drawables {
            drawable.borrow().draw(material_override);
        }
    }
}
