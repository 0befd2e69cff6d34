//! Materials: a shader program plus the values of its uniforms.

use crate::context::RenderContext;
use crate::device::{Capability, UniformType, UniformValue};
use crate::shader::{ShaderProgram, is_reserved};
use crate::texture::Texture;
use glam::{Vec2, Vec3, Vec4};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Default)]
struct Uniforms {
    ints: BTreeMap<String, i32>,
    floats: BTreeMap<String, f32>,
    vec2s: BTreeMap<String, Vec2>,
    vec3s: BTreeMap<String, Vec3>,
    vec4s: BTreeMap<String, Vec4>,
    textures: BTreeMap<String, Rc<Texture>>,
}

/// A shader program together with values for its non-reserved uniforms.
///
/// On construction every uniform the program declares gets a default:
///
/// | Type        | Default                              |
/// |-------------|--------------------------------------|
/// | `i32`       | `0`                                  |
/// | `f32`       | `0.0`                                |
/// | `vec2f`     | `(0, 0)`                             |
/// | `vec3f`     | `(1, 1, 1)`                          |
/// | `vec4f`     | `(1, 1, 1, 1)`                       |
/// | texture     | the context's 1×1 white texture      |
///
/// Names in [`RESERVED_UNIFORMS`](crate::RESERVED_UNIFORMS) are never stored;
/// they belong to the scene, camera and transforms. Matrices have no
/// material slot.
///
/// Materials are shared between drawables as `Rc<Material>`, so the setters
/// take `&self`.
pub struct Material {
    program: Rc<ShaderProgram>,
    uniforms: RefCell<Uniforms>,
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("program", &self.program.id())
            .finish_non_exhaustive()
    }
}

impl Material {
    pub fn new(ctx: &RenderContext, program: Rc<ShaderProgram>) -> Self {
        let mut uniforms = Uniforms::default();
        for uniform in program.active_uniforms() {
            if is_reserved(&uniform.name) {
                continue;
            }
            let name = uniform.name;
            match uniform.ty {
                UniformType::Int => {
                    uniforms.ints.insert(name, 0);
                }
                UniformType::Float => {
                    uniforms.floats.insert(name, 0.0);
                }
                UniformType::Vec2 => {
                    uniforms.vec2s.insert(name, Vec2::ZERO);
                }
                UniformType::Vec3 => {
                    uniforms.vec3s.insert(name, Vec3::ONE);
                }
                UniformType::Vec4 => {
                    uniforms.vec4s.insert(name, Vec4::ONE);
                }
                UniformType::Sampler2D => {
                    uniforms
                        .textures
                        .insert(name, Rc::clone(ctx.default_texture()));
                }
                UniformType::Mat3 | UniformType::Mat4 => {}
            }
        }
        Self {
            program,
            uniforms: RefCell::new(uniforms),
        }
    }

    pub fn program(&self) -> &Rc<ShaderProgram> {
        &self.program
    }

    fn accepts(name: &str) -> bool {
        if is_reserved(name) {
            log::warn!("`{name}` is set by the renderer and cannot be stored on a material");
            return false;
        }
        true
    }

    pub fn set_int(&self, name: &str, value: i32) {
        if Self::accepts(name) {
            self.uniforms.borrow_mut().ints.insert(name.to_owned(), value);
        }
    }

    pub fn set_float(&self, name: &str, value: f32) {
        if Self::accepts(name) {
            self.uniforms.borrow_mut().floats.insert(name.to_owned(), value);
        }
    }

    pub fn set_vec2(&self, name: &str, value: Vec2) {
        if Self::accepts(name) {
            self.uniforms.borrow_mut().vec2s.insert(name.to_owned(), value);
        }
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) {
        if Self::accepts(name) {
            self.uniforms.borrow_mut().vec3s.insert(name.to_owned(), value);
        }
    }

    pub fn set_vec4(&self, name: &str, value: Vec4) {
        if Self::accepts(name) {
            self.uniforms.borrow_mut().vec4s.insert(name.to_owned(), value);
        }
    }

    pub fn set_texture(&self, name: &str, texture: Rc<Texture>) {
        if Self::accepts(name) {
            self.uniforms
                .borrow_mut()
                .textures
                .insert(name.to_owned(), texture);
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        self.uniforms.borrow().ints.get(name).copied()
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.uniforms.borrow().floats.get(name).copied()
    }

    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        self.uniforms.borrow().vec2s.get(name).copied()
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        self.uniforms.borrow().vec3s.get(name).copied()
    }

    pub fn vec4(&self, name: &str) -> Option<Vec4> {
        self.uniforms.borrow().vec4s.get(name).copied()
    }

    pub fn texture(&self, name: &str) -> Option<Rc<Texture>> {
        self.uniforms.borrow().textures.get(name).cloned()
    }

    /// Every stored name, in upload order.
    pub fn names(&self) -> Vec<String> {
        let u = self.uniforms.borrow();
        u.ints
            .keys()
            .chain(u.floats.keys())
            .chain(u.vec2s.keys())
            .chain(u.vec3s.keys())
            .chain(u.vec4s.keys())
            .chain(u.textures.keys())
            .cloned()
            .collect()
    }

    /// Makes the program current and uploads every stored value.
    ///
    /// Textures are bound to units 0, 1, 2, ... in name order and each
    /// texture uniform is set to its unit. Depth testing and back-face
    /// culling are switched on and stay on.
    pub fn use_material(&self) {
        let program = &self.program;
        let device = program.device();
        program.use_program();

        let u = self.uniforms.borrow();
        let scalars = u
            .ints
            .iter()
            .map(|(k, v)| (k, UniformValue::Int(*v)))
            .chain(u.floats.iter().map(|(k, v)| (k, UniformValue::Float(*v))))
            .chain(u.vec2s.iter().map(|(k, v)| (k, UniformValue::Vec2(*v))))
            .chain(u.vec3s.iter().map(|(k, v)| (k, UniformValue::Vec3(*v))))
            .chain(u.vec4s.iter().map(|(k, v)| (k, UniformValue::Vec4(*v))));
        for (name, value) in scalars {
            program.set_uniform(name, value);
        }

        for (unit, (name, texture)) in (0u32..).zip(u.textures.iter()) {
            texture.bind(unit);
            program.set_uniform(name, UniformValue::Int(unit as i32));
        }

        device.set_capability(Capability::DepthTest, true);
        device.set_capability(Capability::CullFace, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCommand;
    use crate::reflect::tests::{FRAGMENT, VERTEX};
    use crate::texture::TextureSettings;

    fn material(ctx: &RenderContext) -> Material {
        let program = Rc::new(ShaderProgram::from_sources(ctx, VERTEX, FRAGMENT));
        Material::new(ctx, program)
    }

    #[test]
    fn seeds_defaults_by_type() {
        let (ctx, _device) = RenderContext::headless();
        let m = material(&ctx);

        assert_eq!(m.int("u_Mode"), Some(0));
        assert_eq!(m.float("u_Shininess"), Some(0.0));
        assert_eq!(m.vec2("u_Tiling"), Some(Vec2::ZERO));
        assert_eq!(m.vec3("u_Tint"), Some(Vec3::ONE));
        assert_eq!(m.vec4("u_Color"), Some(Vec4::ONE));
        let texture = m.texture("u_Texture").unwrap();
        assert!(Rc::ptr_eq(&texture, ctx.default_texture()));
    }

    #[test]
    fn never_stores_reserved_names() {
        let (ctx, _device) = RenderContext::headless();
        let m = material(&ctx);

        for name in m.names() {
            assert!(!is_reserved(&name), "{name} was seeded");
        }
        // Declared as vec3f in the fragment stage.
        assert_eq!(m.vec3("u_AmbientColor"), None);

        m.set_vec3("u_LightColor", Vec3::ZERO);
        m.set_int("u_LightMap", 1);
        assert_eq!(m.vec3("u_LightColor"), None);
        assert_eq!(m.int("u_LightMap"), None);
    }

    #[test]
    fn setters_upsert_any_name() {
        let (ctx, _device) = RenderContext::headless();
        let m = material(&ctx);
        m.set_float("u_Shininess", 32.0);
        m.set_float("u_Unused", 1.0);
        assert_eq!(m.float("u_Shininess"), Some(32.0));
        assert_eq!(m.float("u_Unused"), Some(1.0));
    }

    #[test]
    fn materials_share_the_default_texture() {
        let (ctx, device) = RenderContext::headless();
        let a = material(&ctx);
        let b = material(&ctx);
        let ta = a.texture("u_Texture").unwrap();
        let tb = b.texture("u_Texture").unwrap();
        assert_eq!(ta.id(), tb.id());
        // Only the context's default texture exists.
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn use_material_uploads_and_binds() {
        let (ctx, device) = RenderContext::headless();
        let m = material(&ctx);
        let checker = Rc::new(Texture::blank(&ctx, 2, 2, TextureSettings::nearest()).unwrap());
        m.set_texture("u_Texture", Rc::clone(&checker));
        m.set_vec4("u_Color", Vec4::new(1.0, 0.0, 0.0, 1.0));
        device.take_commands();

        m.use_material();
        let program = m.program().id();
        let commands = device.take_commands();
        assert_eq!(commands[0], DeviceCommand::UseProgram(program));
        assert!(commands.contains(&DeviceCommand::BindTexture {
            unit: 0,
            texture: checker.id(),
        }));
        assert_eq!(
            device.uniform(program, "u_Color"),
            Some(UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 1.0)))
        );
        assert_eq!(device.uniform(program, "u_Texture"), Some(UniformValue::Int(0)));
        assert!(device.capability(Capability::DepthTest));
        assert!(device.capability(Capability::CullFace));
    }
}
