use crate::material::Material;
use crate::mesh::Mesh;
use crate::transform::Transform;
use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;

/// What a [`Drawable`] draws.
pub enum DrawableKind {
    /// Meshes drawn with whatever model transform the program already has.
    Mesh { meshes: Vec<Rc<Mesh>> },
    /// Meshes placed in the world by their own transform.
    Mesh3D {
        transform: Transform,
        meshes: Vec<Rc<Mesh>>,
    },
}

/// An object that can draw itself with a material.
///
/// A drawable without a material only shows up when the scene is drawn with
/// an override material.
pub struct Drawable {
    pub material: Option<Rc<Material>>,
    pub kind: DrawableKind,
}

/// Drawables are shared between the scene and the code that moves them.
pub type SharedDrawable = Rc<RefCell<Drawable>>;

impl Drawable {
    pub fn mesh(material: Option<Rc<Material>>, meshes: Vec<Rc<Mesh>>) -> Self {
        Self {
            material,
            kind: DrawableKind::Mesh { meshes },
        }
    }

    /// A drawable at the identity transform.
    pub fn mesh3d(material: Option<Rc<Material>>, meshes: Vec<Rc<Mesh>>) -> Self {
        Self {
            material,
            kind: DrawableKind::Mesh3D {
                transform: Transform::new(),
                meshes,
            },
        }
    }

    /// Replaces the transform, turning a plain mesh drawable into a 3D one.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        let meshes = match self.kind {
            DrawableKind::Mesh { meshes } | DrawableKind::Mesh3D { meshes, .. } => meshes,
        };
        self.kind = DrawableKind::Mesh3D { transform, meshes };
        self
    }

    /// Wraps the drawable for sharing with a [`Scene`](crate::Scene).
    pub fn shared(self) -> SharedDrawable {
        Rc::new(RefCell::new(self))
    }

    pub fn meshes(&self) -> &[Rc<Mesh>] {
        match &self.kind {
            DrawableKind::Mesh { meshes } | DrawableKind::Mesh3D { meshes, .. } => meshes,
        }
    }

    pub fn transform(&self) -> Option<&Transform> {
        match &self.kind {
            DrawableKind::Mesh3D { transform, .. } => Some(transform),
            DrawableKind::Mesh { .. } => None,
        }
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        match &mut self.kind {
            DrawableKind::Mesh3D { transform, .. } => Some(transform),
            DrawableKind::Mesh { .. } => None,
        }
    }

    /// Draws with `material_override` if given, otherwise with the
    /// drawable's own material. Without either this does nothing.
    pub fn draw(&self, material_override: Option<&Material>) {
        let Some(material) = material_override.or(self.material.as_deref()) else {
            return;
        };
        material.use_material();
        match &self.kind {
            DrawableKind::Mesh { meshes } => draw_all(meshes),
            DrawableKind::Mesh3D { transform, meshes } => {
                material.program().apply_transform(transform);
                draw_all(meshes);
            }
        }
    }

    /// Distance from the drawable's position to `point`; zero for drawables
    /// without a transform.
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.transform()
            .map_or(0.0, |t| t.position.distance(point))
    }
}

fn draw_all(meshes: &[Rc<Mesh>]) {
    for mesh in meshes {
        mesh.draw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RenderContext;
    use crate::device::UniformValue;
    use crate::reflect::tests::{FRAGMENT, VERTEX};
    use crate::shader::ShaderProgram;
    use glam::Mat4;

    fn material(ctx: &RenderContext) -> Rc<Material> {
        let program = Rc::new(ShaderProgram::from_sources(ctx, VERTEX, FRAGMENT));
        Rc::new(Material::new(ctx, program))
    }

    #[test]
    fn without_material_draws_nothing() {
        let (ctx, device) = RenderContext::headless();
        let cube = Rc::new(Mesh::cube(&ctx, 1.0));
        Drawable::mesh3d(None, vec![cube]).draw(None);
        assert!(device.draw_calls().is_empty());
    }

    #[test]
    fn mesh3d_uploads_its_transform() {
        let (ctx, device) = RenderContext::headless();
        let material = material(&ctx);
        let cube = Rc::new(Mesh::cube(&ctx, 1.0));
        let position = Vec3::new(4.0, 0.0, -2.0);
        let drawable = Drawable::mesh3d(Some(Rc::clone(&material)), vec![Rc::clone(&cube), cube])
            .with_transform(Transform::from_position(position));

        drawable.draw(None);

        let calls = device.draw_calls();
        assert_eq!(calls.len(), 2);
        for call in calls {
            assert_eq!(call.program, material.program().id());
            assert_eq!(
                call.uniforms.get("u_Model"),
                Some(&UniformValue::Mat4(Mat4::from_translation(position)))
            );
        }
    }

    #[test]
    fn override_replaces_own_material() {
        let (ctx, device) = RenderContext::headless();
        let own = material(&ctx);
        let other = material(&ctx);
        let drawable = Drawable::mesh(Some(own), vec![Rc::new(Mesh::plane_square(&ctx, 1.0))]);

        drawable.draw(Some(&other));

        let calls = device.draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, other.program().id());
    }

    #[test]
    fn distance() {
        let (ctx, _device) = RenderContext::headless();
        let cube = Rc::new(Mesh::cube(&ctx, 1.0));
        let flat = Drawable::mesh(None, vec![Rc::clone(&cube)]);
        assert_eq!(flat.distance_to(Vec3::new(3.0, 4.0, 0.0)), 0.0);

        let placed = Drawable::mesh3d(None, vec![cube])
            .with_transform(Transform::from_position(Vec3::new(3.0, 4.0, 0.0)));
        assert_eq!(placed.distance_to(Vec3::ZERO), 5.0);
    }
}
