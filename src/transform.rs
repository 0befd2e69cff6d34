//! Position, rotation and scale of objects in the world.

use glam::{Mat4, Vec3};

/// Position, Euler rotation and scale of an object.
///
/// Rotation is stored as Euler angles in **degrees** and applied X first,
/// then Y, then Z. Every matrix is recomputed on access; nothing is cached.
///
/// # Default Values
///
/// - `position`: `(0, 0, 0)`
/// - `rotation`: `(0, 0, 0)`
/// - `scale`: `(1, 1, 1)`
///
/// # Example
///
/// ```
/// use brazier::{Transform, Vec3};
///
/// let transform = Transform::new()
///     .position(Vec3::new(0.0, 2.0, -5.0))
///     .rotation(Vec3::new(0.0, 90.0, 0.0))
///     .uniform_scale(2.0);
///
/// assert_eq!(transform.model_matrix().w_axis.truncate(), Vec3::new(0.0, 2.0, -5.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// World-space position (translation).
    pub position: Vec3,
    /// Euler angles in degrees, applied X, Y, Z.
    pub rotation: Vec3,
    /// Scale factors for each axis.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Creates an identity transform (origin, no rotation, unit scale).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transform positioned at the given location.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Sets the position (translation) component.
    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the Euler rotation in degrees.
    pub fn rotation(mut self, degrees: Vec3) -> Self {
        self.rotation = degrees;
        self
    }

    /// Sets non-uniform scale factors for each axis.
    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Sets uniform scale on all axes.
    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn translation_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
    }

    /// Rotation about X, then Y, then Z.
    pub fn rotation_matrix(&self) -> Mat4 {
        let r = self.rotation;
        Mat4::from_rotation_z(r.z.to_radians())
            * Mat4::from_rotation_y(r.y.to_radians())
            * Mat4::from_rotation_x(r.x.to_radians())
    }

    /// The inverse of [`rotation_matrix`](Self::rotation_matrix): undoes Z,
    /// then Y, then X.
    pub fn inverse_rotation_matrix(&self) -> Mat4 {
        let r = self.rotation;
        Mat4::from_rotation_x(-r.x.to_radians())
            * Mat4::from_rotation_y(-r.y.to_radians())
            * Mat4::from_rotation_z(-r.z.to_radians())
    }

    pub fn scale_matrix(&self) -> Mat4 {
        Mat4::from_scale(self.scale)
    }

    /// Scale, then rotation, then translation.
    pub fn model_matrix(&self) -> Mat4 {
        self.translation_matrix() * self.rotation_matrix() * self.scale_matrix()
    }

    /// Local +X in world space.
    pub fn right(&self) -> Vec3 {
        self.rotation_matrix().transform_vector3(Vec3::X)
    }

    /// Local +Y in world space.
    pub fn up(&self) -> Vec3 {
        self.rotation_matrix().transform_vector3(Vec3::Y)
    }

    /// Local -Z in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation_matrix().transform_vector3(Vec3::NEG_Z)
    }
}
