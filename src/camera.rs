use crate::transform::Transform;
use glam::{Mat4, Vec3};

/// How a camera projects the view volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// A box `aspect * size` wide and `size` tall.
    Orthographic { size: f32 },
    /// Vertical field of view in degrees.
    Perspective { fov: f32 },
}

/// A camera for 3D scenes.
///
/// The camera looks down its transform's forward axis (-Z) with its up axis
/// as up. Scale is ignored. Projections map depth to `0..1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    /// Viewport width / height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(1.0, 60.0)
    }
}

impl Camera {
    pub fn perspective(aspect: f32, fov_degrees: f32) -> Self {
        Self {
            transform: Transform::new(),
            aspect,
            near: 0.1,
            far: 100.0,
            projection: Projection::Perspective { fov: fov_degrees },
        }
    }

    pub fn orthographic(aspect: f32, size: f32) -> Self {
        Self {
            projection: Projection::Orthographic { size },
            ..Self::perspective(aspect, 60.0)
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    /// Sets the Euler rotation in degrees.
    pub fn rotated(mut self, degrees: Vec3) -> Self {
        self.transform.rotation = degrees;
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        let t = &self.transform;
        Mat4::look_at_rh(t.position, t.position + t.forward(), t.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Orthographic { size } => {
                let half_w = self.aspect * size * 0.5;
                let half_h = size * 0.5;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
            Projection::Perspective { fov } => {
                Mat4::perspective_rh(fov.to_radians(), self.aspect, self.near, self.far)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cam = Camera::orthographic(1.5, 10.0);
        assert_eq!(cam.near, 0.1);
        assert_eq!(cam.far, 100.0);
        assert_eq!(cam.projection, Projection::Orthographic { size: 10.0 });
        assert_eq!(Camera::default().projection, Projection::Perspective { fov: 60.0 });
    }

    #[test]
    fn view_moves_camera_to_origin() {
        let cam = Camera::perspective(1.0, 60.0)
            .at(Vec3::new(0.0, 10.0, 10.0))
            .rotated(Vec3::new(-45.0, 0.0, 0.0));
        let eye = cam.view_matrix().transform_point3(cam.position());
        assert!(eye.length() < 1e-4);

        // A point straight ahead lands on the -Z axis in view space.
        let ahead = cam.position() + cam.transform.forward() * 5.0;
        let v = cam.view_matrix().transform_point3(ahead);
        assert!((v - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-4);
    }

    #[test]
    fn orthographic_box_matches_aspect() {
        let cam = Camera::orthographic(2.0, 10.0);
        let proj = cam.projection_matrix();
        let corner = proj.project_point3(Vec3::new(10.0, 5.0, -cam.near));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
        assert!(corner.z.abs() < 1e-5);
    }

    #[test]
    fn perspective_maps_far_plane_to_one() {
        let cam = Camera::perspective(1.0, 90.0);
        let p = cam.projection_matrix().project_point3(Vec3::new(0.0, 0.0, -cam.far));
        assert!((p.z - 1.0).abs() < 1e-4);
    }
}
