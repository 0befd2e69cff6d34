use crate::transform::Transform;
use glam::Vec3;

/// A light infinitely far away, shining along its transform's forward axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub transform: Transform,
    pub color: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::ONE)
    }
}

impl DirectionalLight {
    pub fn new(color: Vec3) -> Self {
        Self {
            transform: Transform::new(),
            color,
        }
    }

    /// Sets the Euler rotation in degrees.
    pub fn rotated(mut self, degrees: Vec3) -> Self {
        self.transform.rotation = degrees;
        self
    }

    pub fn direction(&self) -> Vec3 {
        self.transform.forward()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitched_down_shines_down() {
        let light = DirectionalLight::default().rotated(Vec3::new(-90.0, 0.0, 0.0));
        assert!((light.direction() - Vec3::NEG_Y).length() < 1e-5);
        assert_eq!(light.color, Vec3::ONE);
    }
}
