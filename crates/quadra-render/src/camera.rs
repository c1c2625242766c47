//! 2D camera and the MVP uniform it feeds.

use glam::{Mat4, Vec3};
use quadra_core::math::orthographic_projection;

/// Camera for rendering.
///
/// Holds an accumulated translation and rotation about Z. The transform is
/// rebuilt whenever either changes.
#[derive(Debug, Clone)]
pub struct Camera {
    translation: Vec3,
    rotation: f32,
    transform: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: 0.0,
            transform: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// Create a camera at the origin with no rotation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the camera by `delta`.
    pub fn translate(&mut self, delta: Vec3) {
        self.translation += delta;
        self.rebuild();
    }

    /// Rotate the camera about Z by `radians`.
    pub fn rotate(&mut self, radians: f32) {
        self.rotation += radians;
        self.rebuild();
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Snapshot of the camera transform.
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    fn rebuild(&mut self) {
        self.transform =
            Mat4::from_rotation_z(self.rotation) * Mat4::from_translation(self.translation);
    }
}

/// MVP uniform buffer data for GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MvpUniform {
    pub mvp: [[f32; 4]; 4],
}

impl MvpUniform {
    /// Size of the uniform in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

impl From<&Camera> for MvpUniform {
    fn from(camera: &Camera) -> Self {
        // Model is identity
        let mvp = orthographic_projection() * camera.transform();
        Self {
            mvp: mvp.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn default_camera_is_identity() {
        let camera = Camera::new();
        assert_eq!(camera.transform(), Mat4::IDENTITY);
    }

    #[test]
    fn transform_rotates_after_translating() {
        let mut camera = Camera::new();
        camera.translate(Vec3::new(1.0, 0.0, 0.0));
        camera.rotate(std::f32::consts::FRAC_PI_2);

        let moved = camera.transform() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(moved.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(moved.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn movements_accumulate() {
        let mut camera = Camera::new();
        camera.rotate(0.25);
        camera.rotate(0.5);
        camera.translate(Vec3::X);
        camera.translate(Vec3::Y);
        assert_relative_eq!(camera.rotation(), 0.75);
        assert_eq!(camera.translation(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn mvp_matches_projection_for_default_camera() {
        let uniform = MvpUniform::from(&Camera::new());
        assert_eq!(uniform.mvp, orthographic_projection().to_cols_array_2d());
        assert_eq!(MvpUniform::SIZE, 64);
    }
}
