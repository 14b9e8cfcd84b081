//! Camera model for the shading stage.
//!
//! The compositor only needs two things from a camera: the combined
//! projection-view matrix that takes world-space vertices to clip space, and
//! the world-space eye position used for view-dependent shading.

use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::core::math::transform_points;

/// Camera as seen by the render entry points.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Camera {
    /// Combined projection * view matrix (world to clip space).
    pub mvp: Matrix4<f32>,

    /// Eye position in world space.
    pub position: Vector3<f32>,
}

impl Camera {
    pub fn new(mvp: Matrix4<f32>, position: Vector3<f32>) -> Self {
        Self { mvp, position }
    }

    /// An identity camera: world coordinates are already clip coordinates.
    /// Convenient for tests that place geometry directly in NDC.
    pub fn identity() -> Self {
        Self {
            mvp: Matrix4::identity(),
            position: Vector3::new(0.0, 0.0, 3.0),
        }
    }

    /// Transform mesh vertices to homogeneous clip space.
    pub fn to_clip(&self, v_pos: &[Vector3<f32>]) -> Vec<Vector4<f32>> {
        transform_points(&self.mvp, v_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_camera_passthrough() {
        let cam = Camera::identity();
        let clip = cam.to_clip(&[Vector3::new(0.25, -0.5, 0.0)]);
        assert_relative_eq!(clip[0].x, 0.25, epsilon = 1e-6);
        assert_relative_eq!(clip[0].y, -0.5, epsilon = 1e-6);
        assert_relative_eq!(clip[0].w, 1.0, epsilon = 1e-6);
    }
}
