//! Small math utilities shared across the shading pipeline.

use nalgebra::{Matrix4, Vector3, Vector4};

/// Epsilon floor used when normalizing vectors that may be degenerate.
pub const NORMALIZE_EPS: f32 = 1e-20;

/// Normalize a vector, falling back gracefully for near-zero input.
///
/// v / sqrt(max(dot(v, v), eps))
///
/// Degenerate inputs yield a near-zero vector instead of NaN, which keeps
/// downstream arithmetic (and its gradients) finite.
pub fn safe_normalize(v: &Vector3<f32>) -> Vector3<f32> {
    let len_sq = v.dot(v).max(NORMALIZE_EPS);
    v / len_sq.sqrt()
}

/// Linear interpolation: a + (b - a) * t.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Componentwise linear interpolation of vectors.
pub fn lerp_vec3(a: &Vector3<f32>, b: &Vector3<f32>, t: f32) -> Vector3<f32> {
    a + (b - a) * t
}

/// Transform a point by a 4×4 matrix, returning homogeneous clip coordinates.
pub fn transform_point(m: &Matrix4<f32>, p: &Vector3<f32>) -> Vector4<f32> {
    m * Vector4::new(p.x, p.y, p.z, 1.0)
}

/// Transform a whole vertex array to clip space.
pub fn transform_points(m: &Matrix4<f32>, points: &[Vector3<f32>]) -> Vec<Vector4<f32>> {
    points.iter().map(|p| transform_point(m, p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_safe_normalize_unit_length() {
        let v = safe_normalize(&Vector3::new(3.0, 0.0, 4.0));
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.x, 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_safe_normalize_zero_is_finite() {
        let v = safe_normalize(&Vector3::zeros());
        assert!(v.x.is_finite() && v.y.is_finite() && v.z.is_finite());
    }

    #[test]
    fn test_lerp_endpoints() {
        assert_relative_eq!(lerp(2.0, 6.0, 0.0), 2.0);
        assert_relative_eq!(lerp(2.0, 6.0, 1.0), 6.0);
        assert_relative_eq!(lerp(2.0, 6.0, 0.25), 3.0);
    }

    #[test]
    fn test_transform_point_translation() {
        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let p = transform_point(&m, &Vector3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(p.x, 1.5, epsilon = 1e-6);
        assert_relative_eq!(p.w, 1.0, epsilon = 1e-6);
    }
}
