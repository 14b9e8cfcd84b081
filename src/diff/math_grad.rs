//! Gradients for the small vector-math building blocks.

use nalgebra::Vector3;

use crate::core::NORMALIZE_EPS;

/// Jacobian-vector product of `safe_normalize` at `v` applied to `d_n`
/// (upstream gradient w.r.t. the normalized output).
///
/// For n = v / |v|:  dL/dv = (d_n - n * (n . d_n)) / |v|
///
/// Inside the epsilon floor the length is treated as constant, matching the
/// forward clamp.
pub fn safe_normalize_backward(v: &Vector3<f32>, d_n: &Vector3<f32>) -> Vector3<f32> {
    let len_sq = v.dot(v);
    if len_sq <= NORMALIZE_EPS {
        // Forward is v * const in the clamped region.
        return d_n / NORMALIZE_EPS.sqrt();
    }
    let len = len_sq.sqrt();
    let n = v / len;
    (d_n - n * n.dot(d_n)) / len
}

/// Partials of `lerp(a, b, t) = a + (b - a) * t`.
///
/// Returns (dL/da, dL/db, dL/dt) given the upstream gradient and the inputs.
pub fn lerp_backward(a: f32, b: f32, t: f32, d_out: f32) -> (f32, f32, f32) {
    (d_out * (1.0 - t), d_out * t, d_out * (b - a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_backward_orthogonal_to_direction() {
        // The gradient of a unit-length output is orthogonal to the output
        // direction: moving along v cannot change n.
        let v = Vector3::new(1.0, 2.0, -0.5);
        let d_n = Vector3::new(0.3, -0.1, 0.7);
        let g = safe_normalize_backward(&v, &d_n);
        let n = v.normalize();
        assert_relative_eq!(g.dot(&n), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lerp_backward_partials() {
        let (da, db, dt) = lerp_backward(1.0, 5.0, 0.25, 2.0);
        assert_relative_eq!(da, 1.5, epsilon = 1e-6);
        assert_relative_eq!(db, 0.5, epsilon = 1e-6);
        assert_relative_eq!(dt, 8.0, epsilon = 1e-6);
    }
}
