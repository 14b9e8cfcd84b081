//! Shading-normal preparation: tangent-space perturbation, two-sided flip,
//! and view-dependent bending toward the geometric normal.

use nalgebra::Vector3;

use crate::core::buffer::FieldBuffer;
use crate::core::{lerp_vec3, safe_normalize};

/// Alignment threshold below which the shading normal is bent back toward
/// the geometric normal to keep grazing silhouettes stable.
const NORMAL_BEND_THRESHOLD: f32 = 0.1;

/// Combine a smooth and geometric normal based on how closely the smooth
/// normal faces the viewer.
#[inline]
fn bend_normal(
    view_vec: &Vector3<f32>,
    shading_nrm: &Vector3<f32>,
    smooth_nrm: &Vector3<f32>,
    geom_nrm: &Vector3<f32>,
) -> Vector3<f32> {
    let t = (view_vec.dot(smooth_nrm) / NORMAL_BEND_THRESHOLD).clamp(0.0, 1.0);
    lerp_vec3(geom_nrm, shading_nrm, t)
}

/// Per-pixel shading-normal computation.
///
/// `perturbed` is a tangent-space normal in the Y-up (OpenGL) convention;
/// its z component is clamped to the front hemisphere. Shading is two-sided:
/// all normals flip when the geometric normal faces away from the viewer.
#[inline]
pub fn shading_normal_pixel(
    pos: &Vector3<f32>,
    view_pos: &Vector3<f32>,
    perturbed: Option<&Vector3<f32>>,
    smooth_nrm: &Vector3<f32>,
    smooth_tng: &Vector3<f32>,
    geom_nrm: &Vector3<f32>,
) -> Vector3<f32> {
    let smooth_nrm_n = safe_normalize(smooth_nrm);
    let shading = match perturbed {
        Some(p) => {
            let bitang = safe_normalize(&smooth_tng.cross(&smooth_nrm_n));
            let tang = safe_normalize(smooth_tng);
            tang * p.x + bitang * p.y + smooth_nrm_n * p.z.max(0.0)
        }
        None => smooth_nrm_n,
    };

    let mut shading_nrm = safe_normalize(&shading);
    let mut smooth_n = smooth_nrm_n;
    let mut geom_n = safe_normalize(geom_nrm);

    let view_vec = safe_normalize(&(view_pos - pos));
    if geom_n.dot(&view_vec) < 0.0 {
        shading_nrm = -shading_nrm;
        smooth_n = -smooth_n;
        geom_n = -geom_n;
    }

    bend_normal(&view_vec, &shading_nrm, &smooth_n, &geom_n)
}

/// Buffer-level wrapper: compute the final shading normal for every pixel.
pub fn prepare_shading_normal(
    gb_pos: &FieldBuffer,
    view_pos: Vector3<f32>,
    perturbed_nrm: Option<&FieldBuffer>,
    gb_normal: &FieldBuffer,
    gb_tangent: &FieldBuffer,
    gb_geometric_normal: &FieldBuffer,
) -> FieldBuffer {
    let (w, h) = (gb_pos.width(), gb_pos.height());
    let mut out = FieldBuffer::zeros(w, h, 3);

    for y in 0..h {
        for x in 0..w {
            let pos = gb_pos.get_vec3(x, y, 0);
            let p = perturbed_nrm.map(|b| b.get_vec3(x, y, 0));
            let n = shading_normal_pixel(
                &pos,
                &view_pos,
                p.as_ref(),
                &gb_normal.get_vec3(x, y, 0),
                &gb_tangent.get_vec3(x, y, 0),
                &gb_geometric_normal.get_vec3(x, y, 0),
            );
            out.set_vec3(x, y, 0, &n);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unperturbed_front_facing_passthrough() {
        let n = shading_normal_pixel(
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 5.0),
            None,
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
        );
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_two_sided_flip_backfacing() {
        let n = shading_normal_pixel(
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 5.0),
            None,
            &Vector3::new(0.0, 0.0, -1.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, -1.0),
        );
        // Geometric normal faces away from the viewer, so shading flips.
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_identity_perturbation_is_noop() {
        let n = shading_normal_pixel(
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 5.0),
            Some(&Vector3::new(0.0, 0.0, 1.0)),
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
        );
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_perturbation_tilts_along_tangent() {
        let n = shading_normal_pixel(
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 5.0),
            Some(&Vector3::new(0.5, 0.0, 1.0)),
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
        );
        assert!(n.x > 0.1, "expected tilt toward tangent, got {n:?}");
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_negative_z_perturbation_clamped() {
        let n = shading_normal_pixel(
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 5.0),
            Some(&Vector3::new(0.0, 0.0, -2.0)),
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
        );
        // z clamps to 0; the perturbed vector degenerates and the bend
        // keeps the result finite.
        assert!(n.x.is_finite() && n.y.is_finite() && n.z.is_finite());
    }
}
