//! Reference CPU rasterizer with depth peeling.
//!
//! Perspective-correct barycentrics with analytic screen-space derivatives,
//! no clipping (triangles touching the near plane are skipped), no backface
//! culling (the shader does two-sided shading). Good enough to drive the
//! shading stage standalone and in tests; a hardware rasterizer plugs in
//! behind the same traits for production workloads.

use nalgebra::Vector4;

use crate::core::buffer::FieldBuffer;
use crate::raster::{DepthPeeler, RasterBuffer, Rasterizer};

const W_EPS: f32 = 1e-6;
const DEPTH_EPS: f32 = 1e-7;

pub struct ReferenceRasterizer;

impl Rasterizer for ReferenceRasterizer {
    fn rasterize(
        &self,
        clip: &[Vector4<f32>],
        indices: &[[u32; 3]],
        width: usize,
        height: usize,
    ) -> (RasterBuffer, FieldBuffer) {
        let (rast, db, _depth) = raster_layer(clip, indices, width, height, None);
        (rast, db)
    }

    fn depth_peeler<'a>(
        &self,
        clip: &'a [Vector4<f32>],
        indices: &'a [[u32; 3]],
        width: usize,
        height: usize,
    ) -> Box<dyn DepthPeeler + 'a> {
        Box::new(ReferenceDepthPeeler {
            clip,
            indices,
            width,
            height,
            prev_depth: vec![f32::NEG_INFINITY; width * height],
        })
    }
}

/// Depth peeler over a fixed triangle set. Each layer keeps, per pixel, the
/// nearest fragment strictly behind the previous layer's fragment.
pub struct ReferenceDepthPeeler<'a> {
    clip: &'a [Vector4<f32>],
    indices: &'a [[u32; 3]],
    width: usize,
    height: usize,
    prev_depth: Vec<f32>,
}

impl DepthPeeler for ReferenceDepthPeeler<'_> {
    fn rasterize_next_layer(&mut self) -> (RasterBuffer, FieldBuffer) {
        let (rast, db, depth) = raster_layer(
            self.clip,
            self.indices,
            self.width,
            self.height,
            Some(&self.prev_depth),
        );
        self.prev_depth = depth;
        (rast, db)
    }
}

struct ScreenTriangle {
    // Screen-space vertex positions.
    x: [f32; 3],
    y: [f32; 3],
    // Clip-space w per vertex, floored away from zero.
    w: [f32; 3],
    // Normalized device z per vertex.
    z: [f32; 3],
    det: f32,
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
}

fn setup_triangle(
    clip: &[Vector4<f32>],
    tri: &[u32; 3],
    width: usize,
    height: usize,
) -> Option<ScreenTriangle> {
    let mut x = [0.0f32; 3];
    let mut y = [0.0f32; 3];
    let mut w = [0.0f32; 3];
    let mut z = [0.0f32; 3];

    for k in 0..3 {
        let v = clip[tri[k] as usize];
        // No near-plane clipping here: drop triangles that straddle w=0.
        if v.w <= W_EPS {
            return None;
        }
        w[k] = v.w;
        let inv_w = 1.0 / v.w;
        x[k] = (v.x * inv_w * 0.5 + 0.5) * width as f32;
        y[k] = (v.y * inv_w * 0.5 + 0.5) * height as f32;
        z[k] = v.z * inv_w;
    }

    let det = (y[1] - y[2]) * (x[0] - x[2]) + (x[2] - x[1]) * (y[0] - y[2]);
    if det.abs() < 1e-12 {
        return None;
    }

    let fx_min = x[0].min(x[1]).min(x[2]).floor().max(0.0);
    let fx_max = x[0].max(x[1]).max(x[2]).ceil().min(width as f32);
    let fy_min = y[0].min(y[1]).min(y[2]).floor().max(0.0);
    let fy_max = y[0].max(y[1]).max(y[2]).ceil().min(height as f32);
    if fx_min >= fx_max || fy_min >= fy_max {
        return None;
    }

    Some(ScreenTriangle {
        x,
        y,
        w,
        z,
        det,
        min_x: fx_min as usize,
        max_x: fx_max as usize,
        min_y: fy_min as usize,
        max_y: fy_max as usize,
    })
}

/// Rasterize one layer. `prev_depth` (when peeling) holds the depth of the
/// previously peeled fragment per pixel; only strictly deeper fragments are
/// eligible. Returns the raster buffer, the derivative buffer, and the
/// per-pixel depth of the selected fragments (+inf where uncovered, so
/// later layers stay empty there).
fn raster_layer(
    clip: &[Vector4<f32>],
    indices: &[[u32; 3]],
    width: usize,
    height: usize,
    prev_depth: Option<&[f32]>,
) -> (RasterBuffer, FieldBuffer, Vec<f32>) {
    let mut rast = FieldBuffer::zeros(width, height, 4);
    let mut db = FieldBuffer::zeros(width, height, 4);
    let mut best_depth = vec![f32::INFINITY; width * height];
    let mut covered = vec![false; width * height];
    let mut near_skipped = 0usize;

    for (tri_idx, tri) in indices.iter().enumerate() {
        if tri.iter().any(|&i| clip[i as usize].w <= W_EPS) {
            near_skipped += 1;
            continue;
        }
        let Some(t) = setup_triangle(clip, tri, width, height) else {
            continue;
        };

        let inv_det = 1.0 / t.det;
        // Screen-space barycentric gradients are constant per triangle.
        let dl0_dx = (t.y[1] - t.y[2]) * inv_det;
        let dl0_dy = (t.x[2] - t.x[1]) * inv_det;
        let dl1_dx = (t.y[2] - t.y[0]) * inv_det;
        let dl1_dy = (t.x[0] - t.x[2]) * inv_det;

        for py in t.min_y..t.max_y {
            for px in t.min_x..t.max_x {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;

                let l0 = ((t.y[1] - t.y[2]) * (cx - t.x[2]) + (t.x[2] - t.x[1]) * (cy - t.y[2]))
                    * inv_det;
                let l1 = ((t.y[2] - t.y[0]) * (cx - t.x[2]) + (t.x[0] - t.x[2]) * (cy - t.y[2]))
                    * inv_det;
                let l2 = 1.0 - l0 - l1;
                if l0 < 0.0 || l1 < 0.0 || l2 < 0.0 {
                    continue;
                }

                // NDC z is affine in screen space.
                let depth = l0 * t.z[0] + l1 * t.z[1] + l2 * t.z[2];

                let pi = py * width + px;
                if let Some(prev) = prev_depth {
                    if depth <= prev[pi] + DEPTH_EPS {
                        continue;
                    }
                }
                if depth >= best_depth[pi] {
                    continue;
                }

                // Perspective-correct weights: a_i = l_i / w_i, u = a_0 / D.
                let a0 = l0 / t.w[0];
                let a1 = l1 / t.w[1];
                let a2 = l2 / t.w[2];
                let d = a0 + a1 + a2;
                let inv_d = 1.0 / d;
                let u = a0 * inv_d;
                let v = a1 * inv_d;

                // Quotient-rule derivatives of u = a0/D, v = a1/D.
                let da0_dx = dl0_dx / t.w[0];
                let da0_dy = dl0_dy / t.w[0];
                let da1_dx = dl1_dx / t.w[1];
                let da1_dy = dl1_dy / t.w[1];
                let da2_dx = (-dl0_dx - dl1_dx) / t.w[2];
                let da2_dy = (-dl0_dy - dl1_dy) / t.w[2];
                let dd_dx = da0_dx + da1_dx + da2_dx;
                let dd_dy = da0_dy + da1_dy + da2_dy;
                let du_dx = (da0_dx - u * dd_dx) * inv_d;
                let du_dy = (da0_dy - u * dd_dy) * inv_d;
                let dv_dx = (da1_dx - v * dd_dx) * inv_d;
                let dv_dy = (da1_dy - v * dd_dy) * inv_d;

                best_depth[pi] = depth;
                covered[pi] = true;
                let r = rast.pixel_mut(px, py);
                r[0] = u;
                r[1] = v;
                r[2] = depth;
                r[3] = (tri_idx + 1) as f32;
                let g = db.pixel_mut(px, py);
                g[0] = du_dx;
                g[1] = du_dy;
                g[2] = dv_dx;
                g[3] = dv_dy;
            }
        }
    }

    if near_skipped > 0 {
        log::warn!("skipped {near_skipped} triangles touching the near plane (no clipping)");
    }

    // Uncovered pixels stay at +inf so deeper peels terminate there.
    for (pi, c) in covered.iter().enumerate() {
        if !c {
            best_depth[pi] = f32::INFINITY;
        }
    }

    (RasterBuffer::new(rast), db, best_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Two triangles covering all of NDC: a full-frame quad at z = 0.
    fn fullscreen_quad(z: f32) -> (Vec<Vector4<f32>>, Vec<[u32; 3]>) {
        let clip = vec![
            Vector4::new(-1.0, -1.0, z, 1.0),
            Vector4::new(3.0, -1.0, z, 1.0),
            Vector4::new(-1.0, 3.0, z, 1.0),
        ];
        (clip, vec![[0, 1, 2]])
    }

    #[test]
    fn test_fullscreen_triangle_covers_everything() {
        let (clip, idx) = fullscreen_quad(0.0);
        let (rast, _db) = ReferenceRasterizer.rasterize(&clip, &idx, 8, 8);
        for y in 0..8 {
            for x in 0..8 {
                assert!(rast.covered(x, y), "pixel ({x},{y}) uncovered");
                assert_eq!(rast.triangle(x, y), Some(0));
            }
        }
    }

    #[test]
    fn test_barycentrics_sum_below_one() {
        let (clip, idx) = fullscreen_quad(0.0);
        let (rast, _db) = ReferenceRasterizer.rasterize(&clip, &idx, 8, 8);
        for y in 0..8 {
            for x in 0..8 {
                let (u, v) = rast.bary(x, y);
                assert!(u >= 0.0 && v >= 0.0 && u + v <= 1.0 + 1e-5);
            }
        }
    }

    #[test]
    fn test_depth_peeling_orders_front_to_back() {
        // Two full-frame triangles at different depths.
        let mut clip = fullscreen_quad(0.2).0;
        clip.extend(fullscreen_quad(0.7).0);
        let idx = vec![[0, 1, 2], [3, 4, 5]];

        let mut peeler = ReferenceRasterizer.depth_peeler(&clip, &idx, 4, 4);
        let (layer0, _) = peeler.rasterize_next_layer();
        let (layer1, _) = peeler.rasterize_next_layer();
        let (layer2, _) = peeler.rasterize_next_layer();

        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(layer0.triangle(x, y), Some(0));
                assert_relative_eq!(layer0.depth(x, y), 0.2, epsilon = 1e-5);
                assert_eq!(layer1.triangle(x, y), Some(1));
                assert_relative_eq!(layer1.depth(x, y), 0.7, epsilon = 1e-5);
                assert!(!layer2.covered(x, y));
            }
        }
    }

    #[test]
    fn test_perspective_correct_midpoint() {
        // One vertex twice as far as the others pulls the perspective-correct
        // center towards the near vertices.
        let clip = vec![
            Vector4::new(-2.0, -2.0, 0.0, 2.0),
            Vector4::new(1.0, -1.0, 0.0, 1.0),
            Vector4::new(-1.0, 1.0, 0.0, 1.0),
        ];
        let idx = vec![[0, 1, 2]];
        let (rast, _db) = ReferenceRasterizer.rasterize(&clip, &idx, 9, 9);

        let mut saw_covered = false;
        for y in 0..9 {
            for x in 0..9 {
                if let Some(_t) = rast.triangle(x, y) {
                    saw_covered = true;
                    let (u, v) = rast.bary(x, y);
                    assert!(u >= 0.0 && v >= 0.0 && u + v <= 1.0 + 1e-5);
                }
            }
        }
        assert!(saw_covered);
    }

    #[test]
    fn test_derivative_sign_matches_finite_difference() {
        let (clip, idx) = fullscreen_quad(0.0);
        let (rast, db) = ReferenceRasterizer.rasterize(&clip, &idx, 16, 16);

        // u varies linearly across the full-frame triangle; compare the
        // analytic derivative against the per-pixel difference.
        let (u_a, _) = rast.bary(4, 8);
        let (u_b, _) = rast.bary(5, 8);
        let du_dx = db.get(4, 8, 0);
        assert_relative_eq!(u_b - u_a, du_dx, epsilon = 1e-4);
    }
}
