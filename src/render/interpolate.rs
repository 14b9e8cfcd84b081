//! Barycentric attribute interpolation.
//!
//! Maps per-vertex attributes plus the rasterizer's barycentric record to
//! per-pixel values, optionally with screen-space derivatives of every
//! channel. The backward counterpart lives in `diff::interpolate_grad`.

use nalgebra::{Vector2, Vector3, Vector4};
use rayon::prelude::*;

use crate::core::buffer::FieldBuffer;
use crate::raster::RasterBuffer;

/// Flatten a vector-2 attribute array into contiguous floats.
pub fn flatten_vec2(attr: &[Vector2<f32>]) -> Vec<f32> {
    let mut out = Vec::with_capacity(attr.len() * 2);
    for v in attr {
        out.extend_from_slice(&[v.x, v.y]);
    }
    out
}

/// Flatten a vector-3 attribute array into contiguous floats.
pub fn flatten_vec3(attr: &[Vector3<f32>]) -> Vec<f32> {
    let mut out = Vec::with_capacity(attr.len() * 3);
    for v in attr {
        out.extend_from_slice(&[v.x, v.y, v.z]);
    }
    out
}

/// Flatten a homogeneous clip-position array into contiguous floats.
pub fn flatten_vec4(attr: &[Vector4<f32>]) -> Vec<f32> {
    let mut out = Vec::with_capacity(attr.len() * 4);
    for v in attr {
        out.extend_from_slice(&[v.x, v.y, v.z, v.w]);
    }
    out
}

#[inline]
fn gather<'a>(attr: &'a [f32], channels: usize, vertex: u32) -> &'a [f32] {
    let base = vertex as usize * channels;
    &attr[base..base + channels]
}

/// Interpolate a per-vertex attribute at every covered pixel.
///
/// `attr` is a contiguous row-major vertex array (`channels` floats per
/// vertex; callers flatten into a contiguous copy first). Uncovered pixels
/// yield zeros.
pub fn interpolate(
    attr: &[f32],
    channels: usize,
    indices: &[[u32; 3]],
    rast: &RasterBuffer,
) -> FieldBuffer {
    let (w, h) = (rast.width(), rast.height());
    let mut out = FieldBuffer::zeros(w, h, channels);

    out.data_mut()
        .par_chunks_mut(w * channels)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let Some(tri) = rast.triangle(x, y) else {
                    continue;
                };
                let [i0, i1, i2] = indices[tri];
                let (u, v) = rast.bary(x, y);
                let a0 = gather(attr, channels, i0);
                let a1 = gather(attr, channels, i1);
                let a2 = gather(attr, channels, i2);
                let w2 = 1.0 - u - v;
                for c in 0..channels {
                    row[x * channels + c] = a0[c] * u + a1[c] * v + a2[c] * w2;
                }
            }
        });
    out
}

/// Interpolate an attribute and its screen-space derivatives.
///
/// The derivative buffer from the rasterizer carries
/// (du/dx, du/dy, dv/dx, dv/dy); the attribute derivative follows by the
/// chain rule `dA/dX = (a0 - a2) du/dX + (a1 - a2) dv/dX`. Output layout is
/// `[channel * 2 + axis]` with axis 0 = x, 1 = y.
pub fn interpolate_with_derivs(
    attr: &[f32],
    channels: usize,
    indices: &[[u32; 3]],
    rast: &RasterBuffer,
    rast_db: &FieldBuffer,
) -> (FieldBuffer, FieldBuffer) {
    assert_eq!(rast_db.channels(), 4, "derivative buffer must be 4 channels");
    let (w, h) = (rast.width(), rast.height());
    let value = interpolate(attr, channels, indices, rast);

    let mut deriv = FieldBuffer::zeros(w, h, channels * 2);
    deriv
        .data_mut()
        .par_chunks_mut(w * channels * 2)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let Some(tri) = rast.triangle(x, y) else {
                    continue;
                };
                let [i0, i1, i2] = indices[tri];
                let db = rast_db.pixel(x, y);
                let a0 = gather(attr, channels, i0);
                let a1 = gather(attr, channels, i1);
                let a2 = gather(attr, channels, i2);
                for c in 0..channels {
                    let e0 = a0[c] - a2[c];
                    let e1 = a1[c] - a2[c];
                    row[x * channels * 2 + c * 2] = e0 * db[0] + e1 * db[2];
                    row[x * channels * 2 + c * 2 + 1] = e0 * db[1] + e1 * db[3];
                }
            }
        });

    (value, deriv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single_pixel_rast(u: f32, v: f32, tri: usize) -> RasterBuffer {
        let mut buf = FieldBuffer::zeros(1, 1, 4);
        let p = buf.pixel_mut(0, 0);
        p[0] = u;
        p[1] = v;
        p[2] = 0.5;
        p[3] = (tri + 1) as f32;
        RasterBuffer::new(buf)
    }

    #[test]
    fn test_interpolate_vertex_recovery() {
        // Weight fully on vertex 0 recovers its attribute.
        let attr = [1.0, 2.0, 3.0, /* v1 */ 4.0, 5.0, 6.0, /* v2 */ 7.0, 8.0, 9.0];
        let rast = single_pixel_rast(1.0, 0.0, 0);
        let out = interpolate(&attr, 3, &[[0, 1, 2]], &rast);
        assert_relative_eq!(out.get(0, 0, 0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(out.get(0, 0, 2), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_interpolate_centroid_average() {
        let attr = [3.0, /* v1 */ 6.0, /* v2 */ 9.0];
        let third = 1.0 / 3.0;
        let rast = single_pixel_rast(third, third, 0);
        let out = interpolate(&attr, 1, &[[0, 1, 2]], &rast);
        assert_relative_eq!(out.get(0, 0, 0), 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_uncovered_pixels_are_zero() {
        let attr = [1.0, 1.0, 1.0];
        let rast = RasterBuffer::new(FieldBuffer::zeros(2, 2, 4));
        let out = interpolate(&attr, 1, &[[0, 1, 2]], &rast);
        for &v in out.data() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_derivative_chain_rule() {
        let attr = [10.0, /* v1 */ 20.0, /* v2 */ 40.0];
        let rast = single_pixel_rast(0.25, 0.25, 0);
        let mut db = FieldBuffer::zeros(1, 1, 4);
        let p = db.pixel_mut(0, 0);
        p[0] = 0.1; // du/dx
        p[1] = 0.0;
        p[2] = 0.0;
        p[3] = 0.2; // dv/dy

        let (_val, deriv) = interpolate_with_derivs(&attr, 1, &[[0, 1, 2]], &rast, &db);
        // dA/dx = (a0 - a2) * du/dx = (10 - 40) * 0.1
        assert_relative_eq!(deriv.get(0, 0, 0), -3.0, epsilon = 1e-5);
        // dA/dy = (a1 - a2) * dv/dy = (20 - 40) * 0.2
        assert_relative_eq!(deriv.get(0, 0, 1), -4.0, epsilon = 1e-5);
    }
}
