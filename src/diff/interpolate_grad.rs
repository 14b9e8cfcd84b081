//! Gradients for barycentric attribute interpolation.
//!
//! Forward (per covered pixel): out = a0*u + a1*v + a2*(1-u-v).
//! The backward pass scatter-adds the weighted upstream gradient back onto
//! the three vertices of the covering triangle. Gradients w.r.t. the
//! barycentrics themselves belong to the rasterizer's own backward rule and
//! are not produced here.

use crate::core::buffer::FieldBuffer;
use crate::raster::RasterBuffer;

/// Backward pass: per-pixel upstream gradients -> per-vertex attribute
/// gradients (flat layout, `channels` floats per vertex).
pub fn interpolate_backward(
    d_out: &FieldBuffer,
    channels: usize,
    num_vertices: usize,
    indices: &[[u32; 3]],
    rast: &RasterBuffer,
) -> Vec<f32> {
    assert_eq!(d_out.channels(), channels);
    let mut d_attr = vec![0.0f32; num_vertices * channels];

    for y in 0..d_out.height() {
        for x in 0..d_out.width() {
            let Some(tri) = rast.triangle(x, y) else {
                continue;
            };
            let [i0, i1, i2] = indices[tri];
            let (u, v) = rast.bary(x, y);
            let w2 = 1.0 - u - v;
            let g = d_out.pixel(x, y);
            for c in 0..channels {
                d_attr[i0 as usize * channels + c] += g[c] * u;
                d_attr[i1 as usize * channels + c] += g[c] * v;
                d_attr[i2 as usize * channels + c] += g[c] * w2;
            }
        }
    }
    d_attr
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_backward_weights_partition_unity() {
        // One covered pixel with weights (0.2, 0.3, 0.5): the scattered
        // gradient mass equals the upstream gradient.
        let mut rast = FieldBuffer::zeros(1, 1, 4);
        let p = rast.pixel_mut(0, 0);
        p[0] = 0.2;
        p[1] = 0.3;
        p[3] = 1.0;
        let rast = RasterBuffer::new(rast);

        let mut d_out = FieldBuffer::zeros(1, 1, 2);
        d_out.set(0, 0, 0, 1.0);
        d_out.set(0, 0, 1, 2.0);

        let d_attr = interpolate_backward(&d_out, 2, 3, &[[0, 1, 2]], &rast);
        assert_relative_eq!(d_attr[0], 0.2, epsilon = 1e-6);
        assert_relative_eq!(d_attr[2], 0.3, epsilon = 1e-6);
        assert_relative_eq!(d_attr[4], 0.5, epsilon = 1e-6);
        // Second channel scales by its own upstream gradient.
        assert_relative_eq!(d_attr[1], 0.4, epsilon = 1e-6);
        let total: f32 = (0..3).map(|i| d_attr[i * 2]).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_backward_uncovered_pixels_contribute_nothing() {
        let rast = RasterBuffer::new(FieldBuffer::zeros(2, 2, 4));
        let d_out = FieldBuffer::filled(2, 2, 1, 1.0);
        let d_attr = interpolate_backward(&d_out, 1, 3, &[[0, 1, 2]], &rast);
        assert!(d_attr.iter().all(|&v| v == 0.0));
    }
}
