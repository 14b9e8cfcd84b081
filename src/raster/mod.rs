//! Rasterization contracts and the per-pixel rasterization record.
//!
//! The shading stage does not rasterize; it consumes rasterization buffers
//! produced behind these traits. A reference CPU implementation lives in
//! [`reference`] for tests and standalone use.

pub mod reference;

use nalgebra::Vector4;

use crate::core::buffer::FieldBuffer;

pub use reference::ReferenceRasterizer;

/// Per-pixel rasterization record, 4 channels:
/// (perspective-correct barycentric u, barycentric v, normalized device z,
/// triangle id + 1). A pixel is covered iff the last channel is > 0.
#[derive(Clone, Debug)]
pub struct RasterBuffer {
    buf: FieldBuffer,
}

impl RasterBuffer {
    pub fn new(buf: FieldBuffer) -> Self {
        assert_eq!(buf.channels(), 4, "rasterization buffer must be 4 channels");
        Self { buf }
    }

    pub fn field(&self) -> &FieldBuffer {
        &self.buf
    }

    pub fn width(&self) -> usize {
        self.buf.width()
    }

    pub fn height(&self) -> usize {
        self.buf.height()
    }

    #[inline]
    pub fn covered(&self, x: usize, y: usize) -> bool {
        self.buf.get(x, y, 3) > 0.0
    }

    /// Zero-based triangle id, `None` when uncovered.
    #[inline]
    pub fn triangle(&self, x: usize, y: usize) -> Option<usize> {
        let id = self.buf.get(x, y, 3);
        if id > 0.0 {
            Some(id as usize - 1)
        } else {
            None
        }
    }

    /// Barycentric interpolation weights (u, v) of vertices 0 and 1.
    #[inline]
    pub fn bary(&self, x: usize, y: usize) -> (f32, f32) {
        (self.buf.get(x, y, 0), self.buf.get(x, y, 1))
    }

    /// Normalized device depth of the covering fragment.
    #[inline]
    pub fn depth(&self, x: usize, y: usize) -> f32 {
        self.buf.get(x, y, 2)
    }

    /// Coverage as a 1-channel 0/1 float mask.
    pub fn coverage_mask(&self) -> FieldBuffer {
        let mut out = FieldBuffer::zeros(self.width(), self.height(), 1);
        for y in 0..self.height() {
            for x in 0..self.width() {
                if self.covered(x, y) {
                    out.set(x, y, 0, 1.0);
                }
            }
        }
        out
    }

    /// Nearest-neighbor rescale (used when MSAA shades below the
    /// supersampled resolution).
    pub fn scale_nearest(&self, width: usize, height: usize) -> Self {
        Self {
            buf: self.buf.scale_nearest(width, height),
        }
    }
}

/// Single-layer rasterization.
pub trait Rasterizer {
    /// Rasterize clip-space triangles, returning the rasterization buffer
    /// and the screen-space barycentric derivative buffer
    /// (du/dx, du/dy, dv/dx, dv/dy).
    fn rasterize(
        &self,
        clip: &[Vector4<f32>],
        indices: &[[u32; 3]],
        width: usize,
        height: usize,
    ) -> (RasterBuffer, FieldBuffer);

    /// Open a depth-peeling scope over the same inputs. Each call to
    /// `rasterize_next_layer` returns the next-nearest surface per pixel,
    /// front to back.
    fn depth_peeler<'a>(
        &self,
        clip: &'a [Vector4<f32>],
        indices: &'a [[u32; 3]],
        width: usize,
        height: usize,
    ) -> Box<dyn DepthPeeler + 'a>;
}

/// Scoped depth-peeling resource; called exactly `num_layers` times per
/// render, front to back.
pub trait DepthPeeler {
    fn rasterize_next_layer(&mut self) -> (RasterBuffer, FieldBuffer);
}
