//! Per-pixel field storage (the H×W×C image tensor every stage works on).
//!
//! All shading math in this crate is expressed as whole-buffer operations
//! over `FieldBuffer`s: row-major `f32` data, `channels` values per pixel.
//! Boundary-clamped bilinear sampling doubles as the stochastic tap lookup
//! used by the finite-difference regularizers.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A row-major H×W×C float image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldBuffer {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f32>,
}

impl FieldBuffer {
    /// All-zero buffer.
    pub fn zeros(width: usize, height: usize, channels: usize) -> Self {
        Self::filled(width, height, channels, 0.0)
    }

    /// Constant-valued buffer.
    pub fn filled(width: usize, height: usize, channels: usize, value: f32) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![value; width * height * channels],
        }
    }

    /// Wrap existing row-major data.
    pub fn from_raw(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height * channels, "raw data length mismatch");
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn base(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.channels
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let b = self.base(x, y);
        &self.data[b..b + self.channels]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [f32] {
        let b = self.base(x, y);
        let c = self.channels;
        &mut self.data[b..b + c]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[self.base(x, y) + c]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, v: f32) {
        let i = self.base(x, y) + c;
        self.data[i] = v;
    }

    /// Read channels `c0..c0+3` as a vector.
    #[inline]
    pub fn get_vec3(&self, x: usize, y: usize, c0: usize) -> Vector3<f32> {
        let b = self.base(x, y) + c0;
        Vector3::new(self.data[b], self.data[b + 1], self.data[b + 2])
    }

    /// Write channels `c0..c0+3` from a vector.
    #[inline]
    pub fn set_vec3(&mut self, x: usize, y: usize, c0: usize, v: &Vector3<f32>) {
        let b = self.base(x, y) + c0;
        self.data[b] = v.x;
        self.data[b + 1] = v.y;
        self.data[b + 2] = v.z;
    }

    /// Bilinear tap at normalized coordinates (u, v) in [0,1]², clamped at
    /// the border. Texel centers sit at `(x + 0.5) / width`.
    pub fn sample_bilinear(&self, u: f32, v: f32, out: &mut [f32]) {
        assert_eq!(out.len(), self.channels);

        let fx = (u * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let p00 = self.pixel(x0, y0);
        let p10 = self.pixel(x1, y0);
        let p01 = self.pixel(x0, y1);
        let p11 = self.pixel(x1, y1);

        for c in 0..self.channels {
            let top = p00[c] * (1.0 - tx) + p10[c] * tx;
            let bottom = p01[c] * (1.0 - tx) + p11[c] * tx;
            out[c] = top * (1.0 - ty) + bottom * ty;
        }
    }

    /// Nearest-neighbor rescale to a new resolution (both mag and min).
    pub fn scale_nearest(&self, new_width: usize, new_height: usize) -> Self {
        let mut out = Self::zeros(new_width, new_height, self.channels);
        let sx = self.width as f32 / new_width as f32;
        let sy = self.height as f32 / new_height as f32;
        for y in 0..new_height {
            let src_y = ((y as f32 + 0.5) * sy) as usize;
            let src_y = src_y.min(self.height - 1);
            for x in 0..new_width {
                let src_x = ((x as f32 + 0.5) * sx) as usize;
                let src_x = src_x.min(self.width - 1);
                let b = out.base(x, y);
                let src = self.pixel(src_x, src_y);
                out.data[b..b + self.channels].copy_from_slice(src);
            }
        }
        out
    }

    /// Box-filter average pooling by an integer factor.
    pub fn avg_pool(&self, factor: usize) -> Self {
        assert!(factor > 0);
        assert_eq!(self.width % factor, 0, "width not divisible by pool factor");
        assert_eq!(self.height % factor, 0, "height not divisible by pool factor");

        let out_w = self.width / factor;
        let out_h = self.height / factor;
        let mut out = Self::zeros(out_w, out_h, self.channels);
        let norm = 1.0 / (factor * factor) as f32;

        for oy in 0..out_h {
            for ox in 0..out_w {
                let b = out.base(ox, oy);
                for sy in 0..factor {
                    for sx in 0..factor {
                        let src = self.pixel(ox * factor + sx, oy * factor + sy);
                        for c in 0..self.channels {
                            out.data[b + c] += src[c];
                        }
                    }
                }
                for c in 0..self.channels {
                    out.data[b + c] *= norm;
                }
            }
        }
        out
    }

    /// Extract a channel range into a new buffer.
    pub fn channel_slice(&self, range: Range<usize>) -> Self {
        assert!(range.end <= self.channels);
        let n = range.len();
        let mut out = Self::zeros(self.width, self.height, n);
        for y in 0..self.height {
            for x in 0..self.width {
                let src = self.pixel(x, y);
                let b = out.base(x, y);
                out.data[b..b + n].copy_from_slice(&src[range.clone()]);
            }
        }
        out
    }

    /// Concatenate buffers along the channel axis.
    pub fn concat(parts: &[&FieldBuffer]) -> Self {
        assert!(!parts.is_empty());
        let (w, h) = (parts[0].width, parts[0].height);
        let channels = parts.iter().map(|p| p.channels).sum();
        for p in parts {
            assert_eq!((p.width, p.height), (w, h), "concat resolution mismatch");
        }

        let mut out = Self::zeros(w, h, channels);
        for y in 0..h {
            for x in 0..w {
                let b = out.base(x, y);
                let mut off = 0;
                for p in parts {
                    let src = p.pixel(x, y);
                    out.data[b + off..b + off + p.channels].copy_from_slice(src);
                    off += p.channels;
                }
            }
        }
        out
    }

    /// Elementwise map into a new buffer.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Elementwise combine with another buffer of identical shape.
    pub fn zip_map(&self, other: &FieldBuffer, f: impl Fn(f32, f32) -> f32) -> Self {
        assert_eq!(
            (self.width, self.height, self.channels),
            (other.width, other.height, other.channels),
            "zip_map shape mismatch"
        );
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Multiply every channel by a per-pixel single-channel weight.
    pub fn scale_by(&self, weight: &FieldBuffer) -> Self {
        assert_eq!(weight.channels, 1, "weight must be single channel");
        assert_eq!((self.width, self.height), (weight.width, weight.height));
        let mut out = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                let w = weight.get(x, y, 0);
                for v in out.pixel_mut(x, y) {
                    *v *= w;
                }
            }
        }
        out
    }
}

/// Normalized pixel-center grid: channel 0 = (x + 0.5) / width,
/// channel 1 = (y + 0.5) / height. Tap coordinates for the jittered
/// regularizer lookups.
pub fn pixel_grid(width: usize, height: usize) -> FieldBuffer {
    let mut out = FieldBuffer::zeros(width, height, 2);
    for y in 0..height {
        for x in 0..width {
            out.set(x, y, 0, (x as f32 + 0.5) / width as f32);
            out.set(x, y, 1, (y as f32 + 0.5) / height as f32);
        }
    }
    out
}
