//! Sampler contracts consumed by the pixel shader, plus reference
//! implementations good enough for tests and texture baking experiments.
//!
//! Real deployments plug neural samplers in behind these traits; the shader
//! never sees anything but per-pixel channel buffers coming back.

use crate::core::buffer::FieldBuffer;

/// Positional sampler (MLP-shaped): per-pixel channels from 3D positions.
pub trait FieldSampler: Send + Sync {
    /// Sample at per-pixel positions (3 channels). `cond` is an optional
    /// conditioning vector for deformable/template-space models; `mask`
    /// marks pixels whose output matters (1 channel, 0/1).
    fn sample(&self, pos: &FieldBuffer, cond: Option<&[f32]>, mask: &FieldBuffer) -> FieldBuffer;

    /// Number of channels `sample` produces.
    fn channels(&self) -> usize;
}

/// View-dependent radiance sampler.
pub trait RadianceSampler: Send + Sync {
    fn sample(
        &self,
        pos: &FieldBuffer,
        view_dir: &FieldBuffer,
        cond: Option<&[f32]>,
        mask: &FieldBuffer,
    ) -> FieldBuffer;

    fn channels(&self) -> usize;
}

/// Classic 2D texture sampled at interpolated texcoords, with screen-space
/// derivatives available for level-of-detail selection.
pub trait Texture2d: Send + Sync {
    fn sample(&self, uv: &FieldBuffer, uv_deriv: Option<&FieldBuffer>) -> FieldBuffer;

    fn channels(&self) -> usize;
}

/// Sampler returning the same channel values everywhere. The workhorse for
/// unit tests and constant-material renders.
pub struct ConstantField {
    values: Vec<f32>,
}

impl ConstantField {
    pub fn new(values: Vec<f32>) -> Self {
        assert!(!values.is_empty());
        Self { values }
    }

    fn fill(&self, width: usize, height: usize) -> FieldBuffer {
        let mut out = FieldBuffer::zeros(width, height, self.values.len());
        for y in 0..height {
            for x in 0..width {
                out.pixel_mut(x, y).copy_from_slice(&self.values);
            }
        }
        out
    }
}

impl FieldSampler for ConstantField {
    fn sample(&self, pos: &FieldBuffer, _cond: Option<&[f32]>, _mask: &FieldBuffer) -> FieldBuffer {
        self.fill(pos.width(), pos.height())
    }

    fn channels(&self) -> usize {
        self.values.len()
    }
}

impl RadianceSampler for ConstantField {
    fn sample(
        &self,
        pos: &FieldBuffer,
        _view_dir: &FieldBuffer,
        _cond: Option<&[f32]>,
        _mask: &FieldBuffer,
    ) -> FieldBuffer {
        self.fill(pos.width(), pos.height())
    }

    fn channels(&self) -> usize {
        self.values.len()
    }
}

impl Texture2d for ConstantField {
    fn sample(&self, uv: &FieldBuffer, _uv_deriv: Option<&FieldBuffer>) -> FieldBuffer {
        self.fill(uv.width(), uv.height())
    }

    fn channels(&self) -> usize {
        self.values.len()
    }
}

/// Bitmap texture with a box-filtered mip pyramid.
///
/// Level selection uses the larger texcoord derivative magnitude scaled by
/// the base resolution; sampling within the selected level is bilinear with
/// border clamp.
pub struct BitmapTexture {
    levels: Vec<FieldBuffer>,
}

impl BitmapTexture {
    pub fn new(base: FieldBuffer) -> Self {
        let mut levels = vec![base];
        loop {
            let next = {
                let last = levels.last().unwrap();
                if last.width() < 2
                    || last.height() < 2
                    || last.width() % 2 != 0
                    || last.height() % 2 != 0
                {
                    break;
                }
                last.avg_pool(2)
            };
            levels.push(next);
        }
        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn select_level(&self, deriv: Option<&[f32]>) -> usize {
        let Some(d) = deriv else { return 0 };
        // Footprint in texels of the base level, per pixel step.
        let base = &self.levels[0];
        let fu = d[0].abs().max(d[1].abs()) * base.width() as f32;
        let fv = d[2].abs().max(d[3].abs()) * base.height() as f32;
        let footprint = fu.max(fv).max(1e-6);
        let lod = footprint.log2().max(0.0).round() as usize;
        lod.min(self.levels.len() - 1)
    }
}

impl Texture2d for BitmapTexture {
    fn sample(&self, uv: &FieldBuffer, uv_deriv: Option<&FieldBuffer>) -> FieldBuffer {
        assert_eq!(uv.channels(), 2, "texcoord buffer must be 2 channels");
        if let Some(d) = uv_deriv {
            assert_eq!(d.channels(), 4, "texcoord derivative buffer must be 4 channels");
        }

        let channels = self.levels[0].channels();
        let mut out = FieldBuffer::zeros(uv.width(), uv.height(), channels);
        let mut texel = vec![0.0f32; channels];

        for y in 0..uv.height() {
            for x in 0..uv.width() {
                let st = uv.pixel(x, y);
                let level = self.select_level(uv_deriv.map(|d| d.pixel(x, y)));
                self.levels[level].sample_bilinear(st[0], st[1], &mut texel);
                out.pixel_mut(x, y).copy_from_slice(&texel);
            }
        }
        out
    }

    fn channels(&self) -> usize {
        self.levels[0].channels()
    }
}
