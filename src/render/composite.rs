//! Depth-peeled mesh rendering and layer compositing.
//!
//! Drives the peeling loop front-to-back, shades each layer, then folds the
//! layers back-to-front over the background with per-buffer alpha. The
//! primary `shaded` buffer additionally gets a silhouette antialiasing pass
//! after each blend so rasterization edges stay differentiable; auxiliary
//! buffers skip it.

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

use crate::core::buffer::FieldBuffer;
use crate::core::{Camera, Mesh};
use crate::error::RenderError;
use crate::light::Light;
use crate::material::Bsdf;
use crate::raster::{RasterBuffer, Rasterizer};
use crate::render::layer::render_layer;
use crate::render::shade::{BufferKind, ShadeBuffers};
use crate::render::RenderAux;

/// Render configuration for [`render_mesh`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Target framebuffer width in pixels.
    pub width: usize,
    /// Target framebuffer height in pixels.
    pub height: usize,
    /// Supersampling factor; shading runs at `width*spp x height*spp` and
    /// the result is average-pooled back down.
    pub spp: usize,
    /// Number of depth-peeled layers.
    pub num_layers: usize,
    /// Shade at target resolution instead of the supersampled one.
    pub msaa: bool,
    /// Background image (3 channels, target resolution). Transparent black
    /// when absent.
    pub background: Option<FieldBuffer>,
    /// Overrides the material's BSDF when set.
    pub bsdf_override: Option<Bsdf>,
    /// Shadow intensity scale for the Monte-Carlo paths.
    pub shadow_scale: f32,
    /// Base seed for the stochastic regularizer taps; each layer offsets it.
    pub jitter_seed: u64,
}

impl RenderSettings {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            spp: 1,
            num_layers: 1,
            msaa: false,
            background: None,
            bsdf_override: None,
            shadow_scale: 1.0,
            jitter_seed: 0,
        }
    }
}

/// Render a depth-peeled mesh to composited shading buffers at the target
/// resolution. Single mesh, single light, single material.
pub fn render_mesh(
    rasterizer: &dyn Rasterizer,
    mesh: &Mesh,
    camera: &Camera,
    light: &Light,
    settings: &RenderSettings,
    aux: &RenderAux<'_>,
) -> Result<ShadeBuffers, RenderError> {
    mesh.require_triangles()?;
    mesh.require_shading_attributes()?;

    if let Some(bg) = &settings.background {
        if bg.width() != settings.width || bg.height() != settings.height {
            return Err(RenderError::BackgroundSize {
                got_w: bg.width(),
                got_h: bg.height(),
                want_w: settings.width,
                want_h: settings.height,
            });
        }
    }

    let spp = settings.spp.max(1);
    let num_layers = settings.num_layers.max(1);
    let full_w = settings.width * spp;
    let full_h = settings.height * spp;

    // Clip space transform.
    let v_pos_clip = camera.to_clip(&mesh.v_pos);

    // Render all layers front-to-back.
    let mut layers: Vec<(ShadeBuffers, RasterBuffer)> = Vec::with_capacity(num_layers);
    {
        let mut peeler = rasterizer.depth_peeler(&v_pos_clip, &mesh.t_pos_idx, full_w, full_h);
        for layer_idx in 0..num_layers {
            let (rast, deriv) = peeler.rasterize_next_layer();
            let buffers = render_layer(
                &v_pos_clip,
                &rast,
                &deriv,
                mesh,
                camera.position,
                light,
                [settings.width, settings.height],
                spp,
                settings.msaa,
                settings.bsdf_override,
                settings.shadow_scale,
                settings.jitter_seed.wrapping_add(layer_idx as u64),
                aux,
            )?;
            layers.push((buffers, rast));
        }
    }

    // Setup background: upsample to the supersampled resolution and append
    // a fully transparent alpha channel.
    let background = match &settings.background {
        Some(bg) => {
            let bg = if spp > 1 {
                bg.scale_nearest(full_w, full_h)
            } else {
                bg.clone()
            };
            let alpha = FieldBuffer::zeros(full_w, full_h, 1);
            FieldBuffer::concat(&[&bg, &alpha])
        }
        None => FieldBuffer::zeros(full_w, full_h, 4),
    };

    // Composite layers front-to-back (reverse iteration = back-to-front).
    let composite = |kind: BufferKind, antialias_edges: bool| -> Option<FieldBuffer> {
        layers[0].0.get(kind)?;
        let bg = if kind == BufferKind::Shaded {
            background.clone()
        } else {
            FieldBuffer::zeros(full_w, full_h, 4)
        };
        let mut accum = bg;
        for (buffers, rast) in layers.iter().rev() {
            let buf = buffers.get(kind).expect("buffer present in every layer");
            blend_layer(&mut accum, buf, rast);
            if antialias_edges {
                accum = antialias(&accum, rast, &v_pos_clip, &mesh.t_pos_idx);
            }
        }
        // Downscale to framebuffer resolution with average pooling.
        Some(if spp > 1 { accum.avg_pool(spp) } else { accum })
    };

    Ok(ShadeBuffers {
        shaded: composite(BufferKind::Shaded, true).expect("shaded always present"),
        kd_grad: composite(BufferKind::KdGrad, false).expect("kd_grad always present"),
        ks_grad: composite(BufferKind::KsGrad, false).expect("ks_grad always present"),
        normal_grad: composite(BufferKind::NormalGrad, false).expect("normal_grad always present"),
        occlusion: composite(BufferKind::Occlusion, false).expect("occlusion always present"),
        gb_pos: composite(BufferKind::Position, false).expect("gb_pos always present"),
        gb_normal: composite(BufferKind::Normal, false).expect("gb_normal always present"),
        perturbed_nrm_grad: composite(BufferKind::PerturbedNormalGrad, false),
        diffuse_light: composite(BufferKind::DiffuseLight, false),
        specular_light: composite(BufferKind::SpecularLight, false),
    })
}

/// Blend one layer over the running accumulator:
/// `alpha = covered * buffer_alpha; accum = lerp(accum, [rgb, 1], alpha)`.
fn blend_layer(accum: &mut FieldBuffer, buf: &FieldBuffer, rast: &RasterBuffer) {
    for y in 0..accum.height() {
        for x in 0..accum.width() {
            let covered = if rast.covered(x, y) { 1.0 } else { 0.0 };
            let src = buf.pixel(x, y);
            let alpha = covered * src[3];
            let dst = accum.pixel_mut(x, y);
            for c in 0..3 {
                dst[c] += (src[c] - dst[c]) * alpha;
            }
            dst[3] += (1.0 - dst[3]) * alpha;
        }
    }
}

/// Screen-space triangle for the antialiasing edge test.
struct AaTriangle {
    x: [f32; 3],
    y: [f32; 3],
}

fn aa_triangle(
    clip: &[Vector4<f32>],
    tri: &[u32; 3],
    width: usize,
    height: usize,
) -> Option<AaTriangle> {
    let mut x = [0.0f32; 3];
    let mut y = [0.0f32; 3];
    for k in 0..3 {
        let v = clip[tri[k] as usize];
        if v.w <= 1e-6 {
            return None;
        }
        let inv_w = 1.0 / v.w;
        x[k] = (v.x * inv_w * 0.5 + 0.5) * width as f32;
        y[k] = (v.y * inv_w * 0.5 + 0.5) * height as f32;
    }
    Some(AaTriangle { x, y })
}

/// Parametric exit point of the triangle along the segment from `p0` in
/// direction `dir` (unit pixel step), or `None` when the segment stays
/// inside for the whole step.
fn edge_exit(t: &AaTriangle, p0: (f32, f32), dir: (f32, f32)) -> Option<f32> {
    let mut t_exit = f32::INFINITY;
    for i in 0..3 {
        let (ax, ay) = (t.x[i], t.y[i]);
        let (bx, by) = (t.x[(i + 1) % 3], t.y[(i + 1) % 3]);
        // Edge function e(P) = cross(b - a, P - a); sign convention follows
        // the triangle winding, so normalize by the third vertex.
        let (cx, cy) = (t.x[(i + 2) % 3], t.y[(i + 2) % 3]);
        let mut ex = by - ay;
        let mut ey = -(bx - ax);
        // Orient the edge normal inward.
        if ex * (cx - ax) + ey * (cy - ay) < 0.0 {
            ex = -ex;
            ey = -ey;
        }
        let e0 = ex * (p0.0 - ax) + ey * (p0.1 - ay);
        let de = ex * dir.0 + ey * dir.1;
        if de < 0.0 {
            let ti = -e0 / de;
            if ti >= 0.0 && ti < t_exit {
                t_exit = ti;
            }
        }
    }
    if t_exit.is_finite() && t_exit < 1.0 {
        Some(t_exit.max(0.0))
    } else {
        None
    }
}

/// Silhouette antialiasing: for adjacent pixel pairs spanning a coverage
/// discontinuity, locate the covering triangle's edge between the two pixel
/// centers and shift the losing pixel toward its neighbor by the sub-pixel
/// coverage excess. Interior pixels are untouched; the blend is a pure lerp
/// of already-composited colors, so gradients flow through it.
pub fn antialias(
    accum: &FieldBuffer,
    rast: &RasterBuffer,
    clip: &[Vector4<f32>],
    indices: &[[u32; 3]],
) -> FieldBuffer {
    let (w, h) = (accum.width(), accum.height());
    let mut out = accum.clone();

    let visit = |out: &mut FieldBuffer, ax: usize, ay: usize, bx: usize, by: usize| {
        let a_cov = rast.covered(ax, ay);
        let b_cov = rast.covered(bx, by);
        if a_cov == b_cov {
            return;
        }
        // p is the covered side, q the uncovered one.
        let ((px, py), (qx, qy)) = if a_cov {
            ((ax, ay), (bx, by))
        } else {
            ((bx, by), (ax, ay))
        };
        let Some(tri) = rast.triangle(px, py) else {
            return;
        };
        let Some(t) = aa_triangle(clip, &indices[tri], w, h) else {
            return;
        };
        let p_center = (px as f32 + 0.5, py as f32 + 0.5);
        let dir = (qx as f32 - px as f32, qy as f32 - py as f32);
        let Some(t_exit) = edge_exit(&t, p_center, dir) else {
            return;
        };

        if t_exit > 0.5 {
            // The silhouette reaches past the pixel boundary: the uncovered
            // pixel is partially covered.
            let wgt = t_exit - 0.5;
            let src = accum.pixel(px, py).to_vec();
            let dst = out.pixel_mut(qx, qy);
            for c in 0..dst.len() {
                dst[c] += (src[c] - dst[c]) * wgt;
            }
        } else {
            // The silhouette stops short of the boundary: the covered pixel
            // is partially uncovered.
            let wgt = 0.5 - t_exit;
            let src = accum.pixel(qx, qy).to_vec();
            let dst = out.pixel_mut(px, py);
            for c in 0..dst.len() {
                dst[c] += (src[c] - dst[c]) * wgt;
            }
        }
    };

    for y in 0..h {
        for x in 0..w.saturating_sub(1) {
            visit(&mut out, x, y, x + 1, y);
        }
    }
    for y in 0..h.saturating_sub(1) {
        for x in 0..w {
            visit(&mut out, x, y, x, y + 1);
        }
    }
    out
}
