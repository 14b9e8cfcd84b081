//! The pixel shader: material sampling, regularizer gradients, normal
//! perturbation, and BSDF evaluation for one depth layer.
//!
//! All regularizers share one stochastic tap point per pixel (a jittered
//! pixel-center), so their finite-difference noise is correlated and cancels
//! in expectation. Coverage weighting zeroes the taps that straddle
//! silhouette edges.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::core::buffer::{pixel_grid, FieldBuffer};
use crate::core::safe_normalize;
use crate::error::RenderError;
use crate::light::{Denoiser, IntegratorInputs, Light, RaytraceContext};
use crate::material::{Bsdf, Material, MaterialChannels};
use crate::render::normal::prepare_shading_normal;

/// Screen-space jitter sigma for the regularizer tap point (UV units).
const JITTER_SIGMA_SCREEN: f32 = 0.005;
/// Position jitter sigma for MLP material gradients (world units).
const JITTER_SIGMA_POSITION: f32 = 0.01;
/// Texcoord jitter sigma for texture material gradients (UV units).
const JITTER_SIGMA_TEXCOORD: f32 = 0.005;
/// Ray origin offset along the shading normal, avoids self-intersection.
const RAY_ORIGIN_EPS: f32 = 0.001;

/// Bias added to canonical positions by the `corr` debug visualization.
fn corr_bias() -> Vector3<f32> {
    Vector3::new(1.0, 1.4, 1.0)
}

/// Per-pixel geometry buffers feeding one shade call.
pub struct ShadeInputs<'a> {
    /// World-space position (3ch).
    pub gb_pos: &'a FieldBuffer,
    /// Flat per-face geometric normal (3ch).
    pub gb_geometric_normal: &'a FieldBuffer,
    /// Interpolated smooth normal (3ch).
    pub gb_normal: &'a FieldBuffer,
    /// Interpolated tangent (3ch).
    pub gb_tangent: &'a FieldBuffer,
    /// Interpolated texture coordinates (2ch).
    pub gb_texc: &'a FieldBuffer,
    /// Screen-space texcoord derivatives (4ch).
    pub gb_texc_deriv: &'a FieldBuffer,
    /// Coverage mask (1ch, 0/1).
    pub mask: &'a FieldBuffer,
    /// Normalized device depth + depth gradient (2ch), denoiser guidance.
    pub gb_depth: &'a FieldBuffer,
    /// Canonical-space position for deformable models (3ch); world position
    /// is used when absent.
    pub cano_pos: Option<&'a FieldBuffer>,
    /// Conditioning vector for MLP materials.
    pub cond: Option<&'a [f32]>,
}

/// Scene-level shading configuration for one layer.
pub struct ShadeParams<'a> {
    /// Eye position in world space.
    pub view_pos: Vector3<f32>,
    pub light: &'a Light,
    pub material: &'a Material,
    /// Overrides the material's BSDF when set.
    pub bsdf_override: Option<Bsdf>,
    /// Required by the Monte-Carlo BSDF paths.
    pub raytrace: Option<&'a RaytraceContext>,
    pub denoiser: Option<&'a dyn Denoiser>,
    /// Shadow intensity scale forwarded to the integrator.
    pub shadow_scale: f32,
    /// Seed for the stochastic regularizer taps; renders are deterministic
    /// per seed.
    pub jitter_seed: u64,
}

/// The named per-layer shading outputs. Every buffer is 4 channels: payload
/// in channels 0..3 and the coverage-derived alpha in channel 3.
#[derive(Clone, Debug)]
pub struct ShadeBuffers {
    pub shaded: FieldBuffer,
    pub kd_grad: FieldBuffer,
    pub ks_grad: FieldBuffer,
    pub normal_grad: FieldBuffer,
    pub occlusion: FieldBuffer,
    pub gb_pos: FieldBuffer,
    pub gb_normal: FieldBuffer,
    /// Present when the material produced a perturbed normal.
    pub perturbed_nrm_grad: Option<FieldBuffer>,
    /// Demodulated diffuse accumulation, Monte-Carlo paths only.
    pub diffuse_light: Option<FieldBuffer>,
    /// Demodulated specular accumulation, Monte-Carlo paths only.
    pub specular_light: Option<FieldBuffer>,
}

/// Typed names for the shading buffers, in compositing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Shaded,
    KdGrad,
    KsGrad,
    NormalGrad,
    Occlusion,
    Position,
    Normal,
    PerturbedNormalGrad,
    DiffuseLight,
    SpecularLight,
}

impl BufferKind {
    pub const ALL: [BufferKind; 10] = [
        BufferKind::Shaded,
        BufferKind::KdGrad,
        BufferKind::KsGrad,
        BufferKind::NormalGrad,
        BufferKind::Occlusion,
        BufferKind::Position,
        BufferKind::Normal,
        BufferKind::PerturbedNormalGrad,
        BufferKind::DiffuseLight,
        BufferKind::SpecularLight,
    ];
}

impl ShadeBuffers {
    /// Buffer lookup by kind; `None` for optional buffers that this shade
    /// call did not produce.
    pub fn get(&self, kind: BufferKind) -> Option<&FieldBuffer> {
        match kind {
            BufferKind::Shaded => Some(&self.shaded),
            BufferKind::KdGrad => Some(&self.kd_grad),
            BufferKind::KsGrad => Some(&self.ks_grad),
            BufferKind::NormalGrad => Some(&self.normal_grad),
            BufferKind::Occlusion => Some(&self.occlusion),
            BufferKind::Position => Some(&self.gb_pos),
            BufferKind::Normal => Some(&self.gb_normal),
            BufferKind::PerturbedNormalGrad => self.perturbed_nrm_grad.as_ref(),
            BufferKind::DiffuseLight => self.diffuse_light.as_ref(),
            BufferKind::SpecularLight => self.specular_light.as_ref(),
        }
    }

    /// Apply a transform to every present buffer (MSAA rescaling).
    pub fn map(&self, f: impl Fn(&FieldBuffer) -> FieldBuffer) -> ShadeBuffers {
        ShadeBuffers {
            shaded: f(&self.shaded),
            kd_grad: f(&self.kd_grad),
            ks_grad: f(&self.ks_grad),
            normal_grad: f(&self.normal_grad),
            occlusion: f(&self.occlusion),
            gb_pos: f(&self.gb_pos),
            gb_normal: f(&self.gb_normal),
            perturbed_nrm_grad: self.perturbed_nrm_grad.as_ref().map(&f),
            diffuse_light: self.diffuse_light.as_ref().map(&f),
            specular_light: self.specular_light.as_ref().map(&f),
        }
    }
}

/// Standard normal sample via Box-Muller from two uniforms.
fn sample_gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// Add per-element Gaussian noise to a buffer.
fn jitter_buffer(src: &FieldBuffer, sigma: f32, rng: &mut StdRng) -> FieldBuffer {
    let mut out = src.clone();
    for v in out.data_mut() {
        *v += sample_gaussian(rng) * sigma;
    }
    out
}

/// Bilinear tap of `src` at per-pixel normalized coordinates.
fn tap_at(src: &FieldBuffer, coords: &FieldBuffer) -> FieldBuffer {
    assert_eq!(coords.channels(), 2);
    let (w, h, c) = (src.width(), src.height(), src.channels());
    let mut out = FieldBuffer::zeros(w, h, c);
    out.data_mut()
        .par_chunks_mut(w * c)
        .enumerate()
        .for_each(|(y, row)| {
            let mut texel = vec![0.0f32; c];
            for x in 0..w {
                let uv = coords.pixel(x, y);
                src.sample_bilinear(uv[0], uv[1], &mut texel);
                row[x * c..(x + 1) * c].copy_from_slice(&texel);
            }
        });
    out
}

fn abs_diff(a: &FieldBuffer, b: &FieldBuffer) -> FieldBuffer {
    a.zip_map(b, |x, y| (x - y).abs())
}

/// Zero the first channel of a specular gradient. Channel 0 is the
/// occlusion/roughness slot by material convention and is excluded from this
/// regularizer; only channels 1..3 participate.
fn mask_specular_grad(buf: &FieldBuffer) -> FieldBuffer {
    let mut out = buf.clone();
    for y in 0..out.height() {
        for x in 0..out.width() {
            out.set(x, y, 0, 0.0);
        }
    }
    out
}

fn broadcast_to_3(src: &FieldBuffer) -> FieldBuffer {
    assert_eq!(src.channels(), 1);
    let mut out = FieldBuffer::zeros(src.width(), src.height(), 3);
    for y in 0..src.height() {
        for x in 0..src.width() {
            let v = src.get(x, y, 0);
            out.set_vec3(x, y, 0, &Vector3::new(v, v, v));
        }
    }
    out
}

fn with_alpha(payload: &FieldBuffer, alpha: &FieldBuffer) -> FieldBuffer {
    FieldBuffer::concat(&[payload, alpha])
}

/// Result of the material sampling stage.
struct SampledMaterial {
    kd: FieldBuffer,
    ks: FieldBuffer,
    alpha: FieldBuffer,
    perturbed_nrm: Option<FieldBuffer>,
    kd_grad: FieldBuffer,
    ks_grad: FieldBuffer,
}

fn sample_material(
    inputs: &ShadeInputs<'_>,
    params: &ShadeParams<'_>,
    cano: &FieldBuffer,
    rng: &mut StdRng,
) -> Result<SampledMaterial, RenderError> {
    let (w, h) = (inputs.gb_pos.width(), inputs.gb_pos.height());

    let (kd_full, ks, perturbed_nrm, kd_grad, ks_grad) = match &params.material.channels {
        MaterialChannels::CombinedMlp(sampler) => {
            // One combined lookup; MLP evaluations are expensive enough that
            // kd/ks/normal share a single forward pass.
            let cano_jitter = jitter_buffer(cano, JITTER_SIGMA_POSITION, rng);
            let all_tex = sampler.sample(cano, inputs.cond, inputs.mask);
            let all_tex_jitter = sampler.sample(&cano_jitter, inputs.cond, inputs.mask);

            let c = all_tex.channels();
            if c != 9 && c != 10 {
                return Err(RenderError::CombinedChannelCount(c));
            }

            let kd_full = all_tex.channel_slice(0..c - 6);
            let ks = all_tex.channel_slice(c - 6..c - 3);
            let perturbed = all_tex.channel_slice(c - 3..c);

            let kd_grad = abs_diff(
                &all_tex_jitter.channel_slice(0..3),
                &all_tex.channel_slice(0..3),
            );
            let ks_grad = mask_specular_grad(&abs_diff(
                &all_tex_jitter.channel_slice(c - 6..c - 3),
                &ks,
            ));

            (kd_full, ks, Some(perturbed), kd_grad, ks_grad)
        }
        MaterialChannels::Radiance(sampler) => {
            // View direction per pixel; the field is queried once, and the
            // regularizer gradients are defined to be zero for radiance.
            let mut view_dir = FieldBuffer::zeros(w, h, 3);
            for y in 0..h {
                for x in 0..w {
                    let d = safe_normalize(&(params.view_pos - inputs.gb_pos.get_vec3(x, y, 0)));
                    view_dir.set_vec3(x, y, 0, &d);
                }
            }
            let all_tex = sampler.sample(cano, &view_dir, inputs.cond, inputs.mask);
            let zeros3 = FieldBuffer::zeros(w, h, 3);

            (all_tex, zeros3.clone(), None, zeros3.clone(), zeros3)
        }
        MaterialChannels::Textures { kd, ks, normal } => {
            let texc = inputs.gb_texc;
            let deriv = Some(inputs.gb_texc_deriv);

            let texc_jitter = jitter_buffer(texc, JITTER_SIGMA_TEXCOORD, rng);
            let kd_jitter = kd.sample(&texc_jitter, deriv);
            let texc_jitter = jitter_buffer(texc, JITTER_SIGMA_TEXCOORD, rng);
            let ks_jitter = ks.sample(&texc_jitter, deriv).channel_slice(0..3);

            let kd_full = kd.sample(texc, deriv);
            let ks_full = ks.sample(texc, deriv).channel_slice(0..3); // skip alpha
            let perturbed = normal.as_ref().map(|n| n.sample(texc, deriv));

            let kd_grad = abs_diff(&kd_jitter.channel_slice(0..3), &kd_full.channel_slice(0..3));
            let ks_grad = mask_specular_grad(&abs_diff(&ks_jitter, &ks_full));

            (kd_full, ks_full, perturbed, kd_grad, ks_grad)
        }
    };

    // Separate kd into alpha and color, default alpha = 1.
    let alpha = if kd_full.channels() == 4 {
        kd_full.channel_slice(3..4)
    } else {
        FieldBuffer::filled(w, h, 1, 1.0)
    };
    let kd = kd_full.channel_slice(0..3);

    Ok(SampledMaterial {
        kd,
        ks,
        alpha,
        perturbed_nrm,
        kd_grad,
        ks_grad,
    })
}

/// Shade one rasterized depth layer.
pub fn shade(
    inputs: &ShadeInputs<'_>,
    params: &ShadeParams<'_>,
) -> Result<ShadeBuffers, RenderError> {
    let (w, h) = (inputs.gb_pos.width(), inputs.gb_pos.height());
    let mut rng = StdRng::seed_from_u64(params.jitter_seed);

    // Shared stochastic tap point for all finite-difference regularizers.
    let jitter = jitter_buffer(&pixel_grid(w, h), JITTER_SIGMA_SCREEN, &mut rng);
    let mask_tap = tap_at(inputs.mask, &jitter);
    let grad_weight = inputs.mask.zip_map(&mask_tap, |a, b| a * b);

    let cano = inputs.cano_pos.unwrap_or(inputs.gb_pos);

    let mut sampled = sample_material(inputs, params, cano, &mut rng)?;

    if params.material.no_perturbed_nrm {
        sampled.perturbed_nrm = None;
    }

    // Geometric smoothed normal regularizer.
    let nrm_tap = tap_at(inputs.gb_normal, &jitter);
    let nrm_grad = abs_diff(&nrm_tap, inputs.gb_normal).scale_by(&grad_weight);

    // Normal perturbation regularizer: cosine deficit of the renormalized
    // sum of the tap and center directions.
    let perturbed_nrm_grad = sampled.perturbed_nrm.as_ref().map(|pn| {
        let pn_tap = tap_at(pn, &jitter);
        let mut g = FieldBuffer::zeros(w, h, 1);
        for y in 0..h {
            for x in 0..w {
                let a = safe_normalize(&pn_tap.get_vec3(x, y, 0));
                let b = safe_normalize(&pn.get_vec3(x, y, 0));
                let z = safe_normalize(&(a + b)).z;
                g.set(x, y, 0, 1.0 - z);
            }
        }
        broadcast_to_3(&g).scale_by(&grad_weight)
    });

    let gb_normal = prepare_shading_normal(
        inputs.gb_pos,
        params.view_pos,
        sampled.perturbed_nrm.as_ref(),
        inputs.gb_normal,
        inputs.gb_tangent,
        inputs.gb_geometric_normal,
    );

    let bsdf = params.material.resolve_bsdf(params.bsdf_override)?;
    let mut diffuse_light = None;
    let mut specular_light = None;

    let shaded_col = match bsdf {
        Bsdf::PbrOptix | Bsdf::DiffuseOptix | Bsdf::WhiteOptix => {
            let Light::EnvironmentOptix(env) = params.light else {
                return Err(RenderError::LightMismatch {
                    bsdf: bsdf.as_str(),
                    required: "optix environment",
                    got: params.light.kind(),
                });
            };
            let ctx = params
                .raytrace
                .ok_or(RenderError::MissingRaytraceContext(bsdf.as_str()))?;

            let kd = if bsdf == Bsdf::WhiteOptix {
                FieldBuffer::filled(w, h, 3, 1.0)
            } else {
                sampled.kd.clone()
            };

            // Offset ray origins off the surface to avoid self-intersection.
            let mut ray_origin = inputs.gb_pos.clone();
            for y in 0..h {
                for x in 0..w {
                    let o = ray_origin.get_vec3(x, y, 0) + gb_normal.get_vec3(x, y, 0) * RAY_ORIGIN_EPS;
                    ray_origin.set_vec3(x, y, 0, &o);
                }
            }

            let n_samples = if params.denoiser.is_some() { 8 } else { 64 };
            let seed = ctx.next_seed();
            let (mut diffuse, mut specular) = ctx.integrator.shade(IntegratorInputs {
                mask: inputs.mask,
                ray_origin: &ray_origin,
                pos: inputs.gb_pos,
                normal: &gb_normal,
                view_pos: params.view_pos,
                kd: &kd,
                ks: &sampled.ks,
                env,
                bsdf,
                n_samples,
                seed,
                shadow_scale: params.shadow_scale,
            });

            // Denoise the demodulated terms before remodulation.
            if let Some(denoiser) = params.denoiser {
                diffuse = denoiser.forward(&FieldBuffer::concat(&[
                    &diffuse,
                    &gb_normal,
                    inputs.gb_depth,
                ]));
                specular = denoiser.forward(&FieldBuffer::concat(&[
                    &specular,
                    &gb_normal,
                    inputs.gb_depth,
                ]));
            }

            let mut shaded = match bsdf {
                Bsdf::WhiteOptix | Bsdf::DiffuseOptix => diffuse.zip_map(&kd, |a, b| a * b),
                _ => {
                    // kd * (1 - metalness): metals keep no diffuse albedo.
                    let mut kd_demod = kd.clone();
                    for y in 0..h {
                        for x in 0..w {
                            let metalness = sampled.ks.get(x, y, 2);
                            for v in kd_demod.pixel_mut(x, y) {
                                *v *= 1.0 - metalness;
                            }
                        }
                    }
                    let remod = diffuse.zip_map(&kd_demod, |a, b| a * b);
                    remod.zip_map(&specular, |a, b| a + b)
                }
            };

            if let Some(denoiser) = params.denoiser {
                shaded = denoiser.forward(&FieldBuffer::concat(&[
                    &shaded,
                    &gb_normal,
                    inputs.gb_depth,
                ]));
            }

            diffuse_light = Some(diffuse);
            specular_light = Some(specular);
            shaded
        }
        Bsdf::Pbr | Bsdf::Diffuse => {
            let Light::Environment(env) = params.light else {
                return Err(RenderError::LightMismatch {
                    bsdf: bsdf.as_str(),
                    required: "analytic environment",
                    got: params.light.kind(),
                });
            };
            env.shade(
                inputs.gb_pos,
                &gb_normal,
                &sampled.kd,
                &sampled.ks,
                params.view_pos,
                bsdf == Bsdf::Pbr,
            )
        }
        Bsdf::Radiance => sampled.kd.clone(),
        Bsdf::Normal => gb_normal.map(|v| (v + 1.0) * 0.5),
        Bsdf::Tangent => inputs.gb_tangent.map(|v| (v + 1.0) * 0.5),
        Bsdf::Corr => {
            let mut out = FieldBuffer::zeros(w, h, 3);
            for y in 0..h {
                for x in 0..w {
                    let c = (cano.get_vec3(x, y, 0) + corr_bias()) * 0.5;
                    out.set_vec3(x, y, 0, &c);
                }
            }
            out
        }
        Bsdf::Kd => sampled.kd.clone(),
        Bsdf::Ks => sampled.ks.clone(),
    };

    let alpha = &sampled.alpha;
    Ok(ShadeBuffers {
        shaded: with_alpha(&shaded_col, alpha),
        kd_grad: with_alpha(&sampled.kd_grad, alpha),
        ks_grad: with_alpha(&sampled.ks_grad, alpha),
        normal_grad: with_alpha(&nrm_grad, alpha),
        occlusion: with_alpha(&broadcast_to_3(&sampled.ks.channel_slice(0..1)), alpha),
        gb_pos: with_alpha(inputs.gb_pos, alpha),
        gb_normal: with_alpha(&gb_normal, alpha),
        perturbed_nrm_grad: perturbed_nrm_grad.map(|g| with_alpha(&g, alpha)),
        diffuse_light: diffuse_light.map(|b| with_alpha(&b, alpha)),
        specular_light: specular_light.map(|b| with_alpha(&b, alpha)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::HemisphereLight;
    use crate::material::ConstantField;
    use approx::assert_relative_eq;

    fn flat_inputs(w: usize, h: usize) -> (FieldBuffer, FieldBuffer, FieldBuffer, FieldBuffer) {
        let pos = FieldBuffer::zeros(w, h, 3);
        let mut nrm = FieldBuffer::zeros(w, h, 3);
        let mut tng = FieldBuffer::zeros(w, h, 3);
        for y in 0..h {
            for x in 0..w {
                nrm.set_vec3(x, y, 0, &Vector3::new(0.0, 0.0, 1.0));
                tng.set_vec3(x, y, 0, &Vector3::new(1.0, 0.0, 0.0));
            }
        }
        let mask = FieldBuffer::filled(w, h, 1, 1.0);
        (pos, nrm, tng, mask)
    }

    fn shade_flat(material: &Material, bsdf: Option<Bsdf>) -> Result<ShadeBuffers, RenderError> {
        let (w, h) = (4, 4);
        let (pos, nrm, tng, mask) = flat_inputs(w, h);
        let texc = FieldBuffer::filled(w, h, 2, 0.5);
        let texc_deriv = FieldBuffer::zeros(w, h, 4);
        let depth = FieldBuffer::zeros(w, h, 2);
        let light = Light::Environment(Box::new(HemisphereLight::uniform(1.0)));

        shade(
            &ShadeInputs {
                gb_pos: &pos,
                gb_geometric_normal: &nrm,
                gb_normal: &nrm,
                gb_tangent: &tng,
                gb_texc: &texc,
                gb_texc_deriv: &texc_deriv,
                mask: &mask,
                gb_depth: &depth,
                cano_pos: None,
                cond: None,
            },
            &ShadeParams {
                view_pos: Vector3::new(0.0, 0.0, 3.0),
                light: &light,
                material,
                bsdf_override: bsdf,
                raytrace: None,
                denoiser: None,
                shadow_scale: 1.0,
                jitter_seed: 7,
            },
        )
    }

    fn combined_material(channels: usize) -> Material {
        let mut values = vec![0.5; channels];
        // Last three channels: an unperturbed tangent-space normal.
        let c = values.len();
        values[c - 3] = 0.0;
        values[c - 2] = 0.0;
        values[c - 1] = 1.0;
        Material::new(
            MaterialChannels::CombinedMlp(Box::new(ConstantField::new(values))),
            Some(Bsdf::Pbr),
        )
    }

    #[test]
    fn test_all_buffers_are_4_channel() {
        let material = combined_material(9);
        let buffers = shade_flat(&material, None).unwrap();
        for kind in BufferKind::ALL {
            if let Some(buf) = buffers.get(kind) {
                assert_eq!(buf.channels(), 4, "{kind:?} is not 4-channel");
            }
        }
    }

    #[test]
    fn test_combined_9ch_specular_grad_first_channel_zero() {
        let material = combined_material(9);
        let buffers = shade_flat(&material, None).unwrap();
        for y in 0..buffers.ks_grad.height() {
            for x in 0..buffers.ks_grad.width() {
                assert_eq!(buffers.ks_grad.get(x, y, 0), 0.0);
            }
        }
    }

    #[test]
    fn test_combined_bad_channel_count_is_fatal() {
        let material = Material::new(
            MaterialChannels::CombinedMlp(Box::new(ConstantField::new(vec![0.5; 7]))),
            Some(Bsdf::Pbr),
        );
        assert!(matches!(
            shade_flat(&material, None),
            Err(RenderError::CombinedChannelCount(7))
        ));
    }

    #[test]
    fn test_normal_debug_view_in_unit_range() {
        let material = combined_material(9);
        let buffers = shade_flat(&material, Some(Bsdf::Normal)).unwrap();
        for y in 0..buffers.shaded.height() {
            for x in 0..buffers.shaded.width() {
                let p = buffers.shaded.pixel(x, y);
                for &v in &p[0..3] {
                    assert!((0.0..=1.0).contains(&v), "out of range: {v}");
                }
            }
        }
    }

    #[test]
    fn test_optix_bsdf_with_analytic_light_is_fatal() {
        let material = combined_material(9);
        let err = shade_flat(&material, Some(Bsdf::PbrOptix)).unwrap_err();
        assert!(matches!(err, RenderError::LightMismatch { .. }));
    }

    #[test]
    fn test_radiance_material_zero_gradients() {
        let material = Material::new(
            MaterialChannels::Radiance(Box::new(ConstantField::new(vec![0.9, 0.8, 0.7]))),
            Some(Bsdf::Radiance),
        );
        let buffers = shade_flat(&material, None).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let kd_g = buffers.kd_grad.pixel(x, y);
                let ks_g = buffers.ks_grad.pixel(x, y);
                assert_eq!(&kd_g[0..3], &[0.0, 0.0, 0.0]);
                assert_eq!(&ks_g[0..3], &[0.0, 0.0, 0.0]);
                // Radiance passes straight through to the shaded buffer.
                assert_relative_eq!(buffers.shaded.get(x, y, 0), 0.9, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_alpha_channel_tracks_kd_alpha() {
        // A 10-channel combined material carries a 4th albedo channel that
        // becomes the coverage alpha.
        let mut values = vec![0.5; 10];
        values[3] = 0.25; // kd alpha
        values[9] = 1.0;
        let material = Material::new(
            MaterialChannels::CombinedMlp(Box::new(ConstantField::new(values))),
            Some(Bsdf::Pbr),
        );
        let buffers = shade_flat(&material, None).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_relative_eq!(buffers.shaded.get(x, y, 3), 0.25, epsilon = 1e-6);
            }
        }
    }
}
