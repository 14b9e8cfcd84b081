//! Reference analytic environment light.
//!
//! A hemisphere light: constant ambient irradiance plus one directional
//! term, with a Blinn-Phong specular lobe derived from the material's
//! roughness/metalness channels. It satisfies the analytic light contract
//! for tests and simple preview renders; production setups substitute a
//! split-sum prefiltered environment behind the same trait.

use nalgebra::Vector3;

use crate::core::buffer::FieldBuffer;
use crate::core::{lerp_vec3, safe_normalize};
use crate::light::AnalyticEnvironment;

pub struct HemisphereLight {
    /// Ambient irradiance (linear RGB).
    pub ambient: Vector3<f32>,
    /// Direction towards the dominant light, unit length.
    pub direction: Vector3<f32>,
    /// Radiance of the dominant light (linear RGB).
    pub color: Vector3<f32>,
}

impl HemisphereLight {
    pub fn new(ambient: Vector3<f32>, direction: Vector3<f32>, color: Vector3<f32>) -> Self {
        Self {
            ambient,
            direction: safe_normalize(&direction),
            color,
        }
    }

    /// Uniform white ambient light, handy for constant-color tests.
    pub fn uniform(intensity: f32) -> Self {
        Self {
            ambient: Vector3::new(intensity, intensity, intensity),
            direction: Vector3::new(0.0, 0.0, 1.0),
            color: Vector3::zeros(),
        }
    }
}

impl AnalyticEnvironment for HemisphereLight {
    fn shade(
        &self,
        gb_pos: &FieldBuffer,
        gb_normal: &FieldBuffer,
        kd: &FieldBuffer,
        ks: &FieldBuffer,
        view_pos: Vector3<f32>,
        specular: bool,
    ) -> FieldBuffer {
        let (w, h) = (gb_pos.width(), gb_pos.height());
        let mut out = FieldBuffer::zeros(w, h, 3);

        for y in 0..h {
            for x in 0..w {
                let n = safe_normalize(&gb_normal.get_vec3(x, y, 0));
                let albedo = kd.get_vec3(x, y, 0);
                let params = ks.get_vec3(x, y, 0);
                let occlusion = params.x.clamp(0.0, 1.0);
                let roughness = params.y.clamp(0.08, 1.0);
                let metalness = params.z.clamp(0.0, 1.0);

                let n_dot_l = n.dot(&self.direction).max(0.0);
                let irradiance = self.ambient + self.color * n_dot_l;

                // Metals reflect through the specular lobe, not the diffuse one.
                let diffuse_albedo = albedo * (1.0 - metalness);
                let mut col = Vector3::new(
                    diffuse_albedo.x * irradiance.x,
                    diffuse_albedo.y * irradiance.y,
                    diffuse_albedo.z * irradiance.z,
                );

                if specular && n_dot_l > 0.0 {
                    let view_dir = safe_normalize(&(view_pos - gb_pos.get_vec3(x, y, 0)));
                    let half = safe_normalize(&(self.direction + view_dir));
                    let n_dot_h = n.dot(&half).max(0.0);
                    let exponent = 2.0 / (roughness * roughness) - 2.0;
                    let f0 = lerp_vec3(&Vector3::new(0.04, 0.04, 0.04), &albedo, metalness);
                    let lobe = n_dot_h.powf(exponent.max(1.0)) * n_dot_l;
                    col += Vector3::new(
                        f0.x * self.color.x,
                        f0.y * self.color.y,
                        f0.z * self.color.z,
                    ) * lobe;
                }

                col *= occlusion;
                out.set_vec3(x, y, 0, &col);
            }
        }
        out
    }
}
