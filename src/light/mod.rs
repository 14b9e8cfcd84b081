//! Light variants and the ray-tracing collaborator contracts.
//!
//! Two kinds of environment light exist and the BSDF paths are picky about
//! which one they get: the analytic variant exposes a closed-form `shade`,
//! the Monte-Carlo variant exposes importance-sampling tables that an
//! external integrator consumes. The pairing is validated fatally by the
//! pixel shader.

mod hemisphere;

use std::sync::atomic::{AtomicU32, Ordering};

use nalgebra::Vector3;

use crate::core::buffer::FieldBuffer;
use crate::material::Bsdf;

pub use hemisphere::HemisphereLight;

/// Closed-form environment light contract.
///
/// `shade(pos, normal, albedo, specular_params, view_pos, specular)` returns
/// a 3-channel shaded color buffer.
pub trait AnalyticEnvironment: Send + Sync {
    fn shade(
        &self,
        gb_pos: &FieldBuffer,
        gb_normal: &FieldBuffer,
        kd: &FieldBuffer,
        ks: &FieldBuffer,
        view_pos: Vector3<f32>,
        specular: bool,
    ) -> FieldBuffer;
}

/// Environment light prepared for Monte-Carlo integration: base radiance map
/// plus the precomputed PDF and row/column marginal tables the importance
/// sampler walks.
pub struct OptixEnvironment {
    /// Base radiance map (H×W×3).
    pub base: FieldBuffer,
    /// Per-texel sampling PDF (H×W×1).
    pub pdf: FieldBuffer,
    /// Row marginal table (length H).
    pub rows: Vec<f32>,
    /// Per-row column table (H×W×1).
    pub cols: FieldBuffer,
}

/// The light variants the shader dispatches on.
pub enum Light {
    /// Analytic environment light with closed-form shading.
    Environment(Box<dyn AnalyticEnvironment>),
    /// Importance-sampled environment for the Monte-Carlo paths.
    EnvironmentOptix(OptixEnvironment),
}

impl Light {
    /// Human-readable variant name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Light::Environment(_) => "analytic environment",
            Light::EnvironmentOptix(_) => "optix environment",
        }
    }
}

/// Inputs handed to the Monte-Carlo environment integrator.
pub struct IntegratorInputs<'a> {
    /// Coverage mask (H×W×1, 0/1).
    pub mask: &'a FieldBuffer,
    /// Ray origins, already offset off the surface (H×W×3).
    pub ray_origin: &'a FieldBuffer,
    /// Shading positions (H×W×3).
    pub pos: &'a FieldBuffer,
    /// Shading normals (H×W×3).
    pub normal: &'a FieldBuffer,
    /// Eye position in world space.
    pub view_pos: Vector3<f32>,
    /// Albedo (H×W×3).
    pub kd: &'a FieldBuffer,
    /// Specular parameters (H×W×3).
    pub ks: &'a FieldBuffer,
    /// The environment tables.
    pub env: &'a OptixEnvironment,
    /// Which Monte-Carlo path is being integrated.
    pub bsdf: Bsdf,
    /// Samples per pixel along one axis.
    pub n_samples: u32,
    /// Decorrelation seed for this invocation.
    pub seed: u32,
    /// Shadow intensity scale.
    pub shadow_scale: f32,
}

/// Monte-Carlo direct/indirect environment integrator.
///
/// Returns demodulated (diffuse, specular) accumulation buffers, 3 channels
/// each.
pub trait EnvIntegrator: Send + Sync {
    fn shade(&self, inputs: IntegratorInputs<'_>) -> (FieldBuffer, FieldBuffer);
}

/// Denoiser applied to the demodulated and combined Monte-Carlo results.
/// Input is the concatenation [signal, shading normal, depth] (3+3+2
/// channels); output is the denoised 3-channel signal.
pub trait Denoiser: Send + Sync {
    fn forward(&self, guided: &FieldBuffer) -> FieldBuffer;
}

/// Ray-tracing context for the Monte-Carlo paths: the integrator plus the
/// monotone seed counter that decorrelates successive invocations.
///
/// The counter is atomic so concurrent renders stay deterministic per
/// invocation order; tests can reset it.
pub struct RaytraceContext {
    pub integrator: Box<dyn EnvIntegrator>,
    seed: AtomicU32,
}

impl RaytraceContext {
    pub fn new(integrator: Box<dyn EnvIntegrator>) -> Self {
        Self {
            integrator,
            seed: AtomicU32::new(0),
        }
    }

    /// Hand out the current seed and advance the counter.
    pub fn next_seed(&self) -> u32 {
        self.seed.fetch_add(1, Ordering::Relaxed)
    }

    /// Seed the counter (e.g. to make a test run reproducible).
    pub fn reset_seed(&self, value: u32) {
        self.seed.store(value, Ordering::Relaxed);
    }

    /// Peek without advancing.
    pub fn current_seed(&self) -> u32 {
        self.seed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullIntegrator;

    impl EnvIntegrator for NullIntegrator {
        fn shade(&self, inputs: IntegratorInputs<'_>) -> (FieldBuffer, FieldBuffer) {
            let z = FieldBuffer::zeros(inputs.pos.width(), inputs.pos.height(), 3);
            (z.clone(), z)
        }
    }

    #[test]
    fn test_seed_counter_monotone_and_resettable() {
        let ctx = RaytraceContext::new(Box::new(NullIntegrator));
        assert_eq!(ctx.next_seed(), 0);
        assert_eq!(ctx.next_seed(), 1);
        assert_eq!(ctx.current_seed(), 2);
        ctx.reset_seed(7);
        assert_eq!(ctx.next_seed(), 7);
    }
}
