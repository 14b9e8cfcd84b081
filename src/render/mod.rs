//! Forward rendering pipeline for the shading stage.
//!
//! - `interpolate`: barycentric attribute interpolation
//! - `normal`: shading-normal preparation
//! - `shade`: the per-layer pixel shader
//! - `layer`: one depth-peeled layer (MSAA handling + interpolation + shade)
//! - `composite`: depth-peel loop, back-to-front blending, antialiasing
//! - `uv`: UV-space rendering for texture baking
//!
//! No gradients computed here - see `diff` module for backward passes.

pub mod composite;
pub mod interpolate;
pub mod layer;
pub mod normal;
pub mod shade;
pub mod uv;

use nalgebra::Vector3;

use crate::light::{Denoiser, RaytraceContext};

// Re-export the entry points
pub use composite::{render_mesh, RenderSettings};
pub use shade::{shade, BufferKind, ShadeBuffers, ShadeInputs, ShadeParams};
pub use uv::{render_uv, UvBake};

/// Optional per-render collaborators and model-space inputs.
#[derive(Default)]
pub struct RenderAux<'a> {
    /// Canonical-space vertex positions for deformable/template-space
    /// models; world positions are used when absent.
    pub cano_pos: Option<&'a [Vector3<f32>]>,
    /// Conditioning vector for MLP materials.
    pub cond: Option<&'a [f32]>,
    /// Ray-tracing context, required by the Monte-Carlo BSDF paths.
    pub raytrace: Option<&'a RaytraceContext>,
    /// Denoiser for the Monte-Carlo accumulation buffers.
    pub denoiser: Option<&'a dyn Denoiser>,
}
