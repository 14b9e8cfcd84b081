//! UV-space rendering: bake the combined MLP material out to texture space.
//!
//! Texcoords are treated as the clip-space position (remapped from [0,1] to
//! [-1,1]) and rasterized directly, one layer, no peeling. Canonical/world
//! positions interpolate through the *position* topology at the UV-space
//! rasterization, then feed one combined material lookup per texel.

use nalgebra::{Vector2, Vector3, Vector4};

use crate::core::buffer::FieldBuffer;
use crate::core::safe_normalize;
use crate::core::Mesh;
use crate::error::RenderError;
use crate::material::MaterialChannels;
use crate::raster::Rasterizer;
use crate::render::interpolate::{flatten_vec3, interpolate};

/// Baked texture-space channels.
#[derive(Clone, Debug)]
pub struct UvBake {
    /// Texel coverage (1 channel, 0/1).
    pub mask: FieldBuffer,
    /// Albedo channels (3 or 4).
    pub kd: FieldBuffer,
    /// Specular parameters (3 channels).
    pub ks: FieldBuffer,
    /// Normalized perturbed normal (3 channels).
    pub perturbed_nrm: FieldBuffer,
}

/// Map a texcoord to its UV-space clip position (before homogeneous
/// padding): [0,1] stretches to [-1,1], so UV-center lands on the origin.
pub fn uv_clip_position(uv: &Vector2<f32>) -> Vector2<f32> {
    uv * 2.0 - Vector2::new(1.0, 1.0)
}

/// Rasterize the mesh in UV space and bake the combined MLP material.
pub fn render_uv(
    rasterizer: &dyn Rasterizer,
    mesh: &Mesh,
    width: usize,
    height: usize,
    cond: Option<&[f32]>,
    cano_pos: Option<&[Vector3<f32>]>,
) -> Result<UvBake, RenderError> {
    mesh.require_triangles()?;
    let MaterialChannels::CombinedMlp(sampler) = &mesh.material.channels else {
        return Err(RenderError::MaterialMismatch);
    };

    let cano = cano_pos.unwrap_or(&mesh.v_pos);

    // Clip space transform, padded to a homogeneous 4-vector.
    let uv_clip: Vec<Vector4<f32>> = mesh
        .v_tex
        .iter()
        .map(|uv| {
            let c = uv_clip_position(uv);
            Vector4::new(c.x, c.y, 0.0, 1.0)
        })
        .collect();

    let (rast, _deriv) = rasterizer.rasterize(&uv_clip, &mesh.t_tex_idx, width, height);

    // Interpolate canonical/world position through the position topology.
    let gb_pos = interpolate(&flatten_vec3(cano), 3, &mesh.t_pos_idx, &rast);
    let mask = rast.coverage_mask();

    let all_tex = sampler.sample(&gb_pos, cond, &mask);
    let c = all_tex.channels();
    if c != 9 && c != 10 {
        return Err(RenderError::CombinedChannelCount(c));
    }

    let mut perturbed_nrm = all_tex.channel_slice(c - 3..c);
    for y in 0..height {
        for x in 0..width {
            let n = safe_normalize(&perturbed_nrm.get_vec3(x, y, 0));
            perturbed_nrm.set_vec3(x, y, 0, &n);
        }
    }

    Ok(UvBake {
        mask,
        kd: all_tex.channel_slice(0..c - 6),
        ks: all_tex.channel_slice(c - 6..c - 3),
        perturbed_nrm,
    })
}
