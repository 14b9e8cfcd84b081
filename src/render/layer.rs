//! Rendering of a single depth-peeled layer: MSAA resolution handling,
//! attribute interpolation, depth preparation, and the pixel shader call.

use nalgebra::{Vector3, Vector4};

use crate::core::buffer::FieldBuffer;
use crate::core::safe_normalize;
use crate::core::Mesh;
use crate::error::RenderError;
use crate::light::Light;
use crate::material::Bsdf;
use crate::raster::RasterBuffer;
use crate::render::interpolate::{
    flatten_vec2, flatten_vec3, flatten_vec4, interpolate, interpolate_with_derivs,
};
use crate::render::shade::{shade, ShadeBuffers, ShadeInputs, ShadeParams};
use crate::render::RenderAux;

/// Denominator floor for the normalized-device-z computation.
const DEPTH_EPS: f32 = 1e-5;

/// Flat per-face normals from the position topology, zero-safe normalized.
/// Paired with a `[f, f, f]` index arrangement so interpolation yields the
/// face value at every covered pixel.
fn face_normals(mesh: &Mesh) -> (Vec<f32>, Vec<[u32; 3]>) {
    let mut normals = Vec::with_capacity(mesh.t_pos_idx.len() * 3);
    let mut indices = Vec::with_capacity(mesh.t_pos_idx.len());
    for (f, tri) in mesh.t_pos_idx.iter().enumerate() {
        let v0 = mesh.v_pos[tri[0] as usize];
        let v1 = mesh.v_pos[tri[1] as usize];
        let v2 = mesh.v_pos[tri[2] as usize];
        let n = safe_normalize(&(v1 - v0).cross(&(v2 - v0)));
        normals.extend_from_slice(&[n.x, n.y, n.z]);
        indices.push([f as u32, f as u32, f as u32]);
    }
    (normals, indices)
}

/// Normalized device z plus a first-order z-gradient estimate (2 channels).
/// Denominators are floored to avoid divide-by-zero at grazing coverage;
/// this feeds denoiser guidance only and carries no backward pass.
fn depth_buffer(clip_pos: &FieldBuffer, clip_deriv: &FieldBuffer) -> FieldBuffer {
    let (w, h) = (clip_pos.width(), clip_pos.height());
    let mut out = FieldBuffer::zeros(w, h, 2);
    for y in 0..h {
        for x in 0..w {
            let p = clip_pos.pixel(x, y);
            let d = clip_deriv.pixel(x, y);
            let z0 = p[2].max(DEPTH_EPS) / p[3].max(DEPTH_EPS);
            // Perturb z and w by their own x-derivative magnitudes.
            let z1 = (p[2] + d[4].abs()).max(DEPTH_EPS) / (p[3] + d[6].abs()).max(DEPTH_EPS);
            out.set(x, y, 0, z0);
            out.set(x, y, 1, (z1 - z0).abs());
        }
    }
    out
}

/// Render one rasterized depth layer to shading buffers.
///
/// With supersampling + MSAA the rasterization buffers are downsampled to
/// the shading resolution first (derivatives rescaled by `spp` to keep their
/// magnitude) and every output buffer is upsampled back afterwards.
#[allow(clippy::too_many_arguments)]
pub fn render_layer(
    v_pos_clip: &[Vector4<f32>],
    rast: &RasterBuffer,
    rast_deriv: &FieldBuffer,
    mesh: &Mesh,
    view_pos: Vector3<f32>,
    light: &Light,
    resolution: [usize; 2],
    spp: usize,
    msaa: bool,
    bsdf_override: Option<Bsdf>,
    shadow_scale: f32,
    jitter_seed: u64,
    aux: &RenderAux<'_>,
) -> Result<ShadeBuffers, RenderError> {
    let [width, height] = resolution;
    let full_res = [width * spp, height * spp];

    // Scale down to shading resolution when MSAA is enabled, otherwise
    // shade at full supersampled resolution.
    let scaled;
    let (rast_s, deriv_s): (&RasterBuffer, &FieldBuffer) = if spp > 1 && msaa {
        scaled = (
            rast.scale_nearest(width, height),
            rast_deriv
                .scale_nearest(width, height)
                .map(|v| v * spp as f32),
        );
        (&scaled.0, &scaled.1)
    } else {
        (rast, rast_deriv)
    };

    // Interpolate world-space position and the coverage mask.
    let pos_attr = flatten_vec3(&mesh.v_pos);
    let gb_pos = interpolate(&pos_attr, 3, &mesh.t_pos_idx, rast_s);
    let mask = rast_s.coverage_mask();

    let cano_pos = aux
        .cano_pos
        .map(|cano| interpolate(&flatten_vec3(cano), 3, &mesh.t_pos_idx, rast_s));

    // Geometric normals drive the bent-normal trick for bump mapping.
    let (face_nrm_attr, face_idx) = face_normals(mesh);
    let gb_geometric_normal = interpolate(&face_nrm_attr, 3, &face_idx, rast_s);

    let gb_normal = interpolate(&flatten_vec3(&mesh.v_nrm), 3, &mesh.t_nrm_idx, rast_s);
    let gb_tangent = interpolate(&flatten_vec3(&mesh.v_tng), 3, &mesh.t_tng_idx, rast_s);

    let (gb_texc, gb_texc_deriv) = interpolate_with_derivs(
        &flatten_vec2(&mesh.v_tex),
        2,
        &mesh.t_tex_idx,
        rast_s,
        deriv_s,
    );

    let (clip_pos, clip_deriv) = interpolate_with_derivs(
        &flatten_vec4(v_pos_clip),
        4,
        &mesh.t_pos_idx,
        rast_s,
        deriv_s,
    );
    let gb_depth = depth_buffer(&clip_pos, &clip_deriv);

    let buffers = shade(
        &ShadeInputs {
            gb_pos: &gb_pos,
            gb_geometric_normal: &gb_geometric_normal,
            gb_normal: &gb_normal,
            gb_tangent: &gb_tangent,
            gb_texc: &gb_texc,
            gb_texc_deriv: &gb_texc_deriv,
            mask: &mask,
            gb_depth: &gb_depth,
            cano_pos: cano_pos.as_ref(),
            cond: aux.cond,
        },
        &ShadeParams {
            view_pos,
            light,
            material: &mesh.material,
            bsdf_override,
            raytrace: aux.raytrace,
            denoiser: aux.denoiser,
            shadow_scale,
            jitter_seed,
        },
    )?;

    // Scale back up to visibility resolution if using MSAA.
    if spp > 1 && msaa {
        Ok(buffers.map(|b| b.scale_nearest(full_res[0], full_res[1])))
    } else {
        Ok(buffers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::FieldBuffer;
    use nalgebra::Vector3;

    #[test]
    fn test_face_normals_unit_and_repeated_index() {
        use crate::material::{Bsdf, ConstantField, Material, MaterialChannels};
        let mesh = Mesh::with_shared_topology(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            vec![Vector3::new(0.0, 0.0, 1.0); 3],
            vec![Vector3::new(1.0, 0.0, 0.0); 3],
            vec![nalgebra::Vector2::new(0.0, 0.0); 3],
            vec![[0, 1, 2]],
            Material::new(
                MaterialChannels::CombinedMlp(Box::new(ConstantField::new(vec![0.5; 9]))),
                Some(Bsdf::Pbr),
            ),
        );

        let (attr, idx) = face_normals(&mesh);
        assert_eq!(idx, vec![[0, 0, 0]]);
        assert!((attr[2] - 1.0).abs() < 1e-6, "expected +z face normal");
    }

    #[test]
    fn test_depth_buffer_clamps_degenerate_w() {
        let mut clip = FieldBuffer::zeros(1, 1, 4);
        let p = clip.pixel_mut(0, 0);
        p[2] = 0.5;
        p[3] = 0.0; // degenerate w
        let deriv = FieldBuffer::zeros(1, 1, 8);
        let depth = depth_buffer(&clip, &deriv);
        assert!(depth.get(0, 0, 0).is_finite());
        assert!(depth.get(0, 0, 0) > 0.0);
    }
}
