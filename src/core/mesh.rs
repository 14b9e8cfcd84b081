//! Triangle mesh with independently indexed attributes.
//!
//! Positions, normals, tangents and texture coordinates each carry their own
//! triangle index array, so attributes may use a different topology than the
//! positions (seams in UV space, face-varying normals). The mesh also owns
//! the material that shades it.

use nalgebra::{Vector2, Vector3};

use crate::error::RenderError;
use crate::material::Material;

/// A triangle mesh plus its material.
#[derive(Debug)]
pub struct Mesh {
    /// Vertex positions (world space).
    pub v_pos: Vec<Vector3<f32>>,

    /// Vertex normals.
    pub v_nrm: Vec<Vector3<f32>>,

    /// Vertex tangents.
    pub v_tng: Vec<Vector3<f32>>,

    /// Vertex texture coordinates.
    pub v_tex: Vec<Vector2<f32>>,

    /// Triangle indices into `v_pos`.
    pub t_pos_idx: Vec<[u32; 3]>,

    /// Triangle indices into `v_nrm`.
    pub t_nrm_idx: Vec<[u32; 3]>,

    /// Triangle indices into `v_tng`.
    pub t_tng_idx: Vec<[u32; 3]>,

    /// Triangle indices into `v_tex`.
    pub t_tex_idx: Vec<[u32; 3]>,

    /// Material shading this mesh.
    pub material: Material,
}

impl Mesh {
    /// Build a mesh where every attribute shares the position topology.
    /// The common case for test geometry and simple assets.
    pub fn with_shared_topology(
        v_pos: Vec<Vector3<f32>>,
        v_nrm: Vec<Vector3<f32>>,
        v_tng: Vec<Vector3<f32>>,
        v_tex: Vec<Vector2<f32>>,
        indices: Vec<[u32; 3]>,
        material: Material,
    ) -> Self {
        Self {
            v_pos,
            v_nrm,
            v_tng,
            v_tex,
            t_pos_idx: indices.clone(),
            t_nrm_idx: indices.clone(),
            t_tng_idx: indices.clone(),
            t_tex_idx: indices,
            material,
        }
    }

    pub fn num_triangles(&self) -> usize {
        self.t_pos_idx.len()
    }

    /// Fatal check that the mesh can be rasterized at all.
    pub fn require_triangles(&self) -> Result<(), RenderError> {
        if self.t_pos_idx.is_empty() {
            return Err(RenderError::EmptyMesh);
        }
        Ok(())
    }

    /// Fatal check that the attribute arrays read by the shading path exist.
    pub fn require_shading_attributes(&self) -> Result<(), RenderError> {
        if self.v_nrm.is_empty() || self.t_nrm_idx.is_empty() {
            return Err(RenderError::MissingAttribute("normal"));
        }
        if self.v_tng.is_empty() || self.t_tng_idx.is_empty() {
            return Err(RenderError::MissingAttribute("tangent"));
        }
        if self.v_tex.is_empty() || self.t_tex_idx.is_empty() {
            return Err(RenderError::MissingAttribute("texcoord"));
        }
        Ok(())
    }
}
