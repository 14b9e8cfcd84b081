//! # remat-rs: Differentiable Mesh Shading & Compositing in Rust
//!
//! This crate implements the shading and layer-compositing stage of a
//! differentiable rasterization renderer, as used in inverse-rendering and
//! 3D-reconstruction pipelines: given rasterized mesh attributes and a set
//! of material/lighting models, it computes physically-based shaded color
//! plus the auxiliary regularization buffers (albedo, specular, and normal
//! gradients) needed to train neural or parametric scene representations.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - `core`: Fundamental data structures (buffers, meshes, cameras, math)
//! - `material`: BSDF tags and material channel samplers
//! - `light`: Light variants and ray-tracing collaborator contracts
//! - `raster`: Rasterization contracts + a reference CPU implementation
//! - `render`: Forward pipeline (interpolation, shading, compositing, UV)
//! - `diff`: Differentiable operations (backward passes)
//!
//! ## Pipeline
//!
//! `render::render_mesh` drives a depth-peeling loop: each layer is
//! rasterized, its attributes interpolated, shaded by `render::shade`, and
//! the layers are composited back-to-front over the background with
//! silhouette antialiasing on the primary color buffer. `render::render_uv`
//! is a simpler sibling path that rasterizes in UV space to bake MLP
//! materials out to textures.

// Core data structures and math
pub mod core;

// Central error type
pub mod error;

// Materials and channel samplers
pub mod material;

// Light variants and integrator contracts
pub mod light;

// Rasterization contracts and reference implementation
pub mod raster;

// Forward rendering pipeline
pub mod render;

// Differentiable operations (backward passes)
pub mod diff;

// Re-export commonly used types at crate root for convenience
pub use crate::core::{Camera, FieldBuffer, Mesh};
pub use error::RenderError;
pub use light::Light;
pub use material::{Bsdf, Material, MaterialChannels};
pub use render::{render_mesh, render_uv, RenderAux, RenderSettings, ShadeBuffers};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
