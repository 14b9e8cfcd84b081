//! Differentiable operations (backward passes).
//!
//! Hand-derived gradients for the structural operations of the pipeline:
//! layer compositing, barycentric interpolation, and the small vector-math
//! building blocks. Each is verified against finite differences in the
//! gradient-check tests.

pub mod blend_grad;
pub mod interpolate_grad;
pub mod math_grad;
