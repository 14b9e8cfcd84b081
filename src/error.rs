//! Central error type for render calls.
//!
//! Every failure here is a caller misconfiguration: render calls are pure
//! functions of their inputs, so there is no retry path. The entry points
//! return `Err` immediately and never hand back partial buffers.

use thiserror::Error;

/// Fatal precondition failures raised by the render entry points.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("got empty triangle mesh (unrecoverable discontinuity)")]
    EmptyMesh,

    #[error("background is {got_w}x{got_h} but target resolution is {want_w}x{want_h}")]
    BackgroundSize {
        got_w: usize,
        got_h: usize,
        want_w: usize,
        want_h: usize,
    },

    #[error("combined material channel must be 9 or 10 channels, got {0}")]
    CombinedChannelCount(usize),

    #[error("material must specify a BSDF type (none on material or override)")]
    MissingBsdf,

    #[error("invalid BSDF '{0}'")]
    UnknownBsdf(String),

    #[error("BSDF '{bsdf}' requires {required} light, got {got}")]
    LightMismatch {
        bsdf: &'static str,
        required: &'static str,
        got: &'static str,
    },

    #[error("BSDF '{0}' requires a ray tracing context")]
    MissingRaytraceContext(&'static str),

    #[error("UV bake requires a combined MLP material channel")]
    MaterialMismatch,

    #[error("mesh is missing {0} attributes required by the selected shading path")]
    MissingAttribute(&'static str),
}
